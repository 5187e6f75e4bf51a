//! # CSV Source
//!
//! Daily history read from per-ticker CSV exports.

use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::series::DailyBar;
use super::source::PriceSource;

/// Row of a Yahoo-style history export (`Date,Open,High,Low,Close,Adj Close,Volume`).
///
/// Only `Date` and `Close` are required; unparsable cells such as `null` read as missing.
#[derive(Debug, Deserialize)]
struct CsvBar {
  #[serde(rename = "Date", alias = "date")]
  date: NaiveDate,
  #[serde(rename = "Open", alias = "open", default, deserialize_with = "csv::invalid_option")]
  open: Option<f64>,
  #[serde(rename = "High", alias = "high", default, deserialize_with = "csv::invalid_option")]
  high: Option<f64>,
  #[serde(rename = "Low", alias = "low", default, deserialize_with = "csv::invalid_option")]
  low: Option<f64>,
  #[serde(rename = "Close", alias = "close", deserialize_with = "csv::invalid_option")]
  close: Option<f64>,
  #[serde(rename = "Volume", alias = "volume", default, deserialize_with = "csv::invalid_option")]
  volume: Option<f64>,
}

impl CsvBar {
  fn into_bar(self) -> Option<DailyBar> {
    let close = self.close?;
    Some(DailyBar::new(
      self.date,
      self.open.unwrap_or(close),
      self.high.unwrap_or(close),
      self.low.unwrap_or(close),
      close,
      self.volume.map(|v| v.max(0.0) as u64).unwrap_or(0),
    ))
  }
}

/// Reads `<dir>/<TICKER>.csv` history files.
#[derive(Clone, Debug)]
pub struct CsvSource {
  dir: PathBuf,
}

impl CsvSource {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn path_for(&self, ticker: &str) -> PathBuf {
    self.dir.join(format!("{ticker}.csv"))
  }
}

fn read_bars(path: &Path, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<DailyBar>> {
  let mut reader = csv::Reader::from_path(path)
    .with_context(|| format!("cannot open {}", path.display()))?;

  let mut bars = Vec::new();
  for (line, row) in reader.deserialize::<CsvBar>().enumerate() {
    let row = row.with_context(|| format!("{}: bad record {}", path.display(), line + 1))?;
    if row.date < start || row.date >= end {
      continue;
    }
    if let Some(bar) = row.into_bar() {
      bars.push(bar);
    }
  }

  Ok(bars)
}

#[async_trait]
impl PriceSource for CsvSource {
  async fn daily_bars(
    &self,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> anyhow::Result<Vec<DailyBar>> {
    let path = self.path_for(ticker);
    tokio::task::spawn_blocking(move || read_bars(&path, start, end)).await?
  }
}
