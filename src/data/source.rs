//! # Price Sources
//!
//! Pluggable providers of daily bars.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::series::DailyBar;

/// Upstream provider of daily bars.
///
/// Implementations report transport or lookup failures through `anyhow`; the
/// [`super::PriceSeriesFetcher`] turns them into typed errors naming the ticker.
#[async_trait]
pub trait PriceSource: Send + Sync {
  /// Daily bars for `ticker` with `start <= date < end`, in any order.
  async fn daily_bars(
    &self,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> anyhow::Result<Vec<DailyBar>>;
}

/// Deterministic source backed by a map, for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
  bars: HashMap<String, Vec<DailyBar>>,
}

impl InMemorySource {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, ticker: impl Into<String>, bars: Vec<DailyBar>) {
    self.bars.insert(ticker.into(), bars);
  }

  /// Builder-style insert of close-only bars.
  pub fn with_closes(mut self, ticker: impl Into<String>, closes: &[(NaiveDate, f64)]) -> Self {
    let bars = closes
      .iter()
      .map(|&(date, close)| DailyBar::close_only(date, close))
      .collect();
    self.insert(ticker, bars);
    self
  }
}

#[async_trait]
impl PriceSource for InMemorySource {
  async fn daily_bars(
    &self,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> anyhow::Result<Vec<DailyBar>> {
    Ok(
      self
        .bars
        .get(ticker)
        .map(|bars| {
          bars
            .iter()
            .filter(|bar| bar.date >= start && bar.date < end)
            .copied()
            .collect()
        })
        .unwrap_or_default(),
    )
  }
}
