//! # Price Series Fetcher
//!
//! Window filtering, validation and concurrent retrieval of close series.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::warn;

use super::series::PriceSeries;
use super::source::PriceSource;
use crate::error::PortfolioError;
use crate::error::Result;

/// Turns provider bars into validated [`PriceSeries`].
#[derive(Clone)]
pub struct PriceSeriesFetcher {
  source: Arc<dyn PriceSource>,
}

impl PriceSeriesFetcher {
  pub fn new(source: Arc<dyn PriceSource>) -> Self {
    Self { source }
  }

  /// Fetch the daily closes of `ticker` over `[start, end)`.
  ///
  /// Bars outside the window or with unusable closes are treated as missing days; a later bar
  /// for an already seen date replaces the earlier one. Fails with
  /// [`PortfolioError::DataUnavailable`] when the provider errors or nothing usable remains.
  pub async fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
      return Err(PortfolioError::InvalidRequest(
        "ticker symbol is empty".to_string(),
      ));
    }
    if start >= end {
      return Err(PortfolioError::InvalidRequest(format!(
        "start {start} must be before end {end}"
      )));
    }

    let unavailable = |reason: String| PortfolioError::DataUnavailable {
      ticker: ticker.to_string(),
      start,
      end,
      reason,
    };

    let bars = self
      .source
      .daily_bars(ticker, start, end)
      .await
      .map_err(|e| unavailable(format!("{e:#}")))?;

    let received = bars.len();
    let closes: BTreeMap<NaiveDate, f64> = bars
      .into_iter()
      .filter(|bar| bar.date >= start && bar.date < end)
      .filter(|bar| bar.close.is_finite() && bar.close > 0.0)
      .map(|bar| (bar.date, bar.close))
      .collect();

    if closes.is_empty() {
      return Err(unavailable(format!(
        "provider returned {received} bar(s), none usable"
      )));
    }
    if closes.len() < received {
      warn!(
        ticker,
        received,
        kept = closes.len(),
        "dropped duplicate or unusable bars"
      );
    }
    debug!(ticker, rows = closes.len(), "fetched daily closes");

    PriceSeries::new(ticker, closes.into_iter().collect())
  }

  /// Fetch every ticker concurrently and return the series in request order.
  ///
  /// The first failure aborts the run; fetches still in flight are abandoned.
  pub async fn fetch_all(
    &self,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<PriceSeries>> {
    let mut tasks = JoinSet::new();
    for (idx, ticker) in tickers.iter().enumerate() {
      let fetcher = self.clone();
      let ticker = ticker.clone();
      tasks.spawn(async move { (idx, fetcher.fetch(&ticker, start, end).await) });
    }

    let mut slots: Vec<Option<PriceSeries>> = vec![None; tickers.len()];
    while let Some(joined) = tasks.join_next().await {
      let (idx, series) = joined.map_err(|e| PortfolioError::TaskFailed(e.to_string()))?;
      slots[idx] = Some(series?);
    }

    Ok(slots.into_iter().flatten().collect())
  }
}
