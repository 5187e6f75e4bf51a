//! # Price Series
//!
//! $$
//! P = \{(t_k, c_k)\}_{k=1}^{T},\qquad t_k < t_{k+1},\ c_k > 0
//! $$
//!
//! Provider bars and the validated close series built from them.

use chrono::NaiveDate;
use impl_new_derive::ImplNew;

use crate::error::PortfolioError;
use crate::error::Result;

/// One daily bar as delivered by a provider. Only `close` feeds the risk engine.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq)]
pub struct DailyBar {
  pub date: NaiveDate,
  pub open: f64,
  pub high: f64,
  pub low: f64,
  pub close: f64,
  pub volume: u64,
}

impl DailyBar {
  /// Bar carrying only a close, for sources that have nothing else.
  pub fn close_only(date: NaiveDate, close: f64) -> Self {
    Self::new(date, close, close, close, close, 0)
  }
}

/// Daily closes of one ticker, keyed by strictly increasing dates.
///
/// Non-trading days are absent rather than zero.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceSeries {
  ticker: String,
  dates: Vec<NaiveDate>,
  closes: Vec<f64>,
}

impl PriceSeries {
  /// Build a series, rejecting unordered dates and non-positive or non-finite closes.
  pub fn new(ticker: impl Into<String>, points: Vec<(NaiveDate, f64)>) -> Result<Self> {
    let ticker = ticker.into();
    if ticker.trim().is_empty() {
      return Err(PortfolioError::InvalidRequest(
        "price series needs a ticker".to_string(),
      ));
    }

    if let Some(pair) = points.windows(2).find(|w| w[0].0 >= w[1].0) {
      return Err(PortfolioError::InvalidRequest(format!(
        "{ticker}: dates must be strictly increasing ({} then {})",
        pair[0].0, pair[1].0
      )));
    }

    if let Some((date, close)) = points.iter().find(|(_, c)| !(c.is_finite() && *c > 0.0)) {
      return Err(PortfolioError::InvalidRequest(format!(
        "{ticker}: close on {date} must be a positive number, got {close}"
      )));
    }

    let (dates, closes) = points.into_iter().unzip();
    Ok(Self {
      ticker,
      dates,
      closes,
    })
  }

  pub fn ticker(&self) -> &str {
    &self.ticker
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn closes(&self) -> &[f64] {
    &self.closes
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  /// Close on `date`, if it was a trading day for this ticker.
  pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
    self
      .dates
      .binary_search(&date)
      .ok()
      .map(|idx| self.closes[idx])
  }

  pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
    self.dates.iter().copied().zip(self.closes.iter().copied())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
  }

  #[test]
  fn close_on_finds_trading_days_only() {
    let series = PriceSeries::new("ABB.BO", vec![(d(2), 10.0), (d(3), 11.0), (d(5), 12.5)]).unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series.close_on(d(3)), Some(11.0));
    assert_eq!(series.close_on(d(4)), None);
  }

  #[test]
  fn rejects_unordered_dates() {
    let err = PriceSeries::new("ABB.BO", vec![(d(3), 10.0), (d(3), 11.0)]).unwrap_err();
    assert!(matches!(err, PortfolioError::InvalidRequest(_)));
  }

  #[test]
  fn rejects_non_positive_close() {
    let err = PriceSeries::new("ABB.BO", vec![(d(2), 10.0), (d(3), 0.0)]).unwrap_err();
    assert!(err.to_string().contains("positive"));
  }
}
