//! # Yahoo Finance
//!
//! Daily history from the Yahoo Finance chart API. Enabled with the `yahoo` feature.

use anyhow::Context;
use async_trait::async_trait;
use chrono::DateTime;
use chrono::NaiveDate;
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::series::DailyBar;
use super::source::PriceSource;

/// [`PriceSource`] backed by `yahoo_finance_api`.
pub struct YahooSource {
  connector: yahoo::YahooConnector,
}

impl YahooSource {
  pub fn new() -> anyhow::Result<Self> {
    Ok(Self {
      connector: yahoo::YahooConnector::new().context("cannot build Yahoo Finance client")?,
    })
  }
}

fn midnight_utc(date: NaiveDate) -> anyhow::Result<OffsetDateTime> {
  let timestamp = date
    .and_hms_opt(0, 0, 0)
    .context("invalid midnight")?
    .and_utc()
    .timestamp();
  Ok(OffsetDateTime::from_unix_timestamp(timestamp)?)
}

#[async_trait]
impl PriceSource for YahooSource {
  async fn daily_bars(
    &self,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> anyhow::Result<Vec<DailyBar>> {
    let response = self
      .connector
      .get_quote_history(ticker, midnight_utc(start)?, midnight_utc(end)?)
      .await
      .with_context(|| format!("Yahoo Finance request for {ticker} failed"))?;
    let quotes = response
      .quotes()
      .with_context(|| format!("Yahoo Finance returned no quotes for {ticker}"))?;

    debug!(ticker, quotes = quotes.len(), "received Yahoo quotes");

    Ok(
      quotes
        .into_iter()
        .filter_map(|q| {
          let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
          Some(DailyBar::new(
            date,
            q.open,
            q.high,
            q.low,
            q.close,
            q.volume as u64,
          ))
        })
        .collect(),
    )
  }
}
