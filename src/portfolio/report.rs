//! # Portfolio Report
//!
//! $$
//! \mu_{\text{ann}} = (1 + \bar{\mathbf r}^\top \mathbf w)^{250} - 1
//! $$
//!
//! Assembles the final [`OptimizationResult`], renders it and exports it as CSV.

use std::fmt;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use ndarray::ArrayView1;
use prettytable::format;
use prettytable::row;
use prettytable::Table;
use tracing::info;

use super::risk::TRADING_DAYS;
use super::types::CovarianceInputs;
use super::types::OptimizationOutcome;
use super::types::OptimizationResult;
use crate::error::Result;

/// File name of the aligned prices and returns written by [`OptimizationResult::export`].
pub const STOCK_DATA_FILE: &str = "stock-data.csv";
/// File name of the weights table written by [`OptimizationResult::export`].
pub const WEIGHTS_FILE: &str = "optimized-weights.csv";

const DISPLAY_DECIMALS: i32 = 3;

/// Compound a mean daily return over a trading year.
pub fn annualize_return(daily: f64) -> f64 {
  (1.0 + daily).powf(TRADING_DAYS) - 1.0
}

/// Combine the builder's tables with the optimizer's outcome.
///
/// # Panics
/// Panics when the weight count differs from the number of return columns.
pub fn build_report(inputs: CovarianceInputs, outcome: OptimizationOutcome) -> OptimizationResult {
  let CovarianceInputs {
    aligned,
    returns,
    covariance,
  } = inputs;
  assert_eq!(
    outcome.weights.len(),
    returns.tickers().len(),
    "weight vector length must match the number of tickers"
  );

  let daily = returns
    .mean_returns()
    .dot(&ArrayView1::from(outcome.weights.as_slice()));

  OptimizationResult {
    tickers: aligned.tickers().to_vec(),
    rounded_weights: outcome.weights.rounded(DISPLAY_DECIMALS),
    weights: outcome.weights,
    equal_weight_risk: outcome.equal_weight_risk,
    optimized_risk: outcome.risk,
    expected_annual_return: annualize_return(daily),
    iterations: outcome.iterations,
    aligned,
    returns,
    covariance,
  }
}

impl OptimizationResult {
  /// Write `Date,<ticker>-close...,<ticker>-return...`; returns are empty on the first date.
  pub fn write_stock_data<W: Write>(&self, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["Date".to_string()];
    header.extend(self.tickers.iter().map(|t| format!("{t}-close")));
    header.extend(self.tickers.iter().map(|t| format!("{t}-return")));
    wtr.write_record(&header)?;

    let prices = self.aligned.prices();
    let returns = self.returns.returns();
    for (i, date) in self.aligned.dates().iter().enumerate() {
      let mut record = vec![date.to_string()];
      record.extend(prices.row(i).iter().map(|p| p.to_string()));
      match i.checked_sub(1) {
        Some(r) => record.extend(returns.row(r).iter().map(|x| x.to_string())),
        None => record.extend(self.tickers.iter().map(|_| String::new())),
      }
      wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
  }

  /// Write `ticker,weights,weights_rounded`.
  pub fn write_weights<W: Write>(&self, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["ticker", "weights", "weights_rounded"])?;

    for ((ticker, w), rounded) in self
      .tickers
      .iter()
      .zip(self.weights.iter())
      .zip(&self.rounded_weights)
    {
      wtr.write_record([ticker.clone(), w.to_string(), rounded.to_string()])?;
    }

    wtr.flush()?;
    Ok(())
  }

  /// Write [`STOCK_DATA_FILE`] and [`WEIGHTS_FILE`] into `dir`, creating it if needed.
  pub fn export(&self, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    self.write_stock_data(File::create(dir.join(STOCK_DATA_FILE))?)?;
    self.write_weights(File::create(dir.join(WEIGHTS_FILE))?)?;

    info!(dir = %dir.display(), "exported optimization result");
    Ok(())
  }
}

impl fmt::Display for OptimizationResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Ticker", "Weight", "Weight (rounded)"]);
    for ((ticker, w), rounded) in self
      .tickers
      .iter()
      .zip(self.weights.iter())
      .zip(&self.rounded_weights)
    {
      table.add_row(row![ticker, r->format!("{w:.6}"), r->format!("{rounded:.3}")]);
    }

    write!(f, "{table}")?;
    writeln!(f, "Equal-weight risk (annualized):  {:.4}", self.equal_weight_risk)?;
    writeln!(f, "Optimized risk (annualized):     {:.4}", self.optimized_risk)?;
    writeln!(
      f,
      "Expected annual return:          {:.2}%",
      self.expected_annual_return * 100.0
    )
  }
}
