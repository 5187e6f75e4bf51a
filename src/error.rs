//! # Errors
//!
//! Every stage of the pipeline reports failures through [`PortfolioError`].

use chrono::NaiveDate;
use thiserror::Error;

use crate::portfolio::types::WeightVector;

/// Errors raised while fetching, aligning, optimizing or exporting a portfolio.
#[derive(Error, Debug)]
pub enum PortfolioError {
  /// Malformed request or series (empty symbol, unordered dates, `start >= end`, ...).
  #[error("invalid request: {0}")]
  InvalidRequest(String),

  /// The provider returned no usable rows for `ticker`, or failed outright.
  #[error("no price data for {ticker} in [{start}, {end}): {reason}")]
  DataUnavailable {
    ticker: String,
    start: NaiveDate,
    end: NaiveDate,
    reason: String,
  },

  /// Not enough trading days are common to every selected ticker.
  #[error("only {rows} trading day(s) common to {tickers:?}; a sample covariance needs at least 3")]
  InsufficientOverlap { tickers: Vec<String>, rows: usize },

  /// No tickers, or a covariance matrix that makes risk meaningless in some direction.
  #[error("degenerate input: {0}")]
  DegenerateInput(String),

  /// The solver ran out of iterations. `best` is the best feasible iterate found.
  #[error(
    "optimizer did not converge after {iterations} iterations (risk {risk:.6}, stationarity {stationarity:e})"
  )]
  OptimizationDidNotConverge {
    best: WeightVector,
    risk: f64,
    iterations: u64,
    stationarity: f64,
  },

  #[error("objective evaluation failed: {0}")]
  Objective(#[from] anyhow::Error),

  #[error("pipeline cancelled")]
  Cancelled,

  #[error("pipeline task failed: {0}")]
  TaskFailed(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),

  #[error("config error: {0}")]
  Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PortfolioError>;
