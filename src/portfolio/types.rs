//! # Portfolio Types
//!
//! $$
//! R_{t,i}=\frac{P_{t,i}-P_{t-1,i}}{P_{t-1,i}},\qquad
//! \Sigma_{ij}=\frac{1}{T-1}\sum_t (R_{t,i}-\bar R_i)(R_{t,j}-\bar R_j)
//! $$
//!
//! Tables, weight vectors and result containers shared by the portfolio pipeline.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;

use crate::error::PortfolioError;
use crate::error::Result;

/// Closes of every selected ticker on the dates all of them traded.
///
/// Rows are dates, columns follow the request's ticker order. Never contains gaps.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedPriceTable {
  pub(crate) tickers: Vec<String>,
  pub(crate) dates: Vec<NaiveDate>,
  pub(crate) prices: Array2<f64>,
}

impl AlignedPriceTable {
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  pub fn n_rows(&self) -> usize {
    self.dates.len()
  }
}

/// Simple daily returns; one row fewer than the price table it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnsTable {
  pub(crate) tickers: Vec<String>,
  pub(crate) dates: Vec<NaiveDate>,
  pub(crate) returns: Array2<f64>,
}

impl ReturnsTable {
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Date of each return row (the later date of each pair).
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn returns(&self) -> &Array2<f64> {
    &self.returns
  }

  pub fn n_rows(&self) -> usize {
    self.dates.len()
  }

  /// Mean daily return per ticker.
  pub fn mean_returns(&self) -> Array1<f64> {
    self
      .returns
      .mean_axis(Axis(0))
      .unwrap_or_else(|| Array1::zeros(self.tickers.len()))
  }
}

/// Sample covariance of daily returns, indexed in ticker order.
#[derive(Clone, Debug, PartialEq)]
pub struct CovarianceMatrix {
  tickers: Vec<String>,
  values: Array2<f64>,
}

impl CovarianceMatrix {
  /// Wrap a square matrix whose side matches the ticker count.
  pub fn new(tickers: Vec<String>, values: Array2<f64>) -> Result<Self> {
    let (rows, cols) = values.dim();
    if rows != cols || rows != tickers.len() {
      return Err(PortfolioError::InvalidRequest(format!(
        "covariance matrix is {rows}x{cols} for {} tickers",
        tickers.len()
      )));
    }
    Ok(Self { tickers, values })
  }

  /// Wrap an anonymous matrix; tickers are named `asset-0`, `asset-1`, ...
  pub fn from_array(values: Array2<f64>) -> Result<Self> {
    let tickers = (0..values.nrows()).map(|i| format!("asset-{i}")).collect();
    Self::new(tickers, values)
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn dim(&self) -> usize {
    self.tickers.len()
  }
}

/// Ordered portfolio weights. Entry `i` belongs to column `i` of the covariance matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
  /// `1/n` for each of `n` assets.
  pub fn equal(n: usize) -> Self {
    if n == 0 {
      return Self(Vec::new());
    }
    Self(vec![1.0 / n as f64; n])
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }

  pub fn into_inner(self) -> Vec<f64> {
    self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn sum(&self) -> f64 {
    self.0.iter().sum()
  }

  pub fn iter(&self) -> impl Iterator<Item = &f64> {
    self.0.iter()
  }

  /// Copy rounded half away from zero to `decimals` places, for display.
  pub fn rounded(&self, decimals: i32) -> Vec<f64> {
    let scale = 10f64.powi(decimals);
    self.0.iter().map(|w| (w * scale).round() / scale).collect()
  }
}

impl From<Vec<f64>> for WeightVector {
  fn from(weights: Vec<f64>) -> Self {
    Self(weights)
  }
}

/// Everything the builder derives from one set of price series.
#[derive(Clone, Debug)]
pub struct CovarianceInputs {
  pub aligned: AlignedPriceTable,
  pub returns: ReturnsTable,
  pub covariance: CovarianceMatrix,
}

/// Output of the minimum-risk optimizer.
#[derive(Clone, Debug)]
pub struct OptimizationOutcome {
  /// Annualized risk of the `1/n` starting portfolio.
  pub equal_weight_risk: f64,
  /// Minimum-risk weights.
  pub weights: WeightVector,
  /// Annualized risk at `weights`.
  pub risk: f64,
  /// Solver iterations used.
  pub iterations: u64,
}

/// Final product of one pipeline run.
#[derive(Clone, Debug)]
pub struct OptimizationResult {
  /// Tickers in column order.
  pub tickers: Vec<String>,
  /// Full-precision optimized weights.
  pub weights: WeightVector,
  /// `weights` rounded to three decimals for display.
  pub rounded_weights: Vec<f64>,
  /// Annualized risk of the equal-weight portfolio.
  pub equal_weight_risk: f64,
  /// Annualized risk of the optimized portfolio.
  pub optimized_risk: f64,
  /// `(1 + r)^250 - 1` where `r` is the optimized portfolio's mean daily return.
  pub expected_annual_return: f64,
  /// Solver iterations used.
  pub iterations: u64,
  pub aligned: AlignedPriceTable,
  pub returns: ReturnsTable,
  pub covariance: CovarianceMatrix,
}
