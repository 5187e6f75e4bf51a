//! # Portfolio Data Utilities
//!
//! $$
//! \Sigma = \frac{1}{T-1}\,(R-\mathbf{1}\bar R^\top)^\top (R-\mathbf{1}\bar R^\top)
//! $$
//!
//! Date alignment, return preprocessing and covariance construction.

use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use nalgebra::DMatrix;
use ndarray::s;
use ndarray::Array2;
use ndarray_stats::CorrelationExt;

use super::types::AlignedPriceTable;
use super::types::CovarianceInputs;
use super::types::CovarianceMatrix;
use super::types::ReturnsTable;
use crate::data::PriceSeries;
use crate::error::PortfolioError;
use crate::error::Result;

/// Inner-join series on date. Columns keep the order of `series`.
pub fn align_price_series(series: &[PriceSeries]) -> Result<AlignedPriceTable> {
  let Some(first) = series.first() else {
    return Err(PortfolioError::DegenerateInput(
      "no tickers selected".to_string(),
    ));
  };

  let tickers: Vec<String> = series.iter().map(|s| s.ticker().to_string()).collect();
  {
    let mut seen = HashSet::new();
    if let Some(dup) = tickers.iter().find(|t| !seen.insert(t.as_str())) {
      return Err(PortfolioError::InvalidRequest(format!(
        "ticker {dup} selected more than once"
      )));
    }
  }

  let common: BTreeSet<_> = first
    .dates()
    .iter()
    .copied()
    .filter(|date| series[1..].iter().all(|s| s.close_on(*date).is_some()))
    .collect();

  if common.len() < 2 {
    return Err(PortfolioError::InsufficientOverlap {
      tickers,
      rows: common.len(),
    });
  }

  let closes: Vec<f64> = series
    .iter()
    .flat_map(|s| s.iter().filter(|(date, _)| common.contains(date)).map(|(_, close)| close))
    .collect();
  let prices = Array2::from_shape_vec((series.len(), common.len()), closes)
    .map_err(|e| PortfolioError::InvalidRequest(format!("cannot shape price table: {e}")))?
    .reversed_axes();

  Ok(AlignedPriceTable {
    tickers,
    dates: common.into_iter().collect(),
    prices,
  })
}

/// Row-over-row percentage change; the first date has no return and is dropped.
pub fn simple_returns(aligned: &AlignedPriceTable) -> ReturnsTable {
  let prices = aligned.prices();
  let prev = prices.slice(s![..-1, ..]);
  let next = prices.slice(s![1.., ..]);

  ReturnsTable {
    tickers: aligned.tickers.clone(),
    dates: aligned.dates[1..].to_vec(),
    returns: (&next - &prev) / &prev,
  }
}

/// Sample covariance (divisor `T - 1`) of the return columns.
pub fn sample_covariance(returns: &ReturnsTable) -> Result<CovarianceMatrix> {
  if returns.n_rows() < 2 {
    return Err(PortfolioError::InsufficientOverlap {
      tickers: returns.tickers.clone(),
      rows: returns.n_rows() + 1,
    });
  }

  let values = returns
    .returns()
    .t()
    .cov(1.0)
    .map_err(|_| PortfolioError::DegenerateInput("returns table is empty".to_string()))?;

  CovarianceMatrix::new(returns.tickers.clone(), values)
}

/// Align, differentiate and take the covariance in one step.
pub fn build_covariance(series: &[PriceSeries]) -> Result<CovarianceInputs> {
  let aligned = align_price_series(series)?;
  let returns = simple_returns(&aligned);
  let covariance = sample_covariance(&returns)?;

  Ok(CovarianceInputs {
    aligned,
    returns,
    covariance,
  })
}

/// Reject covariance matrices that make risk meaningless in some direction.
///
/// Fails on non-finite entries, on a zero-variance asset, and when the smallest eigenvalue is
/// below `tolerance` times the largest.
pub fn check_degeneracy(covariance: &CovarianceMatrix, tolerance: f64) -> Result<()> {
  let values = covariance.values();
  let n = covariance.dim();
  if n == 0 {
    return Err(PortfolioError::DegenerateInput(
      "covariance matrix is empty".to_string(),
    ));
  }
  if values.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::DegenerateInput(
      "covariance matrix has non-finite entries".to_string(),
    ));
  }

  let max_var = values.diag().iter().copied().fold(0.0, f64::max);
  if let Some(i) = (0..n).find(|&i| values[(i, i)] <= tolerance * max_var) {
    return Err(PortfolioError::DegenerateInput(format!(
      "{} has zero return variance (constant price series)",
      covariance.tickers()[i]
    )));
  }

  let eigenvalues = DMatrix::from_fn(n, n, |i, j| values[(i, j)]).symmetric_eigenvalues();
  let largest = eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let smallest = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
  if smallest <= tolerance * largest {
    return Err(PortfolioError::DegenerateInput(format!(
      "covariance matrix is singular (eigenvalues {smallest:e}..{largest:e}); \
       some combination of {:?} carries no risk",
      covariance.tickers()
    )));
  }

  Ok(())
}

impl AlignedPriceTable {
  /// Write the table as `Date,<ticker>-close,...`.
  pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["Date".to_string()];
    header.extend(self.tickers.iter().map(|t| format!("{t}-close")));
    wtr.write_record(&header)?;

    for (date, row) in self.dates.iter().zip(self.prices.rows()) {
      let mut record = vec![date.to_string()];
      record.extend(row.iter().map(|p| p.to_string()));
      wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
  }

  /// Stage the table at `path`, creating parent directories as needed.
  pub fn write_csv_path(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    self.write_csv(File::create(path)?)
  }
}
