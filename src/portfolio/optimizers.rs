//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{w}} \ \sqrt{250\,\mathbf{w}^\top \Sigma \mathbf{w}}
//! \quad \text{s.t.} \quad \mathbf{1}^\top\mathbf{w} = 1,\ 0 \le w_i \le 1
//! $$
//!
//! Long-only minimum-risk allocation. Projected gradient descent on the unit
//! simplex with Armijo backtracking, finished by an exact active-set solve
//! $\mathbf{w}^\* \propto \Sigma_{SS}^{-1}\mathbf{1}$ once the support settles.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array2;
use ndarray::ArrayView1;
use tracing::debug;
use tracing::warn;

use super::risk::RiskObjective;
use super::types::CovarianceMatrix;
use super::types::OptimizationOutcome;
use super::types::WeightVector;
use crate::config::SolverConfig;
use crate::error::PortfolioError;
use crate::error::Result;

const MAX_BACKTRACKS: usize = 80;
const MAX_STEP: f64 = 1e6;

fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean projection onto `{w : w >= 0, sum(w) = 1}`.
pub(crate) fn project_simplex(v: &[f64]) -> Vec<f64> {
  let mut u = v.to_vec();
  u.sort_by(|a, b| b.total_cmp(a));

  let mut cumsum = 0.0;
  let mut theta = 0.0;
  for (j, &uj) in u.iter().enumerate() {
    cumsum += uj;
    let candidate = (cumsum - 1.0) / (j + 1) as f64;
    if uj - candidate > 0.0 {
      theta = candidate;
    }
  }

  v.iter().map(|&x| (x - theta).max(0.0)).collect()
}

/// `max_i |w_i - P(w - g)_i|`; zero exactly at a constrained stationary point.
fn stationarity(w: &[f64], grad: &[f64]) -> f64 {
  let shifted: Vec<f64> = w.iter().zip(grad).map(|(wi, gi)| wi - gi).collect();
  project_simplex(&shifted)
    .iter()
    .zip(w)
    .map(|(p, wi)| (p - wi).abs())
    .fold(0.0, f64::max)
}

fn support_of(w: &[f64]) -> Vec<usize> {
  (0..w.len()).filter(|&i| w[i] > 0.0).collect()
}

/// Minimum-variance weights restricted to `support`, if they are the global
/// long-only optimum.
fn active_set_step(sigma: &Array2<f64>, support: &[usize], tolerance: f64) -> Option<Vec<f64>> {
  let n = sigma.nrows();
  let k = support.len();
  if k == 0 {
    return None;
  }

  let sub = DMatrix::from_fn(k, k, |i, j| sigma[(support[i], support[j])]);
  let x = sub.cholesky()?.solve(&DVector::from_element(k, 1.0));
  let total = x.sum();
  if !total.is_finite() || total <= 0.0 || x.iter().any(|&xi| xi <= 0.0) {
    return None;
  }

  let mut w = vec![0.0; n];
  for (&i, &xi) in support.iter().zip(x.iter()) {
    w[i] = xi / total;
  }

  // KKT: no asset outside the support may lower the risk at the margin.
  let sigma_w = sigma.dot(&ArrayView1::from(&w));
  let variance = sigma_w.dot(&ArrayView1::from(&w));
  let slack = tolerance * variance.abs();
  let kkt = (0..n)
    .filter(|&i| w[i] == 0.0)
    .all(|i| sigma_w[i] >= variance - slack);

  kkt.then_some(w)
}

/// Long-only minimum-risk weights for `n` assets.
///
/// Starts from `1/n` each. Returns [`PortfolioError::OptimizationDidNotConverge`]
/// carrying the best iterate when `solver.max_iters` gradient steps do not reach
/// `solver.tolerance`, or when the line search can no longer make progress.
pub fn optimize_min_risk(
  covariance: &CovarianceMatrix,
  n: usize,
  solver: &SolverConfig,
) -> Result<OptimizationOutcome> {
  if n == 0 {
    return Err(PortfolioError::DegenerateInput(
      "no assets to allocate".to_string(),
    ));
  }
  if n != covariance.dim() {
    return Err(PortfolioError::DegenerateInput(format!(
      "{n} assets requested for a {0}x{0} covariance matrix",
      covariance.dim()
    )));
  }

  let objective = RiskObjective::new(covariance);
  let mut w = WeightVector::equal(n).into_inner();
  let equal_weight_risk = objective.cost(&w)?;
  if !equal_weight_risk.is_finite() {
    return Err(PortfolioError::DegenerateInput(
      "risk of the equal-weight portfolio is not finite".to_string(),
    ));
  }

  if n == 1 {
    return Ok(OptimizationOutcome {
      equal_weight_risk,
      weights: WeightVector::from(vec![1.0]),
      risk: equal_weight_risk,
      iterations: 0,
    });
  }

  let sigma = covariance.values();
  let mut risk = equal_weight_risk;
  let mut step = 1.0;
  let mut tried_support: Option<Vec<usize>> = None;
  let mut iterations = 0;

  while iterations < solver.max_iters {
    let support = support_of(&w);
    if tried_support.as_ref() != Some(&support) {
      if let Some(optimum) = active_set_step(sigma, &support, solver.tolerance) {
        let optimum_risk = objective.cost(&optimum)?;
        debug!(iterations, risk = optimum_risk, "active-set step is optimal");
        return Ok(OptimizationOutcome {
          equal_weight_risk,
          weights: WeightVector::from(optimum),
          risk: optimum_risk,
          iterations,
        });
      }
      tried_support = Some(support);
    }

    let grad = objective.gradient(&w)?;
    let gap = stationarity(&w, &grad);
    if gap <= solver.tolerance {
      debug!(iterations, risk, gap, "projected gradient is stationary");
      return Ok(OptimizationOutcome {
        equal_weight_risk,
        weights: WeightVector::from(w),
        risk,
        iterations,
      });
    }

    iterations += 1;

    let mut accepted = None;
    for _ in 0..MAX_BACKTRACKS {
      let shifted: Vec<f64> = w.iter().zip(&grad).map(|(wi, gi)| wi - step * gi).collect();
      let trial = project_simplex(&shifted);
      let d: Vec<f64> = trial.iter().zip(&w).map(|(t, wi)| t - wi).collect();
      let d_sq = dot(&d, &d);
      if d_sq == 0.0 {
        break;
      }

      let trial_risk = objective.cost(&trial)?;
      if trial_risk <= risk + dot(&grad, &d) + d_sq / (2.0 * step) {
        accepted = Some((trial, trial_risk));
        break;
      }
      step *= 0.5;
    }

    match accepted {
      Some((trial, trial_risk)) => {
        w = trial;
        risk = trial_risk;
        step = (step * 2.0).min(MAX_STEP);
      }
      None => {
        warn!(iterations, risk, gap, "line search stalled");
        return Err(PortfolioError::OptimizationDidNotConverge {
          best: WeightVector::from(w),
          risk,
          iterations,
          stationarity: gap,
        });
      }
    }
  }

  let grad = objective.gradient(&w)?;
  let gap = stationarity(&w, &grad);
  warn!(iterations, risk, gap, "optimizer hit the iteration limit");
  Err(PortfolioError::OptimizationDidNotConverge {
    best: WeightVector::from(w),
    risk,
    iterations,
    stationarity: gap,
  })
}
