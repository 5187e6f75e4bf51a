//! # Portfolio Risk
//!
//! $$
//! \sigma_{\text{ann}}(\mathbf{w}) = \sqrt{250}\,\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}},\qquad
//! \nabla\sigma_{\text{ann}} = \sqrt{250}\,\frac{\Sigma\mathbf{w}}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! $$
//!
//! Annualized portfolio volatility and its gradient.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use ndarray::ArrayView1;

use super::types::CovarianceMatrix;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 250.0;

/// Daily portfolio variance `wᵀΣw`. Weights need not sum to one.
///
/// # Panics
/// Panics when `weights.len()` differs from the covariance dimension.
pub fn portfolio_variance(weights: &[f64], covariance: &CovarianceMatrix) -> f64 {
  assert_eq!(
    weights.len(),
    covariance.dim(),
    "weight vector length must match covariance dimension"
  );
  let w = ArrayView1::from(weights);
  w.dot(&covariance.values().dot(&w))
}

/// Annualized portfolio standard deviation.
///
/// Round-off negatives clamp to zero; NaN in the covariance propagates.
pub fn annualized_risk(weights: &[f64], covariance: &CovarianceMatrix) -> f64 {
  let variance = portfolio_variance(weights, covariance);
  let variance = if variance < 0.0 { 0.0 } else { variance };
  variance.sqrt() * TRADING_DAYS.sqrt()
}

/// Gradient of [`annualized_risk`]; the zero vector where the variance vanishes.
pub fn risk_gradient(weights: &[f64], covariance: &CovarianceMatrix) -> Vec<f64> {
  let w = ArrayView1::from(weights);
  let sigma_w = covariance.values().dot(&w);
  let variance = w.dot(&sigma_w);
  if variance <= 0.0 {
    return vec![0.0; weights.len()];
  }

  let scale = TRADING_DAYS.sqrt() / variance.sqrt();
  sigma_w.iter().map(|v| v * scale).collect()
}

/// [`annualized_risk`] as an `argmin` problem over a fixed covariance matrix.
#[derive(Clone, Copy, Debug)]
pub struct RiskObjective<'a> {
  covariance: &'a CovarianceMatrix,
}

impl<'a> RiskObjective<'a> {
  pub fn new(covariance: &'a CovarianceMatrix) -> Self {
    Self { covariance }
  }

  pub fn covariance(&self) -> &'a CovarianceMatrix {
    self.covariance
  }
}

impl CostFunction for RiskObjective<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, w: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    Ok(annualized_risk(w, self.covariance))
  }
}

impl Gradient for RiskObjective<'_> {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, w: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
    Ok(risk_gradient(w, self.covariance))
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::array;
  use ndarray::Array2;
  use proptest::prelude::*;

  use super::*;

  fn cov3() -> CovarianceMatrix {
    CovarianceMatrix::from_array(array![
      [0.04, 0.01, 0.0],
      [0.01, 0.09, 0.02],
      [0.0, 0.02, 0.16],
    ])
    .unwrap()
  }

  #[test]
  fn single_asset_risk_is_annualized_volatility() {
    let cov = CovarianceMatrix::from_array(array![[0.0004]]).unwrap();
    assert_relative_eq!(
      annualized_risk(&[1.0], &cov),
      0.02 * 250f64.sqrt(),
      max_relative = 1e-12
    );
  }

  #[test]
  fn quadratic_form_matches_expansion() {
    let cov = cov3();
    let w = [0.2, 0.3, 0.5];
    let expected: f64 = 0.04 * 0.04 + 0.09 * 0.09 + 0.16 * 0.25 + 2.0 * (0.01 * 0.06 + 0.02 * 0.15);

    assert_relative_eq!(portfolio_variance(&w, &cov), expected, max_relative = 1e-12);
    assert_relative_eq!(
      annualized_risk(&w, &cov),
      (expected * 250.0).sqrt(),
      max_relative = 1e-12
    );
  }

  #[test]
  fn accepts_weights_off_the_simplex() {
    let cov = cov3();
    let risk = annualized_risk(&[2.0, 0.0, 0.0], &cov);
    assert_relative_eq!(risk, 2.0 * 0.2 * 250f64.sqrt(), max_relative = 1e-12);
  }

  #[test]
  fn nan_covariance_propagates() {
    let cov = CovarianceMatrix::from_array(array![[f64::NAN, 0.0], [0.0, 0.01]]).unwrap();
    assert!(annualized_risk(&[0.5, 0.5], &cov).is_nan());
  }

  #[test]
  #[should_panic(expected = "weight vector length")]
  fn length_mismatch_panics() {
    annualized_risk(&[1.0], &cov3());
  }

  #[test]
  fn gradient_matches_finite_differences() {
    let cov = cov3();
    let w = vec![0.25, 0.35, 0.4];
    let grad = risk_gradient(&w, &cov);
    let h = 1e-7;

    for i in 0..w.len() {
      let mut up = w.clone();
      let mut down = w.clone();
      up[i] += h;
      down[i] -= h;
      let numeric = (annualized_risk(&up, &cov) - annualized_risk(&down, &cov)) / (2.0 * h);
      assert_abs_diff_eq!(grad[i], numeric, epsilon = 1e-6);
    }
  }

  #[test]
  fn objective_delegates_to_the_evaluator() {
    let cov = cov3();
    let objective = RiskObjective::new(&cov);
    let w = vec![0.1, 0.6, 0.3];

    assert_eq!(objective.cost(&w).unwrap(), annualized_risk(&w, &cov));
    assert_eq!(objective.gradient(&w).unwrap(), risk_gradient(&w, &cov));
  }

  fn pd_covariance() -> impl Strategy<Value = (CovarianceMatrix, Vec<f64>)> {
    (1usize..6).prop_flat_map(|n| {
      (
        prop::collection::vec(-1.0f64..1.0, n * n),
        prop::collection::vec(-2.0f64..2.0, n),
      )
        .prop_map(move |(a, w)| {
          let a = Array2::from_shape_vec((n, n), a).unwrap();
          let mut sigma = a.t().dot(&a);
          for i in 0..n {
            sigma[(i, i)] += 1e-3;
          }
          (CovarianceMatrix::from_array(sigma).unwrap(), w)
        })
    })
  }

  proptest! {
    #[test]
    fn risk_is_never_negative((cov, w) in pd_covariance()) {
      let risk = annualized_risk(&w, &cov);
      prop_assert!(risk >= 0.0);
      prop_assert!(risk.is_finite());
    }
  }
}
