//! # Pipeline Configuration
//!
//! Runtime knobs for [`crate::portfolio::PortfolioEngine`], loadable from TOML.
//!
//! ```toml
//! exchange_suffix = ".BO"
//! staging_path = "output/stock-risk-staging.csv"
//! log_level = "info"
//!
//! [solver]
//! max_iters = 10000
//! tolerance = 1e-10
//! ```

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;

/// Stopping rules for the simplex solver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
  /// Iteration cap before reporting non-convergence.
  pub max_iters: u64,
  /// Projected-gradient stationarity threshold (infinity norm).
  pub tolerance: f64,
}

impl Default for SolverConfig {
  fn default() -> Self {
    Self {
      max_iters: 10_000,
      tolerance: 1e-10,
    }
  }
}

/// Runtime configuration for [`crate::portfolio::PortfolioEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// Market suffix appended to bare symbols, e.g. `.BO` for BSE listings.
  pub exchange_suffix: Option<String>,
  /// Solver stopping rules.
  pub solver: SolverConfig,
  /// Relative eigenvalue floor below which the covariance matrix is rejected.
  pub degeneracy_tolerance: f64,
  /// Where to stage the aligned price table before optimizing. Disabled when `None`.
  pub staging_path: Option<PathBuf>,
  /// Default log level for the binary when `RUST_LOG` is unset.
  pub log_level: String,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      exchange_suffix: Some(".BO".to_string()),
      solver: SolverConfig::default(),
      degeneracy_tolerance: 1e-12,
      staging_path: None,
      log_level: "info".to_string(),
    }
  }
}

impl PipelineConfig {
  /// Parse a configuration from TOML text. Missing keys take their defaults.
  pub fn from_toml_str(text: &str) -> Result<Self> {
    Ok(toml::from_str(text)?)
  }

  /// Load a configuration file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let text = fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }
}
