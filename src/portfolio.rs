//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Minimum-variance allocation: alignment, covariance, risk, optimization and reporting.

pub mod data;
pub mod engine;
pub mod optimizers;
pub mod report;
pub mod risk;
pub mod types;

pub use data::align_price_series;
pub use data::build_covariance;
pub use data::check_degeneracy;
pub use data::sample_covariance;
pub use data::simple_returns;
pub use engine::PipelineHandle;
pub use engine::PortfolioEngine;
pub use engine::PortfolioRequest;
pub use optimizers::optimize_min_risk;
pub use report::annualize_return;
pub use report::build_report;
pub use risk::annualized_risk;
pub use risk::portfolio_variance;
pub use risk::risk_gradient;
pub use risk::RiskObjective;
pub use risk::TRADING_DAYS;
pub use types::AlignedPriceTable;
pub use types::CovarianceInputs;
pub use types::CovarianceMatrix;
pub use types::OptimizationOutcome;
pub use types::OptimizationResult;
pub use types::ReturnsTable;
pub use types::WeightVector;
