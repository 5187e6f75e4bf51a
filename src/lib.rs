//! # Stock Risk
//!
//! $$
//! \mathbf{w}^\*=\arg\min_{\mathbf{w}\in\Delta_n} \sqrt{250\,\mathbf{w}^\top \Sigma \mathbf{w}}
//! $$
//!
//! `stock_risk` computes the minimum-variance allocation of capital across an ordered set of
//! equities from historical daily close prices.
//!
//! ## Modules
//!
//! | Module          | Description                                                                    |
//! |-----------------|--------------------------------------------------------------------------------|
//! | [`data`]        | Daily close series, price sources (in-memory, CSV, Yahoo) and the fetcher.     |
//! | [`portfolio`]   | Alignment, returns, covariance, risk evaluation, optimization and reporting.  |
//! | [`config`]      | TOML-backed pipeline configuration.                                            |
//! | [`error`]       | Typed errors shared by every stage.                                            |
//!
//! ## Features
//!
//! - `yahoo`: Enables [`data::yahoo::YahooSource`] backed by the Yahoo Finance chart API
//!
//! ## Pipeline
//!
//! fetch → align → returns → covariance → optimize → report. The whole pipeline runs as a tokio
//! task through [`portfolio::PortfolioEngine::spawn`], which can be cancelled.

pub mod config;
pub mod data;
pub mod error;
pub mod portfolio;

pub use config::PipelineConfig;
pub use error::PortfolioError;
pub use error::Result;
