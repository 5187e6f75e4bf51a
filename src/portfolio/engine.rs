//! # Portfolio Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}\big(\Sigma(\operatorname{Align}(P_1,\dots,P_N))\big)
//! $$
//!
//! Orchestrates fetch, covariance build, staging, degeneracy check,
//! optimization and reporting for one request, inline or as a cancellable task.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::AbortHandle;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::instrument;

use super::data::build_covariance;
use super::data::check_degeneracy;
use super::optimizers::optimize_min_risk;
use super::report::build_report;
use super::types::OptimizationResult;
use crate::config::PipelineConfig;
use crate::data::PriceSeriesFetcher;
use crate::data::PriceSource;
use crate::error::PortfolioError;
use crate::error::Result;

/// Ordered ticker selection over a half-open date window `[start, end)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortfolioRequest {
  tickers: Vec<String>,
  start: NaiveDate,
  end: NaiveDate,
}

impl PortfolioRequest {
  /// Validate a request. Symbols are trimmed; order is preserved and fixes the
  /// column order of every table downstream.
  pub fn new<I, S>(tickers: I, start: NaiveDate, end: NaiveDate) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let tickers: Vec<String> = tickers
      .into_iter()
      .map(|t| t.into().trim().to_string())
      .collect();

    if tickers.is_empty() {
      return Err(PortfolioError::InvalidRequest(
        "at least one ticker is required".to_string(),
      ));
    }
    if tickers.iter().any(|t| t.is_empty()) {
      return Err(PortfolioError::InvalidRequest(
        "ticker symbol is empty".to_string(),
      ));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = tickers.iter().find(|t| !seen.insert(t.as_str())) {
      return Err(PortfolioError::InvalidRequest(format!(
        "ticker {dup} is selected twice"
      )));
    }
    if start >= end {
      return Err(PortfolioError::InvalidRequest(format!(
        "start {start} must be before end {end}"
      )));
    }

    Ok(Self {
      tickers,
      start,
      end,
    })
  }

  /// Append an exchange suffix (e.g. `.BO`) to symbols that do not already carry it.
  pub fn with_suffix(mut self, suffix: &str) -> Self {
    if suffix.is_empty() {
      return self;
    }
    for ticker in &mut self.tickers {
      if !ticker.ends_with(suffix) {
        ticker.push_str(suffix);
      }
    }
    self
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn start(&self) -> NaiveDate {
    self.start
  }

  pub fn end(&self) -> NaiveDate {
    self.end
  }
}

/// Single entry point for minimum-risk allocation runs.
///
/// Runs share nothing mutable, so one engine can serve concurrent requests.
#[derive(Clone)]
pub struct PortfolioEngine {
  config: PipelineConfig,
  fetcher: PriceSeriesFetcher,
}

impl PortfolioEngine {
  pub fn new(config: PipelineConfig, source: Arc<dyn PriceSource>) -> Self {
    Self {
      config,
      fetcher: PriceSeriesFetcher::new(source),
    }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Run the whole pipeline for `request`.
  ///
  /// The first failing stage aborts the run; no partial result is produced.
  #[instrument(
    skip_all,
    fields(tickers = ?request.tickers(), start = %request.start(), end = %request.end())
  )]
  pub async fn run(&self, request: &PortfolioRequest) -> Result<OptimizationResult> {
    let request = match self.config.exchange_suffix.as_deref() {
      Some(suffix) => request.clone().with_suffix(suffix),
      None => request.clone(),
    };

    let series = self
      .fetcher
      .fetch_all(request.tickers(), request.start(), request.end())
      .await?;
    let inputs = build_covariance(&series)?;
    info!(
      rows = inputs.aligned.n_rows(),
      returns = inputs.returns.n_rows(),
      "built covariance matrix"
    );

    if let Some(path) = &self.config.staging_path {
      inputs.aligned.write_csv_path(path)?;
      info!(path = %path.display(), "staged aligned prices");
    }

    check_degeneracy(&inputs.covariance, self.config.degeneracy_tolerance)?;

    let n = inputs.covariance.dim();
    let outcome = optimize_min_risk(&inputs.covariance, n, &self.config.solver)?;
    info!(
      equal_weight_risk = outcome.equal_weight_risk,
      optimized_risk = outcome.risk,
      iterations = outcome.iterations,
      "optimized weights"
    );

    Ok(build_report(inputs, outcome))
  }

  /// Run the pipeline as a tokio task.
  pub fn spawn(self: &Arc<Self>, request: PortfolioRequest) -> PipelineHandle {
    let engine = Arc::clone(self);
    PipelineHandle {
      task: tokio::spawn(async move { engine.run(&request).await }),
    }
  }
}

/// Handle to a pipeline started with [`PortfolioEngine::spawn`].
#[derive(Debug)]
pub struct PipelineHandle {
  task: JoinHandle<Result<OptimizationResult>>,
}

impl PipelineHandle {
  /// Abort the run. Fetches still in flight are abandoned.
  pub fn cancel(&self) {
    self.task.abort();
  }

  /// Cancellation handle that outlives [`PipelineHandle::join`].
  pub fn abort_handle(&self) -> AbortHandle {
    self.task.abort_handle()
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }

  /// Wait for the run. A cancelled run yields [`PortfolioError::Cancelled`].
  pub async fn join(self) -> Result<OptimizationResult> {
    match self.task.await {
      Ok(result) => result,
      Err(e) if e.is_cancelled() => Err(PortfolioError::Cancelled),
      Err(e) => Err(PortfolioError::TaskFailed(e.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use async_trait::async_trait;
  use tracing_test::traced_test;

  use super::*;
  use crate::data::DailyBar;
  use crate::data::InMemorySource;
  use crate::portfolio::report::annualize_return;

  const RETURNS_A: [f64; 4] = [0.01, -0.01, 0.02, 0.00];
  const RETURNS_B: [f64; 4] = [0.00, 0.02, -0.02, 0.04];

  struct StalledSource;

  #[async_trait]
  impl PriceSource for StalledSource {
    async fn daily_bars(
      &self,
      _ticker: &str,
      _start: NaiveDate,
      _end: NaiveDate,
    ) -> anyhow::Result<Vec<DailyBar>> {
      std::future::pending().await
    }
  }

  fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
  }

  fn closes(returns: &[f64]) -> Vec<(NaiveDate, f64)> {
    let mut price = 100.0;
    let mut out = vec![(d(4), price)];
    for (i, r) in returns.iter().enumerate() {
      price *= 1.0 + r;
      out.push((d(5 + i as u32), price));
    }
    out
  }

  fn source() -> InMemorySource {
    InMemorySource::new()
      .with_closes("A", &closes(&RETURNS_A))
      .with_closes("B", &closes(&RETURNS_B))
      .with_closes("FLAT", &[(d(4), 50.0), (d(5), 50.0), (d(6), 50.0), (d(7), 50.0)])
      .with_closes("LATE", &[(d(20), 10.0), (d(21), 11.0), (d(22), 12.0)])
  }

  fn config() -> PipelineConfig {
    PipelineConfig {
      exchange_suffix: None,
      ..PipelineConfig::default()
    }
  }

  fn engine() -> PortfolioEngine {
    PortfolioEngine::new(config(), Arc::new(source()))
  }

  fn request(tickers: &[&str]) -> PortfolioRequest {
    PortfolioRequest::new(tickers.iter().copied(), d(1), d(31)).unwrap()
  }

  #[test]
  fn request_validation() {
    let invalid = |r: Result<PortfolioRequest>| matches!(r, Err(PortfolioError::InvalidRequest(_)));

    assert!(invalid(PortfolioRequest::new(Vec::<String>::new(), d(1), d(31))));
    assert!(invalid(PortfolioRequest::new(["A", " "], d(1), d(31))));
    assert!(invalid(PortfolioRequest::new(["A", "B", "A"], d(1), d(31))));
    assert!(invalid(PortfolioRequest::new(["A"], d(31), d(31))));
    assert_eq!(request(&[" A ", "B"]).tickers(), &["A", "B"]);
  }

  #[test]
  fn suffix_is_appended_once() {
    let req = request(&["TCS", "INFY.BO"]).with_suffix(".BO").with_suffix(".BO");
    assert_eq!(req.tickers(), &["TCS.BO", "INFY.BO"]);
    assert_eq!(request(&["TCS"]).with_suffix("").tickers(), &["TCS"]);
  }

  #[tokio::test]
  #[traced_test]
  async fn two_assets_match_hand_computation() {
    let result = engine().run(&request(&["A", "B"])).await.unwrap();

    assert_eq!(result.tickers, vec!["A".to_string(), "B".to_string()]);
    assert_relative_eq!(result.weights.as_slice()[0], 28.0 / 41.0, max_relative = 1e-9);
    assert_relative_eq!(result.weights.as_slice()[1], 13.0 / 41.0, max_relative = 1e-9);

    let min_variance: f64 = 360_000.0 / 4_100.0 * 1e-6 / 3.0;
    assert_relative_eq!(result.optimized_risk, (250.0 * min_variance).sqrt(), max_relative = 1e-9);
    assert_relative_eq!(
      result.equal_weight_risk,
      (250.0 * 75e-6_f64).sqrt(),
      max_relative = 1e-9
    );

    let daily = 28.0 / 41.0 * 0.005 + 13.0 / 41.0 * 0.01;
    assert_relative_eq!(
      result.expected_annual_return,
      annualize_return(daily),
      max_relative = 1e-9
    );
    assert_eq!(result.rounded_weights, vec![0.683, 0.317]);
    assert_eq!(result.aligned.n_rows(), 5);

    assert!(logs_contain("optimized weights"));
  }

  #[tokio::test]
  async fn single_ticker_takes_the_whole_allocation() {
    let result = engine().run(&request(&["A"])).await.unwrap();

    // sample variance of A's returns: 500e-6 / 3
    let variance: f64 = 500e-6 / 3.0;
    assert_eq!(result.tickers, vec!["A".to_string()]);
    assert_eq!(result.weights.as_slice(), &[1.0]);
    assert_eq!(result.rounded_weights, vec![1.0]);
    assert_eq!(result.iterations, 0);
    assert_relative_eq!(result.optimized_risk, (250.0 * variance).sqrt(), max_relative = 1e-9);
    assert_eq!(result.optimized_risk, result.equal_weight_risk);
    assert_eq!(result.covariance.dim(), 1);
  }

  #[tokio::test]
  async fn identical_inputs_give_identical_results() {
    let engine = engine();
    let first = engine.run(&request(&["A", "B"])).await.unwrap();
    let second = engine.run(&request(&["A", "B"])).await.unwrap();

    assert_eq!(first.weights, second.weights);
    assert_eq!(first.optimized_risk, second.optimized_risk);
    assert_eq!(first.expected_annual_return, second.expected_annual_return);
  }

  #[tokio::test]
  async fn missing_ticker_fails_the_whole_run() {
    let err = engine().run(&request(&["A", "GHOST", "B"])).await.unwrap_err();

    assert!(matches!(
      err,
      PortfolioError::DataUnavailable { ref ticker, .. } if ticker == "GHOST"
    ));
  }

  #[tokio::test]
  async fn disjoint_histories_have_no_overlap() {
    let err = engine().run(&request(&["A", "LATE"])).await.unwrap_err();
    assert!(matches!(err, PortfolioError::InsufficientOverlap { .. }));
  }

  #[tokio::test]
  async fn constant_prices_are_rejected_before_optimizing() {
    let err = engine().run(&request(&["A", "FLAT"])).await.unwrap_err();

    match err {
      PortfolioError::DegenerateInput(msg) => assert!(msg.contains("FLAT")),
      other => panic!("expected DegenerateInput, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn exchange_suffix_is_applied() {
    let source = InMemorySource::new()
      .with_closes("A.BO", &closes(&RETURNS_A))
      .with_closes("B.BO", &closes(&RETURNS_B));
    let engine = PortfolioEngine::new(PipelineConfig::default(), Arc::new(source));

    let result = engine.run(&request(&["A", "B"])).await.unwrap();
    assert_eq!(result.tickers, vec!["A.BO".to_string(), "B.BO".to_string()]);
  }

  #[tokio::test]
  async fn staging_table_is_written_before_optimizing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("staging").join("stock-risk.csv");
    let engine = PortfolioEngine::new(
      PipelineConfig {
        staging_path: Some(path.clone()),
        ..config()
      },
      Arc::new(source()),
    );

    // staging happens even though the degeneracy check then fails
    let err = engine.run(&request(&["A", "FLAT"])).await.unwrap_err();
    assert!(matches!(err, PortfolioError::DegenerateInput(_)));

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next(), Some("Date,A-close,FLAT-close"));
    assert_eq!(text.lines().count(), 5);
  }

  #[tokio::test]
  async fn spawned_run_joins_with_the_result() {
    let engine = Arc::new(engine());
    let handle = engine.spawn(request(&["A", "B"]));

    let result = handle.join().await.unwrap();
    assert_eq!(result.tickers.len(), 2);
  }

  #[tokio::test]
  async fn concurrent_runs_do_not_interfere() {
    let engine = Arc::new(engine());
    let first = engine.spawn(request(&["A", "B"]));
    let second = engine.spawn(request(&["B", "A"]));

    let first = first.join().await.unwrap();
    let second = second.join().await.unwrap();
    assert_relative_eq!(first.weights.as_slice()[0], second.weights.as_slice()[1], max_relative = 1e-9);
  }

  #[tokio::test]
  async fn cancelled_run_reports_cancellation() {
    let engine = Arc::new(PortfolioEngine::new(config(), Arc::new(StalledSource)));
    let handle = engine.spawn(request(&["A", "B"]));
    tokio::task::yield_now().await;

    handle.cancel();
    assert!(matches!(handle.join().await, Err(PortfolioError::Cancelled)));
  }
}
