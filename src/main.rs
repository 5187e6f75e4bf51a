use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use clap::ValueEnum;
use stock_risk::config::PipelineConfig;
use stock_risk::data::CsvSource;
use stock_risk::data::PriceSource;
use stock_risk::portfolio::PortfolioEngine;
use stock_risk::portfolio::PortfolioRequest;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
  /// `<data-dir>/<TICKER>.csv` files with at least `Date` and `Close` columns
  Csv,
  /// Yahoo Finance (requires the `yahoo` feature)
  Yahoo,
}

#[derive(Parser, Debug)]
#[command(name = "stock-risk", version, about = "Minimum-risk long-only portfolio weights")]
struct Cli {
  /// Comma-separated ticker symbols, in column order
  #[arg(long, value_delimiter = ',', required = true)]
  tickers: Vec<String>,

  /// First day of the window (YYYY-MM-DD, inclusive)
  #[arg(long)]
  start: NaiveDate,

  /// Last day of the window (YYYY-MM-DD, exclusive)
  #[arg(long)]
  end: NaiveDate,

  #[arg(long, value_enum, default_value_t = SourceKind::Csv)]
  source: SourceKind,

  /// Directory holding per-ticker CSV files
  #[arg(long, default_value = "data")]
  data_dir: PathBuf,

  /// Exchange suffix appended to bare symbols; overrides the config file (empty to disable)
  #[arg(long)]
  suffix: Option<String>,

  /// TOML configuration file
  #[arg(long)]
  config: Option<PathBuf>,

  /// Directory for stock-data.csv and optimized-weights.csv
  #[arg(long)]
  output: Option<PathBuf>,
}

fn init_logging(default_level: &str) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  if let Err(e) = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .try_init()
  {
    eprintln!("logging disabled: {e}");
  }
}

#[cfg(feature = "yahoo")]
fn yahoo_source() -> Result<Arc<dyn PriceSource>> {
  Ok(Arc::new(stock_risk::data::YahooSource::new()?))
}

#[cfg(not(feature = "yahoo"))]
fn yahoo_source() -> Result<Arc<dyn PriceSource>> {
  anyhow::bail!("built without the `yahoo` feature; rebuild with `--features yahoo` or use `--source csv`")
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let mut config = match &cli.config {
    Some(path) => PipelineConfig::load(path)
      .with_context(|| format!("cannot load config {}", path.display()))?,
    None => PipelineConfig::default(),
  };
  if let Some(suffix) = &cli.suffix {
    config.exchange_suffix = Some(suffix.clone()).filter(|s| !s.is_empty());
  }
  init_logging(&config.log_level);

  let source: Arc<dyn PriceSource> = match cli.source {
    SourceKind::Csv => Arc::new(CsvSource::new(&cli.data_dir)),
    SourceKind::Yahoo => yahoo_source()?,
  };

  let request = PortfolioRequest::new(cli.tickers, cli.start, cli.end)?;
  let engine = Arc::new(PortfolioEngine::new(config, source));
  let handle = engine.spawn(request);
  let abort = handle.abort_handle();

  let result = tokio::select! {
    result = handle.join() => result?,
    _ = tokio::signal::ctrl_c() => {
      warn!("interrupted, cancelling run");
      abort.abort();
      anyhow::bail!("interrupted");
    }
  };

  println!("{result}");

  if let Some(dir) = &cli.output {
    result
      .export(dir)
      .with_context(|| format!("cannot export to {}", dir.display()))?;
    info!(dir = %dir.display(), "wrote report");
  }

  Ok(())
}
