use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use chrono::NaiveDate;
use clap::Parser;
use clap::Subcommand;
use portfolio_opt::cluster::ClusterConfig;
use portfolio_opt::cluster::Linkage;
use portfolio_opt::optimizers::HierarchicalConfig;
use portfolio_opt::optimizers::HierarchicalModel;
use portfolio_opt::optimizers::MeanRiskConfig;
use portfolio_opt::optimizers::Objective;
use portfolio_opt::optimizers::RiskParityConfig;
use portfolio_opt::optimizers::SolverSettings;
use portfolio_opt::provider::CsvProvider;
use portfolio_opt::report;
use portfolio_opt::report::PerformanceSummary;
use portfolio_opt::returns::Frequency;
use portfolio_opt::returns::Interval;
use portfolio_opt::returns::ReturnsConfig;
use portfolio_opt::returns::Window;
use portfolio_opt::risk::RiskParams;
use portfolio_opt::AssetUniverse;
use portfolio_opt::MarketDataProvider;
use portfolio_opt::Portfolio;
use portfolio_opt::PortfolioEngine;
use portfolio_opt::RiskMeasure;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portfolio-opt")]
#[command(about = "Construct portfolios from historical closing prices")]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// Comma separated symbols
  #[arg(short, long, value_delimiter = ',', required = true)]
  symbols: Vec<String>,

  /// Directory with one `<SYMBOL>.csv` (date,close) per symbol
  #[arg(long, default_value = "data")]
  data: PathBuf,

  /// Fetch prices from Yahoo Finance instead of CSV files
  #[cfg(feature = "yahoo")]
  #[arg(long)]
  yahoo: bool,

  /// Look-back interval (1mo, 1y, 3y, ytd, max, ...)
  #[arg(long, default_value = "3y")]
  interval: Interval,

  /// Window start; overrides the interval together with `--end`
  #[arg(long, requires = "end")]
  start: Option<NaiveDate>,

  #[arg(long, requires = "start")]
  end: Option<NaiveDate>,

  /// Return frequency (d, w, m)
  #[arg(long, default_value = "d")]
  freq: Frequency,

  #[arg(long)]
  log_returns: bool,

  /// Annual risk free rate
  #[arg(long, default_value_t = 0.0)]
  risk_free: f64,

  /// Risk measure tag (MV, MAD, CVaR, CDaR, ...)
  #[arg(short, long, default_value = "MV")]
  measure: RiskMeasure,

  #[arg(long, default_value_t = 0.05)]
  alpha: f64,

  /// Solver time limit in seconds
  #[arg(long)]
  timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
  /// Equal weights
  Equal {
    #[arg(long, default_value_t = 1.0)]
    value: f64,
  },
  /// Weights proportional to a provider property
  Property {
    property: String,
    #[arg(long, default_value_t = 1.0)]
    value: f64,
  },
  /// Mean-Risk optimisation
  MeanRisk {
    /// MinRisk, Utility, Sharpe or MaxRet
    #[arg(long, default_value = "Sharpe")]
    objective: Objective,
    #[arg(long, default_value_t = 1.0)]
    risk_aversion: f64,
  },
  /// Risk budgeting with equal contributions
  RiskParity,
  /// Hierarchical clustering portfolios
  Hierarchical {
    /// hrp, herc or nco
    #[arg(long, default_value = "hrp")]
    model: HierarchicalModel,
    #[arg(long, default_value = "single")]
    linkage: Linkage,
    /// Number of clusters; chosen by the gap statistic when omitted
    #[arg(long)]
    k: Option<usize>,
  },
}

fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();

  #[cfg(feature = "yahoo")]
  if cli.yahoo {
    let provider = portfolio_opt::provider::YahooProvider::new(Duration::from_secs(30))?;
    return run(provider, &cli);
  }

  let provider = CsvProvider::new(&cli.data);
  run(provider, &cli)
}

fn run<P: MarketDataProvider>(provider: P, cli: &Cli) -> anyhow::Result<()> {
  let engine = PortfolioEngine::new(provider)
    .with_returns_config(ReturnsConfig {
      frequency: cli.freq,
      log_returns: cli.log_returns,
      ..Default::default()
    })
    .with_risk_free(cli.risk_free);
  let universe = AssetUniverse::new(&cli.symbols)?;
  let window = match (cli.start, cli.end) {
    (Some(start), Some(end)) => Window::Range { start, end },
    _ => Window::Interval {
      interval: cli.interval,
      as_of: Local::now().date_naive(),
    },
  };
  let params = RiskParams {
    alpha: cli.alpha,
    ..Default::default()
  };
  let solver = SolverSettings {
    timeout: cli.timeout.map(Duration::from_secs),
    ..Default::default()
  };

  let portfolio = match &cli.command {
    Command::Equal { value } => engine.equal_weight(&universe, &window, *value),
    Command::Property { property, value } => {
      engine.property_weight(&universe, &window, property, *value)
    }
    Command::MeanRisk {
      objective,
      risk_aversion,
    } => engine.mean_risk(
      &universe,
      &window,
      &MeanRiskConfig {
        measure: cli.measure,
        objective: *objective,
        risk_params: params,
        risk_aversion: *risk_aversion,
        solver,
        ..Default::default()
      },
    ),
    Command::RiskParity => engine.risk_parity(
      &universe,
      &window,
      &RiskParityConfig {
        measure: cli.measure,
        risk_params: params,
        solver,
        ..Default::default()
      },
    ),
    Command::Hierarchical { model, linkage, k } => {
      let defaults = HierarchicalConfig::default();
      engine.hierarchical(
        &universe,
        &window,
        &HierarchicalConfig {
          model: *model,
          cluster: ClusterConfig {
            linkage: *linkage,
            k: *k,
            ..defaults.cluster.clone()
          },
          measure: cli.measure,
          risk_params: params,
          solver,
          ..defaults
        },
      )
    }
  }
  .context("portfolio construction failed")?;

  print(&portfolio, cli, &params)
}

fn print(portfolio: &Portfolio, cli: &Cli, params: &RiskParams) -> anyhow::Result<()> {
  let summary = PerformanceSummary::compute(portfolio, cli.measure, params, cli.risk_free)?;
  println!("{summary}");
  let table = report::weights_table(portfolio, cli.measure, params)?;
  println!("{table}");
  Ok(())
}
