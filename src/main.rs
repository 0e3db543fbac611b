use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use fx_backtest::config::TradingConfig;
use fx_backtest::data::StooqDataSource;
use fx_backtest::engine::{BacktestEngine, RunController, TradingReport};
use fx_backtest::types::CurrencyPair;
use fx_backtest::TradingError;

#[derive(Parser)]
#[command(name = "fx-backtest")]
#[command(version = "0.1.0")]
#[command(about = "Moving-average crossover backtester for currency pairs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the crossover strategy on daily Stooq data
    Backtest {
        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD or RFC 3339)
        #[arg(short, long)]
        end: Option<String>,
        /// Comma-separated pairs, e.g. EUR/USD,USD/JPY
        #[arg(short, long)]
        pairs: Option<String>,
        /// Initial capital
        #[arg(long)]
        capital: Option<f64>,
        /// Print the report as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = TradingConfig::load(&cli.config)?;

    match cli.command {
        Commands::Backtest { start, end, pairs, capital, json } => {
            if let Some(start) = start {
                config.start = parse_date(&start)?;
            }
            if let Some(end) = end {
                config.end = parse_date(&end)?;
            }
            if let Some(pairs) = pairs {
                config.pairs = parse_pairs(&pairs)?;
            }
            if let Some(capital) = capital {
                config.initial_capital = Decimal::try_from(capital)?;
            }
            run_backtest(config, json).await?;
        }
        Commands::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn run_backtest(config: TradingConfig, json: bool) -> Result<()> {
    info!("FX Backtest v0.1.0");
    info!(
        "Pairs: {}",
        config.pairs.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
    );

    let controller = RunController::new();
    let handle = controller.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            handle.cancel();
        }
    });

    let mut engine = BacktestEngine::new(config, Arc::new(StooqDataSource::new()))?
        .with_controller(controller);

    match engine.run().await {
        Ok(report) => print_report(&report, json),
        Err(TradingError::Cancelled { report }) => {
            warn!("Backtest cancelled; partial report follows and is not final");
            print_report(&report, json)?;
            Err(anyhow!("backtest cancelled"))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &TradingReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        report.print_summary();
    }
    Ok(())
}

fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| anyhow!("Invalid date '{}'. Use YYYY-MM-DD", input))
}

fn parse_pairs(input: &str) -> Result<Vec<CurrencyPair>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<CurrencyPair>().map_err(Into::into))
        .collect()
}
