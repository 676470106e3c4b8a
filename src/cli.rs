//! CLI definition and dispatch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::adapters::csv_market_data::CsvMarketData;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::file_journal::FileJournalStore;
use crate::adapters::http_broker::HttpBroker;
use crate::adapters::log_status::LogStatusSink;
use crate::domain::backtest::BacktestEngine;
use crate::domain::candle::Candle;
use crate::domain::config::TradingConfig;
use crate::domain::error::HelmtraderError;
use crate::engine::executor::OrderExecutor;
use crate::engine::orchestrator::Orchestrator;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "helmtrader", about = "Automated trading control loop")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the live control loop
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of CSV candle files used as the market data source
        #[arg(short, long, default_value = "data")]
        data: PathBuf,
        /// Force dry-run execution regardless of configuration
        #[arg(long)]
        dry_run: bool,
    },
    /// Replay historical candles and report performance
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of CSV candle files
        #[arg(short, long)]
        data: PathBuf,
        /// Write the full result as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            data,
            dry_run,
        } => run_live(&config, &data, dry_run).await,
        Command::Backtest {
            config,
            data,
            output,
        } => run_backtest(&config, &data, output.as_ref()).await,
        Command::Validate { config } => run_validate(&config),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = HelmtraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn build_trading_config(adapter: &FileConfigAdapter) -> Result<TradingConfig, ExitCode> {
    TradingConfig::from_port(adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

async fn run_live(config_path: &PathBuf, data_dir: &PathBuf, dry_run: bool) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let mut config = match build_trading_config(&adapter) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if dry_run {
        config.exec.dry_run = true;
    }

    let broker = if config.exec.dry_run {
        // Never called in dry-run; any endpoint satisfies the executor.
        HttpBroker::new("http://localhost", "", config.exec.order_timeout_ms)
    } else {
        let base_url = match adapter.get_string("broker", "base_url") {
            Some(url) => url,
            None => {
                let err = HelmtraderError::ConfigMissing {
                    section: "broker".to_string(),
                    key: "base_url".to_string(),
                };
                eprintln!("error: {err}");
                return ExitCode::from(&err);
            }
        };
        let api_key = adapter.get_string("broker", "api_key").unwrap_or_default();
        HttpBroker::new(&base_url, &api_key, config.exec.order_timeout_ms)
    };
    let broker = match broker {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(4);
        }
    };

    let journal = match FileJournalStore::new(
        PathBuf::from(&config.journal.data_dir),
        config.journal.snapshot_retention_days,
        config.backtest.initial_capital,
    ) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let market = Arc::new(CsvMarketData::new(
        data_dir.clone(),
        &config.analysis.signal_interval,
    ));
    let executor = OrderExecutor::new(Arc::new(broker), config.exec.clone());
    let config = Arc::new(config);

    let mut orchestrator = match Orchestrator::new(
        market,
        executor,
        Box::new(journal),
        Box::new(LogStatusSink),
        config,
    ) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    match orchestrator.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

async fn load_backtest_data(
    market: &CsvMarketData,
    config: &TradingConfig,
) -> Result<std::collections::BTreeMap<String, Vec<Candle>>, HelmtraderError> {
    let mut data = std::collections::BTreeMap::new();
    for asset in &config.watchlist {
        let candles = market
            .get_candles(&asset.id, &config.analysis.signal_interval, usize::MAX)
            .await?;
        data.insert(asset.id.clone(), candles);
    }
    Ok(data)
}

async fn run_backtest(
    config_path: &PathBuf,
    data_dir: &PathBuf,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_trading_config(&adapter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    eprintln!(
        "Backtesting {} assets from {}",
        config.watchlist.len(),
        data_dir.display()
    );
    let market = CsvMarketData::new(data_dir.clone(), &config.analysis.signal_interval);
    let data = match load_backtest_data(&market, &config).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    let result = BacktestEngine::new(&config).run(&data);

    println!("Trades:            {}", result.trades.len());
    println!("Final equity:      {:.2}", result.final_equity);
    println!(
        "Total return:      {:.2}%",
        result.metrics.total_return_pct
    );
    println!(
        "Annualized return: {:.2}%",
        result.metrics.annualized_return_pct
    );
    println!("Max drawdown:      {:.2}%", result.metrics.max_drawdown_pct);
    println!("Sharpe ratio:      {:.2}", result.metrics.sharpe_ratio);
    println!("Sortino ratio:     {:.2}", result.metrics.sortino_ratio);
    println!("Win rate:          {:.2}%", result.metrics.win_rate_pct);

    if let Some(path) = output_path {
        let json = match serde_json::to_string_pretty(&result) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("error: failed to serialize result: {e}");
                return ExitCode::from(1);
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("error: failed to write {}: {e}", path.display());
            return ExitCode::from(1);
        }
        eprintln!("Result written to {}", path.display());
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match build_trading_config(&adapter) {
        Ok(config) => {
            println!(
                "Configuration OK: {} assets, max {} positions, {} mode",
                config.watchlist.len(),
                config.risk.max_positions,
                if config.exec.dry_run { "dry-run" } else { "live" }
            );
            ExitCode::SUCCESS
        }
        Err(code) => code,
    }
}
