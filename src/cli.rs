//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvHistory;
use crate::adapters::env_config_adapter::EnvConfigAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_status_adapter::JsonStatusAdapter;
use crate::adapters::paper_gateway::PaperGateway;
use crate::adapters::system_clock::{ImmediateSleeper, SystemClock, ThreadSleeper};
use crate::domain::config::TradingConfig;
use crate::domain::error::TraderError;
use crate::domain::strategy::build_strategy;
use crate::domain::trading_loop::TradingLoop;
use crate::ports::clock_port::Sleeper;

#[derive(Parser, Debug)]
#[command(name = "tmrtrader", about = "Trend-pullback trading engine")]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the trading loop against the paper broker
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of <TICKER>.csv files; overrides [paper] data_dir
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Stop after this many cycles (default: until the data runs out)
        #[arg(long)]
        max_cycles: Option<u64>,
        /// Wait check_interval_secs between cycles instead of replaying
        /// as fast as possible
        #[arg(long)]
        realtime: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Screen every configured ticker once and print one signal per line
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(&cli.log_level);
    let result = match cli.command {
        Command::Run {
            config,
            data_dir,
            max_cycles,
            realtime,
        } => run_trading(&config, data_dir.as_deref(), max_cycles, realtime),
        Command::Validate { config } => run_validate(&config),
        Command::Screen { config, data_dir } => run_screen(&config, data_dir.as_deref()),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Read the INI file, apply environment overrides, validate.
pub fn load_config(path: &Path) -> Result<TradingConfig, TraderError> {
    let file = FileConfigAdapter::from_file(path)?;
    TradingConfig::from_port(&EnvConfigAdapter::from_env(file))
}

/// Like [`load_config`] with an explicit variable set instead of the
/// process environment.
pub fn load_config_with_vars<I>(path: &Path, vars: I) -> Result<TradingConfig, TraderError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let file = FileConfigAdapter::from_file(path)?;
    TradingConfig::from_port(&EnvConfigAdapter::from_vars(file, vars))
}

fn resolve_data_dir(arg: Option<&Path>, config: &TradingConfig) -> Result<PathBuf, TraderError> {
    arg.map(Path::to_path_buf)
        .or_else(|| config.paper.data_dir.clone())
        .ok_or_else(|| TraderError::ConfigMissing {
            section: "paper".into(),
            key: "data_dir".into(),
        })
}

/// Set `flag` on Ctrl-C. The handler runs on its own thread with a
/// single-threaded runtime.
fn install_ctrl_c(flag: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!(error = %e, "failed to start signal runtime, Ctrl-C disabled");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, finishing current cycle");
                flag.store(true, Ordering::SeqCst);
            }
        });
    });
}

fn run_trading(
    config_path: &Path,
    data_dir: Option<&Path>,
    max_cycles: Option<u64>,
    realtime: bool,
) -> Result<ExitCode, TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let data_dir = resolve_data_dir(data_dir, &config)?;

    let history = CsvHistory::new(&data_dir);
    let gateway = PaperGateway::from_csv(
        &history,
        &config.tickers,
        config.paper.starting_cash,
        config.paper.warmup_bars,
    )?;
    // The first cycle sees the warmup bars; each later cycle reveals one more.
    let max_cycles = max_cycles.unwrap_or(gateway.remaining_bars() as u64 + 1);

    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrl_c(shutdown.clone());
    let sleeper: Box<dyn Sleeper> = if realtime {
        Box::new(ThreadSleeper::new(shutdown.clone()))
    } else {
        Box::new(ImmediateSleeper::new(shutdown.clone()))
    };

    let mut trading_loop = TradingLoop::new(&config);
    if let Some(path) = &config.status.path {
        trading_loop = trading_loop.with_status_port(Box::new(JsonStatusAdapter::new(path)));
    }

    info!(
        account = %config.account_id,
        data_dir = %data_dir.display(),
        max_cycles,
        "starting paper trading"
    );
    let summary = trading_loop.run(
        &gateway,
        &SystemClock,
        sleeper.as_ref(),
        &shutdown,
        Some(max_cycles),
    );

    if let Some(state) = trading_loop.last_state() {
        eprintln!("\nCycles: {} ({} failed)", summary.cycles_attempted, summary.cycles_failed);
        eprintln!("Equity:       {:.2}", state.equity);
        eprintln!("Peak equity:  {:.2}", state.peak_equity);
        eprintln!("Drawdown:     {:.2}%", state.drawdown() * 100.0);
        eprintln!("Realized P&L: {:.2}", state.realized_pnl);
        eprintln!("Open positions: {}", state.positions.len());
    }

    if summary.cycles_attempted > 0 && summary.cycles_failed == summary.cycles_attempted {
        return Ok(ExitCode::from(3));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config_path: &Path) -> Result<ExitCode, TraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;

    eprintln!("Config validated successfully");
    eprintln!("  account:        {}", config.account_id);
    eprintln!("  strategy:       {}", build_strategy(&config).name());
    eprintln!("  tickers:        {}", config.tickers.join(", "));
    eprintln!("  check interval: {}s", config.check_interval.as_secs());
    eprintln!("  max positions:  {}", config.risk.max_positions);
    eprintln!("  allocation:     {:.2}", config.risk.allocation_per_trade);
    eprintln!("  max drawdown:   {:.1}%", config.risk.max_drawdown * 100.0);
    eprintln!("  max size:       {:.1}%", config.risk.max_position_size * 100.0);
    eprintln!("  min price:      {:.2}", config.risk.min_price);
    Ok(ExitCode::SUCCESS)
}

fn run_screen(config_path: &Path, data_dir: Option<&Path>) -> Result<ExitCode, TraderError> {
    let config = load_config(config_path)?;
    let data_dir = resolve_data_dir(data_dir, &config)?;
    let history = CsvHistory::new(&data_dir);
    let strategy = build_strategy(&config);

    let mut found = 0;
    for ticker in &config.tickers {
        let bars = match history.load(ticker) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "skipping ticker");
                continue;
            }
        };
        let start = bars.len().saturating_sub(config.execution.history_lookback);
        let signal = match strategy.generate_signal(ticker, &bars[start..]) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "skipping ticker");
                continue;
            }
        };
        if signal.is_actionable() {
            found += 1;
        }
        let line = serde_json::to_string(&signal).map_err(|e| TraderError::Data {
            reason: format!("failed to serialize signal: {}", e),
        })?;
        println!("{}", line);
    }

    eprintln!(
        "{} signal(s) from {} ticker(s) using {}",
        found,
        config.tickers.len(),
        strategy.name()
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_arguments() {
        let cli = Cli::parse_from([
            "tmrtrader",
            "--log-level",
            "debug",
            "run",
            "-c",
            "trader.ini",
            "--max-cycles",
            "5",
        ]);
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Run {
                config,
                data_dir,
                max_cycles,
                realtime,
            } => {
                assert_eq!(config, PathBuf::from("trader.ini"));
                assert!(data_dir.is_none());
                assert_eq!(max_cycles, Some(5));
                assert!(!realtime);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn missing_data_dir_is_config_error() {
        let port = FileConfigAdapter::from_string("[account]\nid = DU1\n[trading]\ntickers = AAPL\n")
            .unwrap();
        let config = TradingConfig::from_port(&port).unwrap();
        let err = resolve_data_dir(None, &config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { ref section, .. } if section == "paper"));
        let dir = resolve_data_dir(Some(Path::new("/data")), &config).unwrap();
        assert_eq!(dir, PathBuf::from("/data"));
    }
}
