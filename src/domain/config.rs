//! Immutable engine configuration, built once at startup.

use crate::domain::config_validation::validate_trading_config;
use crate::domain::error::TraderError;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    TrendPullback,
    BuyZone,
}

impl StrategyKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trend_pullback" => Some(StrategyKind::TrendPullback),
            "buy_zone" => Some(StrategyKind::BuyZone),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub max_positions: usize,
    pub allocation_per_trade: f64,
    /// Fraction of peak equity, e.g. 0.2.
    pub max_drawdown: f64,
    /// Fraction of equity a single position may occupy.
    pub max_position_size: f64,
    pub min_price: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            max_positions: 10,
            allocation_per_trade: 1000.0,
            max_drawdown: 0.2,
            max_position_size: 0.1,
            min_price: 5.0,
        }
    }
}

/// Trend-pullback screener parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerParams {
    pub ma_period: usize,
    pub channel_period: usize,
    pub channel_rise_lookback: usize,
    pub pullback_window: usize,
    pub min_pullback_pct: f64,
    pub ma_floor_pct: f64,
    pub volume_period: usize,
    pub min_volume_ratio: f64,
    pub max_volume_ratio: f64,
    pub min_avg_volume: f64,
    pub atr_period: usize,
    pub min_atr_pct: f64,
    pub max_atr_pct: f64,
    pub atr_stop_multiple: f64,
}

impl Default for ScreenerParams {
    fn default() -> Self {
        ScreenerParams {
            ma_period: 20,
            channel_period: 10,
            channel_rise_lookback: 5,
            pullback_window: 10,
            min_pullback_pct: 0.03,
            ma_floor_pct: 0.0,
            volume_period: 20,
            min_volume_ratio: 0.5,
            max_volume_ratio: 3.0,
            min_avg_volume: 100_000.0,
            atr_period: 14,
            min_atr_pct: 0.005,
            max_atr_pct: 0.08,
            atr_stop_multiple: 2.0,
        }
    }
}

/// Buy-zone strategy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyZoneParams {
    pub channel_period: usize,
    pub channel_break_window: usize,
    pub atr_period: usize,
    pub atr_multiple: f64,
    pub min_volume: f64,
    pub roc_threshold: f64,
}

impl Default for BuyZoneParams {
    fn default() -> Self {
        BuyZoneParams {
            channel_period: 252,
            channel_break_window: 10,
            atr_period: 5,
            atr_multiple: 1.0,
            min_volume: 100_000.0,
            roc_threshold: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Bars requested per ticker each cycle.
    pub history_lookback: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            max_retries: 3,
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(300),
            history_lookback: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusConfig {
    pub path: Option<PathBuf>,
    pub journal_capacity: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        StatusConfig {
            path: None,
            journal_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperConfig {
    pub data_dir: Option<PathBuf>,
    pub starting_cash: f64,
    /// Bars visible before the first cycle.
    pub warmup_bars: usize,
}

impl Default for PaperConfig {
    fn default() -> Self {
        PaperConfig {
            data_dir: None,
            starting_cash: 100_000.0,
            warmup_bars: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub account_id: String,
    pub check_interval: Duration,
    pub tickers: Vec<String>,
    pub strategy: StrategyKind,
    pub allow_shorting: bool,
    /// Percent above entry (or the buy zone) at which profit is taken.
    pub profit_threshold: f64,
    pub risk: RiskConfig,
    pub screener: ScreenerParams,
    pub buy_zone: BuyZoneParams,
    pub execution: ExecutionConfig,
    pub status: StatusConfig,
    pub paper: PaperConfig,
}

impl TradingConfig {
    /// Validate every section, then build the config.
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        validate_trading_config(config)?;

        let account_id = config.get_non_empty("account", "id").unwrap_or_default();
        let tickers_raw = config.get_string("trading", "tickers").unwrap_or_default();
        let tickers = parse_tickers(&tickers_raw).map_err(|e| TraderError::ConfigInvalid {
            section: "trading".into(),
            key: "tickers".into(),
            reason: e.to_string(),
        })?;
        let strategy = config
            .get_string("trading", "strategy")
            .and_then(|s| StrategyKind::parse(&s))
            .unwrap_or(StrategyKind::TrendPullback);

        let risk_defaults = RiskConfig::default();
        let risk = RiskConfig {
            max_positions: config.get_int(
                "risk",
                "max_positions",
                risk_defaults.max_positions as i64,
            ) as usize,
            allocation_per_trade: config.get_double(
                "risk",
                "allocation_per_trade",
                risk_defaults.allocation_per_trade,
            ),
            max_drawdown: config.get_double("risk", "max_drawdown", risk_defaults.max_drawdown),
            max_position_size: config.get_double(
                "risk",
                "max_position_size",
                risk_defaults.max_position_size,
            ),
            min_price: config.get_double("risk", "min_price", risk_defaults.min_price),
        };

        let s = ScreenerParams::default();
        let screener = ScreenerParams {
            ma_period: get_usize(config, "screener", "ma_period", s.ma_period),
            channel_period: get_usize(config, "screener", "channel_period", s.channel_period),
            channel_rise_lookback: get_usize(
                config,
                "screener",
                "channel_rise_lookback",
                s.channel_rise_lookback,
            ),
            pullback_window: get_usize(config, "screener", "pullback_window", s.pullback_window),
            min_pullback_pct: config.get_double("screener", "min_pullback_pct", s.min_pullback_pct),
            ma_floor_pct: config.get_double("screener", "ma_floor_pct", s.ma_floor_pct),
            volume_period: get_usize(config, "screener", "volume_period", s.volume_period),
            min_volume_ratio: config.get_double("screener", "min_volume_ratio", s.min_volume_ratio),
            max_volume_ratio: config.get_double("screener", "max_volume_ratio", s.max_volume_ratio),
            min_avg_volume: config.get_double("screener", "min_avg_volume", s.min_avg_volume),
            atr_period: get_usize(config, "screener", "atr_period", s.atr_period),
            min_atr_pct: config.get_double("screener", "min_atr_pct", s.min_atr_pct),
            max_atr_pct: config.get_double("screener", "max_atr_pct", s.max_atr_pct),
            atr_stop_multiple: config.get_double(
                "screener",
                "atr_stop_multiple",
                s.atr_stop_multiple,
            ),
        };

        let b = BuyZoneParams::default();
        let buy_zone = BuyZoneParams {
            channel_period: get_usize(config, "buy_zone", "channel_period", b.channel_period),
            channel_break_window: get_usize(
                config,
                "buy_zone",
                "channel_break_window",
                b.channel_break_window,
            ),
            atr_period: get_usize(config, "buy_zone", "atr_period", b.atr_period),
            atr_multiple: config.get_double("buy_zone", "atr_multiple", b.atr_multiple),
            min_volume: config.get_double("buy_zone", "min_volume", b.min_volume),
            roc_threshold: config.get_double("buy_zone", "roc_threshold", b.roc_threshold),
        };

        let e = ExecutionConfig::default();
        let execution = ExecutionConfig {
            max_retries: config.get_int("execution", "max_retries", e.max_retries as i64) as u32,
            backoff_base: Duration::from_secs(config.get_int(
                "execution",
                "backoff_base_secs",
                e.backoff_base.as_secs() as i64,
            ) as u64),
            backoff_cap: Duration::from_secs(config.get_int(
                "execution",
                "backoff_cap_secs",
                e.backoff_cap.as_secs() as i64,
            ) as u64),
            history_lookback: get_usize(
                config,
                "execution",
                "history_lookback",
                e.history_lookback,
            ),
        };

        let st = StatusConfig::default();
        let status = StatusConfig {
            path: config.get_non_empty("status", "path").map(PathBuf::from),
            journal_capacity: get_usize(
                config,
                "status",
                "journal_capacity",
                st.journal_capacity,
            ),
        };

        let p = PaperConfig::default();
        let paper = PaperConfig {
            data_dir: config.get_non_empty("paper", "data_dir").map(PathBuf::from),
            starting_cash: config.get_double("paper", "starting_cash", p.starting_cash),
            warmup_bars: get_usize(config, "paper", "warmup_bars", p.warmup_bars),
        };

        Ok(TradingConfig {
            account_id,
            check_interval: Duration::from_secs(
                config.get_int("trading", "check_interval_secs", 60) as u64,
            ),
            tickers,
            strategy,
            allow_shorting: config.get_bool("trading", "allow_shorting", false),
            profit_threshold: config.get_double("trading", "profit_threshold", 2.0),
            risk,
            screener,
            buy_zone,
            execution,
            status,
            paper,
        })
    }
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    config.get_int(section, key, default as i64).max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const MINIMAL: &str = "[account]\nid = DU123\n[trading]\ntickers = aapl, msft\n";

    #[test]
    fn minimal_config_uses_defaults() {
        let port = FileConfigAdapter::from_string(MINIMAL).unwrap();
        let config = TradingConfig::from_port(&port).unwrap();
        assert_eq!(config.account_id, "DU123");
        assert_eq!(config.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.strategy, StrategyKind::TrendPullback);
        assert!(!config.allow_shorting);
        assert_eq!(config.profit_threshold, 2.0);
        assert_eq!(config.risk, RiskConfig::default());
        assert_eq!(config.screener, ScreenerParams::default());
        assert_eq!(config.execution, ExecutionConfig::default());
        assert!(config.status.path.is_none());
        assert!(config.paper.data_dir.is_none());
    }

    #[test]
    fn overrides_are_read() {
        let content = r#"
[account]
id = DU999

[trading]
tickers = SPY
check_interval_secs = 5
strategy = buy_zone
allow_shorting = true
profit_threshold = 3.5

[risk]
max_positions = 3
allocation_per_trade = 2500
max_drawdown = 0.15
max_position_size = 0.25
min_price = 1.0

[execution]
max_retries = 5
backoff_base_secs = 2
backoff_cap_secs = 60

[status]
path = /tmp/status.json
"#;
        let port = FileConfigAdapter::from_string(content).unwrap();
        let config = TradingConfig::from_port(&port).unwrap();
        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.strategy, StrategyKind::BuyZone);
        assert!(config.allow_shorting);
        assert_eq!(config.profit_threshold, 3.5);
        assert_eq!(config.risk.max_positions, 3);
        assert_eq!(config.risk.allocation_per_trade, 2500.0);
        assert_eq!(config.risk.max_drawdown, 0.15);
        assert_eq!(config.risk.max_position_size, 0.25);
        assert_eq!(config.risk.min_price, 1.0);
        assert_eq!(config.execution.max_retries, 5);
        assert_eq!(config.execution.backoff_base, Duration::from_secs(2));
        assert_eq!(config.execution.backoff_cap, Duration::from_secs(60));
        assert_eq!(config.status.path, Some(PathBuf::from("/tmp/status.json")));
    }

    #[test]
    fn missing_account_fails() {
        let port = FileConfigAdapter::from_string("[trading]\ntickers = AAPL\n").unwrap();
        let err = TradingConfig::from_port(&port).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { key, .. } if key == "id"));
    }

    #[test]
    fn strategy_kind_parse() {
        assert_eq!(StrategyKind::parse("Buy_Zone"), Some(StrategyKind::BuyZone));
        assert_eq!(
            StrategyKind::parse(" trend_pullback "),
            Some(StrategyKind::TrendPullback)
        );
        assert_eq!(StrategyKind::parse("momentum"), None);
    }
}
