//! Configuration validation.
//!
//! Validates every section before the engine starts. Each check names the
//! section and key it rejects.

use crate::domain::config::StrategyKind;
use crate::domain::error::TraderError;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_account(config)?;
    validate_trading(config)?;
    validate_risk(config)?;
    validate_screener(config)?;
    validate_buy_zone(config)?;
    validate_execution(config)?;
    validate_status(config)?;
    validate_paper(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> TraderError {
    TraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, key: &str) -> TraderError {
    TraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Integer value of `key`, or `default` when absent. A value that does not
/// parse is an error, never the default.
fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, TraderError> {
    match config.get_non_empty(section, key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid(section, key, &format!("{key} must be an integer, got '{raw}'"))),
        None => Ok(default),
    }
}

fn double_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    match config.get_non_empty(section, key) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(invalid(section, key, &format!("{key} must be a number, got '{raw}'"))),
        },
        None => Ok(default),
    }
}

fn bool_value(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TraderError> {
    match config.get_non_empty(section, key) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" | "false" | "no" | "off" | "0" => Ok(()),
            _ => Err(invalid(section, key, &format!("{key} must be true or false, got '{raw}'"))),
        },
        None => Ok(()),
    }
}

fn require_positive_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), TraderError> {
    if int_value(config, section, key, default)? < 1 {
        return Err(invalid(section, key, &format!("{key} must be at least 1")));
    }
    Ok(())
}

fn validate_account(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_non_empty("account", "id") {
        Some(_) => Ok(()),
        None => Err(missing("account", "id")),
    }
}

fn validate_trading(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_non_empty("trading", "tickers") {
        Some(s) => {
            parse_tickers(&s).map_err(|e| invalid("trading", "tickers", &e.to_string()))?;
        }
        None => return Err(missing("trading", "tickers")),
    }

    require_positive_int(config, "trading", "check_interval_secs", 60)?;
    bool_value(config, "trading", "allow_shorting")?;

    if let Some(s) = config.get_string("trading", "strategy") {
        if StrategyKind::parse(&s).is_none() {
            return Err(invalid(
                "trading",
                "strategy",
                "strategy must be trend_pullback or buy_zone",
            ));
        }
    }

    let profit_threshold = double_value(config, "trading", "profit_threshold", 2.0)?;
    if profit_threshold <= 0.0 {
        return Err(invalid(
            "trading",
            "profit_threshold",
            "profit_threshold must be positive",
        ));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), TraderError> {
    require_positive_int(config, "risk", "max_positions", 10)?;

    let allocation = double_value(config, "risk", "allocation_per_trade", 1000.0)?;
    if allocation <= 0.0 {
        return Err(invalid(
            "risk",
            "allocation_per_trade",
            "allocation_per_trade must be positive",
        ));
    }

    let drawdown = double_value(config, "risk", "max_drawdown", 0.2)?;
    if drawdown <= 0.0 || drawdown >= 1.0 {
        return Err(invalid(
            "risk",
            "max_drawdown",
            "max_drawdown must be between 0 and 1 (exclusive)",
        ));
    }

    let position_size = double_value(config, "risk", "max_position_size", 0.1)?;
    if position_size <= 0.0 || position_size > 1.0 {
        return Err(invalid(
            "risk",
            "max_position_size",
            "max_position_size must be in (0, 1]",
        ));
    }

    let min_price = double_value(config, "risk", "min_price", 5.0)?;
    if min_price < 0.0 {
        return Err(invalid("risk", "min_price", "min_price must be non-negative"));
    }
    Ok(())
}

fn validate_screener(config: &dyn ConfigPort) -> Result<(), TraderError> {
    for (key, default) in [
        ("ma_period", 20),
        ("channel_period", 10),
        ("channel_rise_lookback", 5),
        ("pullback_window", 10),
        ("volume_period", 20),
        ("atr_period", 14),
    ] {
        require_positive_int(config, "screener", key, default)?;
    }

    let pullback = double_value(config, "screener", "min_pullback_pct", 0.03)?;
    if !(0.0..1.0).contains(&pullback) {
        return Err(invalid(
            "screener",
            "min_pullback_pct",
            "min_pullback_pct must be in [0, 1)",
        ));
    }

    let floor = double_value(config, "screener", "ma_floor_pct", 0.0)?;
    if floor <= -1.0 {
        return Err(invalid(
            "screener",
            "ma_floor_pct",
            "ma_floor_pct must be greater than -1",
        ));
    }

    let min_ratio = double_value(config, "screener", "min_volume_ratio", 0.5)?;
    let max_ratio = double_value(config, "screener", "max_volume_ratio", 3.0)?;
    if min_ratio < 0.0 || min_ratio >= max_ratio {
        return Err(invalid(
            "screener",
            "min_volume_ratio",
            "min_volume_ratio must be non-negative and below max_volume_ratio",
        ));
    }

    if double_value(config, "screener", "min_avg_volume", 100_000.0)? < 0.0 {
        return Err(invalid(
            "screener",
            "min_avg_volume",
            "min_avg_volume must be non-negative",
        ));
    }

    let min_atr = double_value(config, "screener", "min_atr_pct", 0.005)?;
    let max_atr = double_value(config, "screener", "max_atr_pct", 0.08)?;
    if min_atr < 0.0 || min_atr >= max_atr {
        return Err(invalid(
            "screener",
            "min_atr_pct",
            "min_atr_pct must be non-negative and below max_atr_pct",
        ));
    }

    if double_value(config, "screener", "atr_stop_multiple", 2.0)? <= 0.0 {
        return Err(invalid(
            "screener",
            "atr_stop_multiple",
            "atr_stop_multiple must be positive",
        ));
    }
    Ok(())
}

fn validate_buy_zone(config: &dyn ConfigPort) -> Result<(), TraderError> {
    require_positive_int(config, "buy_zone", "channel_period", 252)?;
    require_positive_int(config, "buy_zone", "channel_break_window", 10)?;
    require_positive_int(config, "buy_zone", "atr_period", 5)?;

    if double_value(config, "buy_zone", "atr_multiple", 1.0)? < 0.0 {
        return Err(invalid(
            "buy_zone",
            "atr_multiple",
            "atr_multiple must be non-negative",
        ));
    }
    if double_value(config, "buy_zone", "min_volume", 100_000.0)? < 0.0 {
        return Err(invalid(
            "buy_zone",
            "min_volume",
            "min_volume must be non-negative",
        ));
    }
    if double_value(config, "buy_zone", "roc_threshold", 2.0)? < 0.0 {
        return Err(invalid(
            "buy_zone",
            "roc_threshold",
            "roc_threshold must be non-negative",
        ));
    }
    Ok(())
}

fn validate_execution(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if int_value(config, "execution", "max_retries", 3)? < 0 {
        return Err(invalid(
            "execution",
            "max_retries",
            "max_retries must be non-negative",
        ));
    }

    require_positive_int(config, "execution", "backoff_base_secs", 30)?;
    let base = int_value(config, "execution", "backoff_base_secs", 30)?;
    let cap = int_value(config, "execution", "backoff_cap_secs", 300)?;
    if cap < base {
        return Err(invalid(
            "execution",
            "backoff_cap_secs",
            "backoff_cap_secs must be at least backoff_base_secs",
        ));
    }

    require_positive_int(config, "execution", "history_lookback", 300)?;
    Ok(())
}

fn validate_status(config: &dyn ConfigPort) -> Result<(), TraderError> {
    require_positive_int(config, "status", "journal_capacity", 100)
}

fn validate_paper(config: &dyn ConfigPort) -> Result<(), TraderError> {
    if double_value(config, "paper", "starting_cash", 100_000.0)? <= 0.0 {
        return Err(invalid(
            "paper",
            "starting_cash",
            "starting_cash must be positive",
        ));
    }
    if int_value(config, "paper", "warmup_bars", 30)? < 0 {
        return Err(invalid(
            "paper",
            "warmup_bars",
            "warmup_bars must be non-negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with_base(extra: &str) -> FileConfigAdapter {
        make_config(&format!(
            "[account]\nid = DU123\n[trading]\ntickers = AAPL,MSFT\n{extra}"
        ))
    }

    fn invalid_key(err: TraderError) -> String {
        match err {
            TraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = make_config(
            r#"
[account]
id = DU123

[trading]
tickers = AAPL,MSFT
check_interval_secs = 60
strategy = trend_pullback
profit_threshold = 2.0

[risk]
max_positions = 10
allocation_per_trade = 1000
max_drawdown = 0.2
max_position_size = 0.1
min_price = 5.0

[execution]
max_retries = 3
backoff_base_secs = 30
backoff_cap_secs = 300
"#,
        );
        assert!(validate_trading_config(&config).is_ok());
    }

    #[test]
    fn missing_account_id_fails() {
        let config = make_config("[account]\n[trading]\ntickers = AAPL\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert!(
            matches!(err, TraderError::ConfigMissing { section, key } if section == "account" && key == "id")
        );
    }

    #[test]
    fn missing_tickers_fails() {
        let config = make_config("[account]\nid = DU1\n");
        let err = validate_trading_config(&config).unwrap_err();
        assert!(matches!(err, TraderError::ConfigMissing { key, .. } if key == "tickers"));
    }

    #[test]
    fn duplicate_ticker_fails() {
        let config = make_config("[account]\nid = DU1\n[trading]\ntickers = AAPL,aapl\n");
        assert_eq!(invalid_key(validate_trading_config(&config).unwrap_err()), "tickers");
    }

    #[test]
    fn unknown_strategy_fails() {
        let config = with_base("strategy = martingale\n");
        assert_eq!(invalid_key(validate_trading_config(&config).unwrap_err()), "strategy");
    }

    #[test]
    fn zero_check_interval_fails() {
        let config = with_base("check_interval_secs = 0\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "check_interval_secs"
        );
    }

    #[test]
    fn max_positions_zero_fails() {
        let config = with_base("[risk]\nmax_positions = 0\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "max_positions"
        );
    }

    #[test]
    fn allocation_must_be_positive() {
        let config = with_base("[risk]\nallocation_per_trade = -5\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "allocation_per_trade"
        );
    }

    #[test]
    fn drawdown_out_of_range_fails() {
        for value in ["0", "1", "1.5", "-0.1"] {
            let config = with_base(&format!("[risk]\nmax_drawdown = {value}\n"));
            assert_eq!(
                invalid_key(validate_trading_config(&config).unwrap_err()),
                "max_drawdown"
            );
        }
    }

    #[test]
    fn position_size_above_one_fails() {
        let config = with_base("[risk]\nmax_position_size = 1.5\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "max_position_size"
        );
    }

    #[test]
    fn position_size_of_one_passes() {
        let config = with_base("[risk]\nmax_position_size = 1.0\n");
        assert!(validate_trading_config(&config).is_ok());
    }

    #[test]
    fn negative_min_price_fails() {
        let config = with_base("[risk]\nmin_price = -1\n");
        assert_eq!(invalid_key(validate_trading_config(&config).unwrap_err()), "min_price");
    }

    #[test]
    fn inverted_volume_band_fails() {
        let config = with_base("[screener]\nmin_volume_ratio = 2.0\nmax_volume_ratio = 1.0\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "min_volume_ratio"
        );
    }

    #[test]
    fn inverted_atr_band_fails() {
        let config = with_base("[screener]\nmin_atr_pct = 0.1\nmax_atr_pct = 0.05\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "min_atr_pct"
        );
    }

    #[test]
    fn zero_ma_period_fails() {
        let config = with_base("[screener]\nma_period = 0\n");
        assert_eq!(invalid_key(validate_trading_config(&config).unwrap_err()), "ma_period");
    }

    #[test]
    fn backoff_cap_below_base_fails() {
        let config = with_base("[execution]\nbackoff_base_secs = 60\nbackoff_cap_secs = 30\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "backoff_cap_secs"
        );
    }

    #[test]
    fn negative_max_retries_fails() {
        let config = with_base("[execution]\nmax_retries = -1\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "max_retries"
        );
    }

    #[test]
    fn zero_max_retries_passes() {
        let config = with_base("[execution]\nmax_retries = 0\n");
        assert!(validate_trading_config(&config).is_ok());
    }

    #[test]
    fn paper_cash_must_be_positive() {
        let config = with_base("[paper]\nstarting_cash = 0\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "starting_cash"
        );
    }

    #[test]
    fn unparsable_numbers_fail_instead_of_defaulting() {
        for (extra, key) in [
            ("[risk]\nmax_drawdown = twenty\n", "max_drawdown"),
            ("[risk]\nmax_positions = 10.5\n", "max_positions"),
            ("[risk]\nallocation_per_trade = $1000\n", "allocation_per_trade"),
            ("check_interval_secs = soon\n", "check_interval_secs"),
            ("[screener]\nma_period = twenty\n", "ma_period"),
            ("[buy_zone]\natr_multiple = inf\n", "atr_multiple"),
            ("[execution]\nmax_retries = three\n", "max_retries"),
            ("[paper]\nwarmup_bars = x\n", "warmup_bars"),
        ] {
            let config = with_base(extra);
            assert_eq!(invalid_key(validate_trading_config(&config).unwrap_err()), key);
        }
    }

    #[test]
    fn unparsable_bool_fails() {
        let config = with_base("allow_shorting = maybe\n");
        assert_eq!(
            invalid_key(validate_trading_config(&config).unwrap_err()),
            "allow_shorting"
        );
    }

    #[test]
    fn blank_numeric_value_uses_default() {
        let config = with_base("[risk]\nmax_drawdown =\n");
        assert!(validate_trading_config(&config).is_ok());
    }
}
