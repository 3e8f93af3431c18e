//! Environment-variable overlay on top of another config source.
//!
//! Recognised variables replace the matching INI key. The process
//! environment is read once, when the overlay is built.

use crate::ports::config_port::ConfigPort;
use std::collections::HashMap;

/// Variable name, section, key.
pub const ENV_KEYS: &[(&str, &str, &str)] = &[
    ("IBKR_ACCOUNT_ID", "account", "id"),
    ("TRADING_CHECK_INTERVAL", "trading", "check_interval_secs"),
    ("TICKERS", "trading", "tickers"),
    ("PROFIT_THRESHOLD", "trading", "profit_threshold"),
    ("MAX_POSITIONS", "risk", "max_positions"),
    ("ALLOCATION_PER_TRADE", "risk", "allocation_per_trade"),
    ("MAX_DRAWDOWN", "risk", "max_drawdown"),
    ("MAX_POSITION_SIZE", "risk", "max_position_size"),
    ("MIN_PRICE", "risk", "min_price"),
];

pub struct EnvConfigAdapter<C: ConfigPort> {
    base: C,
    overrides: HashMap<(String, String), String>,
}

impl<C: ConfigPort> EnvConfigAdapter<C> {
    pub fn from_env(base: C) -> Self {
        Self::from_vars(base, std::env::vars())
    }

    pub fn from_vars<I>(base: C, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let overrides = ENV_KEYS
            .iter()
            .filter_map(|(name, section, key)| {
                let value = vars.get(*name)?.trim();
                if value.is_empty() {
                    return None;
                }
                Some(((section.to_string(), key.to_string()), value.to_string()))
            })
            .collect();
        Self { base, overrides }
    }

    fn overridden(&self, section: &str, key: &str) -> Option<&String> {
        self.overrides.get(&(section.to_string(), key.to_string()))
    }
}

impl<C: ConfigPort> ConfigPort for EnvConfigAdapter<C> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.overridden(section, key)
            .cloned()
            .or_else(|| self.base.get_string(section, key))
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        match self.overridden(section, key) {
            Some(v) => v.parse().unwrap_or(default),
            None => self.base.get_int(section, key, default),
        }
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        match self.overridden(section, key) {
            Some(v) => v.parse().unwrap_or(default),
            None => self.base.get_double(section, key, default),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        match self.overridden(section, key).map(|v| v.to_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "yes" | "on" | "1") => true,
            Some(v) if matches!(v.as_str(), "false" | "no" | "off" | "0") => false,
            Some(_) => default,
            None => self.base.get_bool(section, key, default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::config::TradingConfig;
    use crate::domain::error::TraderError;

    fn base() -> FileConfigAdapter {
        FileConfigAdapter::from_string(
            "[account]\nid = FROM_FILE\n[trading]\ntickers = AAPL\n[risk]\nmax_positions = 4\n",
        )
        .unwrap()
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_overrides_file() {
        let adapter = EnvConfigAdapter::from_vars(
            base(),
            vars(&[
                ("IBKR_ACCOUNT_ID", "DU999"),
                ("TICKERS", "SPY,QQQ"),
                ("MAX_POSITIONS", "12"),
                ("MAX_DRAWDOWN", "0.15"),
            ]),
        );
        assert_eq!(adapter.get_string("account", "id"), Some("DU999".into()));
        assert_eq!(adapter.get_string("trading", "tickers"), Some("SPY,QQQ".into()));
        assert_eq!(adapter.get_int("risk", "max_positions", 0), 12);
        assert_eq!(adapter.get_double("risk", "max_drawdown", 0.0), 0.15);
    }

    #[test]
    fn file_values_used_without_env() {
        let adapter = EnvConfigAdapter::from_vars(base(), vars(&[("UNRELATED", "x")]));
        assert_eq!(adapter.get_string("account", "id"), Some("FROM_FILE".into()));
        assert_eq!(adapter.get_int("risk", "max_positions", 0), 4);
        assert_eq!(adapter.get_double("risk", "min_price", 5.0), 5.0);
    }

    #[test]
    fn blank_env_value_ignored() {
        let adapter = EnvConfigAdapter::from_vars(base(), vars(&[("IBKR_ACCOUNT_ID", "  ")]));
        assert_eq!(adapter.get_string("account", "id"), Some("FROM_FILE".into()));
    }

    #[test]
    fn unparsable_env_numbers_fail_config_load() {
        for (name, value, key) in [
            ("MAX_POSITIONS", "ten", "max_positions"),
            ("MAX_DRAWDOWN", "twenty", "max_drawdown"),
            ("TRADING_CHECK_INTERVAL", "1m", "check_interval_secs"),
            ("PROFIT_THRESHOLD", "NaN", "profit_threshold"),
        ] {
            let adapter = EnvConfigAdapter::from_vars(base(), vars(&[(name, value)]));
            match TradingConfig::from_port(&adapter) {
                Err(TraderError::ConfigInvalid { key: k, .. }) => assert_eq!(k, key),
                other => panic!("{name}={value}: expected ConfigInvalid, got {other:?}"),
            }
        }
    }
}
