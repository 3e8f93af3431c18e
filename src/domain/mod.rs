//! Core domain types and logic.

pub mod backoff;
pub mod buy_zone;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod executor;
pub mod indicator;
pub mod market;
pub mod metrics;
pub mod ohlcv;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod position_manager;
pub mod risk;
pub mod screener;
pub mod signal;
pub mod status;
pub mod strategy;
pub mod trading_loop;
pub mod universe;
