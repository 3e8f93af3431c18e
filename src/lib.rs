//! tmrtrader: trend-pullback trading engine.
//!
//! Hexagonal architecture: screening, risk, position and order logic in
//! [`domain`], port traits in [`ports`], broker/config/status
//! implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
