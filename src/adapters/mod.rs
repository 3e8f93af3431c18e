//! Adapter implementations of the ports.

pub mod csv_adapter;
pub mod env_config_adapter;
pub mod file_config_adapter;
pub mod json_status_adapter;
pub mod paper_gateway;
pub mod system_clock;
