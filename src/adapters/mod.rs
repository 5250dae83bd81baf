//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
#[cfg(feature = "live")]
pub mod gamma_market_adapter;
pub mod heuristic_estimate_adapter;
#[cfg(feature = "live")]
pub mod http_estimate_adapter;
pub mod paper_order_adapter;
pub mod sample_market_adapter;
pub mod sqlite_adapter;
pub mod web;
