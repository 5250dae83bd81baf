//! Port traits separating the domain from its adapters.

pub mod config_port;
pub mod estimate_port;
pub mod market_data_port;
pub mod order_port;
pub mod store_port;
