//! Persistence port for markets, positions, and trades.
//!
//! Implementations are synchronous; async callers go through
//! `tokio::task::spawn_blocking`.

use crate::domain::error::PolydashError;
use crate::domain::market::Market;
use crate::domain::position::{Position, PositionStatus};
use crate::domain::trade::{Fill, Trade};

pub trait StorePort: Send + Sync {
    fn initialize_schema(&self) -> Result<(), PolydashError>;

    /// Inserts `market` unless a row with its id exists. Returns whether a row was written.
    fn insert_market_if_absent(&self, market: &Market) -> Result<bool, PolydashError>;

    /// Inserts or refreshes a market, keeping its original `created_at`.
    fn upsert_market(&self, market: &Market) -> Result<(), PolydashError>;

    /// Markets ordered by volume, highest first.
    fn list_markets(&self, limit: usize) -> Result<Vec<Market>, PolydashError>;

    fn get_market(&self, market_id: &str) -> Result<Option<Market>, PolydashError>;

    /// Positions newest first, optionally filtered by status.
    fn list_positions(
        &self,
        status: Option<PositionStatus>,
    ) -> Result<Vec<Position>, PolydashError>;

    fn get_position(&self, id: i64) -> Result<Option<Position>, PolydashError>;

    /// Marks every open position on `market_id` at `yes_price`. Returns the number touched.
    fn reprice_positions(&self, market_id: &str, yes_price: f64) -> Result<usize, PolydashError>;

    /// Closes an open position at `exit_price`, fixing its realized pnl.
    fn close_position(&self, id: i64, exit_price: f64) -> Result<Position, PolydashError>;

    /// Records a fill atomically: the trade row and the matching open
    /// position are written together or not at all.
    fn record_fill(&self, fill: &Fill) -> Result<(Trade, Position), PolydashError>;

    /// Trades newest first.
    fn list_trades(&self, limit: usize) -> Result<Vec<Trade>, PolydashError>;
}
