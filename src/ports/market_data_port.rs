//! Source of market snapshots.

use async_trait::async_trait;

use crate::domain::error::PolydashError;
use crate::domain::market::Market;

#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Short label used in logs and the status endpoint.
    fn name(&self) -> &str;

    /// Fetches up to `limit` active markets.
    ///
    /// Failures surface as [`PolydashError::UpstreamUnavailable`]; callers
    /// decide whether to fall back to cached data.
    async fn fetch_markets(&self, limit: usize) -> Result<Vec<Market>, PolydashError>;
}
