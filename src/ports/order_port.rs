//! Order submission.

use async_trait::async_trait;

use crate::domain::error::PolydashError;
use crate::domain::execution::OrderTicket;
use crate::domain::trade::Fill;

#[async_trait]
pub trait OrderPort: Send + Sync {
    fn name(&self) -> &str;

    /// Submits `ticket` and returns the resulting fill.
    ///
    /// A venue refusal is [`PolydashError::OrderRejected`]; a venue that
    /// cannot be reached is [`PolydashError::UpstreamUnavailable`]. Neither
    /// may leave a partial record behind.
    async fn submit(&self, ticket: &OrderTicket) -> Result<Fill, PolydashError>;
}
