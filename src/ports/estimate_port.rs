//! Fair-probability estimation.

use async_trait::async_trait;

use crate::domain::error::PolydashError;
use crate::domain::market::Market;
use crate::domain::signal::ProbabilityEstimate;

#[async_trait]
pub trait EstimatePort: Send + Sync {
    fn name(&self) -> &str;

    async fn estimate(&self, market: &Market) -> Result<ProbabilityEstimate, PolydashError>;
}
