//! Local probability model; needs no network.

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::error::PolydashError;
use crate::domain::market::Market;
use crate::domain::signal::{heuristic_estimate, ProbabilityEstimate};
use crate::ports::estimate_port::EstimatePort;

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicEstimateAdapter;

#[async_trait]
impl EstimatePort for HeuristicEstimateAdapter {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn estimate(&self, market: &Market) -> Result<ProbabilityEstimate, PolydashError> {
        Ok(heuristic_estimate(market, Utc::now()))
    }
}
