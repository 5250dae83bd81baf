//! Remote probability estimation service.
//!
//! POSTs the market as JSON and expects a `ProbabilityEstimate` back.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::domain::error::PolydashError;
use crate::domain::market::{check_probability, Market};
use crate::domain::signal::ProbabilityEstimate;
use crate::ports::estimate_port::EstimatePort;

const SOURCE: &str = "estimator";

pub struct HttpEstimateAdapter {
    http: Client,
    url: String,
}

impl HttpEstimateAdapter {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PolydashError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PolydashError::upstream(SOURCE, e))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl EstimatePort for HttpEstimateAdapter {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn estimate(&self, market: &Market) -> Result<ProbabilityEstimate, PolydashError> {
        let response = self
            .http
            .post(&self.url)
            .json(market)
            .send()
            .await
            .map_err(|e| PolydashError::upstream(SOURCE, e))?;
        if !response.status().is_success() {
            return Err(PolydashError::upstream(
                SOURCE,
                format!("HTTP {}", response.status()),
            ));
        }
        let estimate: ProbabilityEstimate = response
            .json()
            .await
            .map_err(|e| PolydashError::upstream(SOURCE, e))?;

        check_probability("fair_value", estimate.fair_value)
            .and_then(|_| check_probability("certainty", estimate.certainty))
            .map_err(|e| PolydashError::upstream(SOURCE, e))?;
        Ok(estimate)
    }
}
