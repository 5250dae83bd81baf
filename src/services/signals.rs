//! Signal generation over the current snapshot.

use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

use super::blocking;
use super::snapshot::SourceStatus;
use crate::domain::error::PolydashError;
use crate::domain::market::Market;
use crate::domain::position::{Position, PositionStatus};
use crate::domain::signal::{
    generate_signal, heuristic_estimate, ProbabilityEstimate, SignalConfig, TradingSignal,
};
use crate::ports::estimate_port::EstimatePort;
use crate::ports::store_port::StorePort;

pub struct SignalService {
    estimator: Arc<dyn EstimatePort>,
    store: Arc<dyn StorePort>,
    config: SignalConfig,
    timeout: Duration,
    status: Mutex<SourceStatus>,
}

impl SignalService {
    pub fn new(
        estimator: Arc<dyn EstimatePort>,
        store: Arc<dyn StorePort>,
        config: SignalConfig,
        timeout: Duration,
    ) -> Self {
        let status = SourceStatus::new(estimator.name());
        Self {
            estimator,
            store,
            config,
            timeout,
            status: Mutex::new(status),
        }
    }

    pub fn status(&self) -> SourceStatus {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// One signal per eligible market, most confident first.
    pub async fn signals(&self, markets: &[Market]) -> Result<Vec<TradingSignal>, PolydashError> {
        let open = self.open_positions().await?;
        let now = Utc::now();

        // After one estimator failure the rest of the batch uses the local
        // model instead of waiting out the timeout again.
        let mut use_remote = true;
        let mut signals = Vec::new();
        for market in markets {
            let estimate = if use_remote {
                match self.remote_estimate(market).await {
                    Ok(estimate) => estimate,
                    Err(_) => {
                        use_remote = false;
                        heuristic_estimate(market, now)
                    }
                }
            } else {
                heuristic_estimate(market, now)
            };
            if let Some(signal) = generate_signal(market, &estimate, &open, &self.config, now) {
                signals.push(signal);
            }
        }

        signals.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(signals)
    }

    pub async fn signal_for(&self, market: &Market) -> Result<Option<TradingSignal>, PolydashError> {
        let open = self.open_positions().await?;
        let estimate = self.estimate(market).await;
        Ok(generate_signal(market, &estimate, &open, &self.config, Utc::now()))
    }

    /// Estimate for `market`, falling back to the local model on any failure.
    pub async fn estimate(&self, market: &Market) -> ProbabilityEstimate {
        match self.remote_estimate(market).await {
            Ok(estimate) => estimate,
            Err(_) => heuristic_estimate(market, Utc::now()),
        }
    }

    async fn remote_estimate(&self, market: &Market) -> Result<ProbabilityEstimate, PolydashError> {
        let result = tokio::time::timeout(self.timeout, self.estimator.estimate(market))
            .await
            .map_err(|_| {
                PolydashError::upstream(
                    self.estimator.name(),
                    format!("no estimate within {:?}", self.timeout),
                )
            })
            .and_then(|inner| inner);

        let mut status = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match &result {
            Ok(_) => status.record_success(),
            Err(e) => {
                warn!(market = %market.id, error = %e, "estimator unavailable, using local model");
                status.record_failure(e);
            }
        }
        result
    }

    async fn open_positions(&self) -> Result<Vec<Position>, PolydashError> {
        let store = Arc::clone(&self.store);
        blocking(move || store.list_positions(Some(PositionStatus::Open))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::heuristic_estimate_adapter::HeuristicEstimateAdapter;
    use crate::adapters::sample_market_adapter::sample_markets;
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::domain::position::Side;
    use crate::services::snapshot::SourceHealth;
    use async_trait::async_trait;

    struct Fixed(f64);

    #[async_trait]
    impl EstimatePort for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn estimate(&self, _market: &Market) -> Result<ProbabilityEstimate, PolydashError> {
            Ok(ProbabilityEstimate {
                fair_value: self.0,
                certainty: 0.9,
                source: "fixed".into(),
            })
        }
    }

    struct Down;

    #[async_trait]
    impl EstimatePort for Down {
        fn name(&self) -> &str {
            "down"
        }

        async fn estimate(&self, _market: &Market) -> Result<ProbabilityEstimate, PolydashError> {
            Err(PolydashError::upstream("down", "503"))
        }
    }

    fn store() -> Arc<dyn StorePort> {
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        Arc::new(store)
    }

    fn service(estimator: Arc<dyn EstimatePort>) -> SignalService {
        SignalService::new(
            estimator,
            store(),
            SignalConfig::default(),
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn high_fair_value_recommends_yes_everywhere_it_has_edge() {
        let markets = sample_markets(Utc::now(), 8);
        let signals = service(Arc::new(Fixed(0.9))).signals(&markets).await.unwrap();

        assert_eq!(signals.len(), 8);
        assert!(signals.iter().all(|s| s.side == Side::Yes));
        assert!(signals.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[tokio::test]
    async fn no_edge_no_signal() {
        let mut market = sample_markets(Utc::now(), 1).remove(0);
        market.yes_price = 0.9;
        let signal = service(Arc::new(Fixed(0.9))).signal_for(&market).await.unwrap();
        assert!(signal.is_none());
    }

    #[tokio::test]
    async fn estimator_failure_degrades_to_local_model() {
        let service = service(Arc::new(Down));
        let markets = sample_markets(Utc::now(), 8);

        let with_fallback = service.signals(&markets).await.unwrap();
        let local = self::service(Arc::new(HeuristicEstimateAdapter))
            .signals(&markets)
            .await
            .unwrap();
        assert_eq!(with_fallback.len(), local.len());
        assert_eq!(service.status().health, SourceHealth::Degraded);
    }

    #[tokio::test]
    async fn estimate_falls_back_per_market() {
        let market = sample_markets(Utc::now(), 1).remove(0);
        let estimate = service(Arc::new(Down)).estimate(&market).await;
        assert_eq!(estimate.source, "local heuristic");
    }
}
