//! Market snapshot provider.
//!
//! Fetches from the configured market-data source under a timeout. On any
//! upstream failure the last good snapshot is served, then whatever the
//! store holds, then the built-in sample catalogue.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::blocking;
use crate::adapters::sample_market_adapter::sample_markets;
use crate::domain::error::PolydashError;
use crate::domain::market::{Market, PricePolicy};
use crate::domain::settings::Settings;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::store_port::StorePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceHealth {
    Healthy,
    Degraded,
}

/// Health of one external collaborator, as shown on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub source: String,
    pub health: SourceHealth,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SourceStatus {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            health: SourceHealth::Healthy,
            last_success: None,
            last_error: None,
        }
    }

    pub fn record_success(&mut self) {
        self.health = SourceHealth::Healthy;
        self.last_success = Some(Utc::now());
        self.last_error = None;
    }

    pub fn record_failure(&mut self, err: &PolydashError) {
        self.health = SourceHealth::Degraded;
        self.last_error = Some(err.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOptions {
    pub timeout: Duration,
    pub limit: usize,
    pub policy: PricePolicy,
}

impl From<&Settings> for SnapshotOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            timeout: settings.refresh.upstream_timeout,
            limit: settings.refresh.market_limit,
            policy: settings.price_policy,
        }
    }
}

pub struct SnapshotProvider {
    source: Arc<dyn MarketDataPort>,
    store: Arc<dyn StorePort>,
    options: SnapshotOptions,
    cache: RwLock<Vec<Market>>,
    status: Mutex<SourceStatus>,
}

impl SnapshotProvider {
    pub fn new(
        source: Arc<dyn MarketDataPort>,
        store: Arc<dyn StorePort>,
        options: SnapshotOptions,
    ) -> Self {
        let status = SourceStatus::new(source.name());
        Self {
            source,
            store,
            options,
            cache: RwLock::new(Vec::new()),
            status: Mutex::new(status),
        }
    }

    /// Current markets, fetching once if nothing is cached yet.
    pub async fn markets(&self) -> Vec<Market> {
        let cached = self.cached();
        if cached.is_empty() {
            self.refresh().await
        } else {
            cached
        }
    }

    pub fn cached(&self) -> Vec<Market> {
        self.cache
            .read()
            .map(|markets| markets.clone())
            .unwrap_or_default()
    }

    pub fn status(&self) -> SourceStatus {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Pulls a fresh snapshot, persists it, and reprices open positions.
    ///
    /// Never fails: upstream errors degrade to the fallback chain.
    pub async fn refresh(&self) -> Vec<Market> {
        match self.fetch().await {
            Ok(markets) => {
                self.persist(&markets).await;
                self.set_cache(&markets);
                self.update_status(|s| s.record_success());
                debug!(source = self.source.name(), count = markets.len(), "snapshot refreshed");
                markets
            }
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "market data unavailable, using fallback");
                self.update_status(|s| s.record_failure(&e));
                self.fallback().await
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<Market>, PolydashError> {
        let fetched = tokio::time::timeout(
            self.options.timeout,
            self.source.fetch_markets(self.options.limit),
        )
        .await
        .map_err(|_| {
            PolydashError::upstream(
                self.source.name(),
                format!("no response within {:?}", self.options.timeout),
            )
        })??;

        let mut markets: Vec<Market> = fetched
            .into_iter()
            .filter(|market| match market.validate(self.options.policy) {
                Ok(()) => true,
                Err(e) => {
                    warn!(market = %market.id, error = %e, "dropping invalid market");
                    false
                }
            })
            .collect();
        markets.truncate(self.options.limit);
        Ok(markets)
    }

    async fn persist(&self, markets: &[Market]) {
        let store = Arc::clone(&self.store);
        let batch = markets.to_vec();
        let result = blocking(move || {
            let mut repriced = 0;
            for market in &batch {
                store.upsert_market(market)?;
                repriced += store.reprice_positions(&market.id, market.yes_price)?;
            }
            Ok(repriced)
        })
        .await;

        match result {
            Ok(0) => {}
            Ok(repriced) => info!(positions = repriced, "repriced open positions"),
            Err(e) => warn!(error = %e, "failed to persist market snapshot"),
        }
    }

    async fn fallback(&self) -> Vec<Market> {
        let cached = self.cached();
        if !cached.is_empty() {
            return cached;
        }

        let store = Arc::clone(&self.store);
        let limit = self.options.limit;
        match blocking(move || store.list_markets(limit)).await {
            Ok(stored) if !stored.is_empty() => {
                self.set_cache(&stored);
                return stored;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "store unavailable for snapshot fallback"),
        }

        sample_markets(Utc::now(), limit)
    }

    fn set_cache(&self, markets: &[Market]) {
        if let Ok(mut cache) = self.cache.write() {
            *cache = markets.to_vec();
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut SourceStatus)) {
        let mut status = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *status);
    }
}
