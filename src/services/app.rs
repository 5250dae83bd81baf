//! Composition root: builds every component once from resolved settings.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::blocking;
use super::executor::TradeExecutor;
use super::push::SubscriberRegistry;
use super::refresh::RefreshClock;
use super::signals::SignalService;
use super::snapshot::{SnapshotOptions, SnapshotProvider};
use crate::adapters::heuristic_estimate_adapter::HeuristicEstimateAdapter;
use crate::adapters::paper_order_adapter::PaperOrderAdapter;
use crate::adapters::sample_market_adapter::{sample_markets, SampleMarketAdapter};
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::error::PolydashError;
use crate::domain::portfolio::{paper_balance, PortfolioStats};
use crate::domain::settings::{Settings, TradingMode};
use crate::ports::estimate_port::EstimatePort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::order_port::OrderPort;
use crate::ports::store_port::StorePort;

/// Portfolio statistics plus the account view shown on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    #[serde(flatten)]
    pub stats: PortfolioStats,
    pub balance: f64,
    pub mode: TradingMode,
}

pub struct App {
    pub settings: Settings,
    pub store: Arc<dyn StorePort>,
    pub snapshot: Arc<SnapshotProvider>,
    pub signals: Arc<SignalService>,
    pub executor: Arc<TradeExecutor>,
    pub registry: Arc<SubscriberRegistry>,
    pub clock: Arc<RefreshClock>,
}

impl App {
    /// Opens the configured database and wires the default collaborators.
    pub fn build(settings: Settings) -> Result<Self, PolydashError> {
        let store = SqliteAdapter::from_settings(&settings)?;
        Self::with_store(settings, Arc::new(store))
    }

    pub fn with_store(settings: Settings, store: Arc<dyn StorePort>) -> Result<Self, PolydashError> {
        store.initialize_schema()?;
        let market_data = market_source(&settings)?;
        let estimator = estimator(&settings)?;
        let orders: Arc<dyn OrderPort> = Arc::new(PaperOrderAdapter::new(settings.fee_rate));

        info!(
            mode = ?settings.mode,
            market_data = market_data.name(),
            estimator = estimator.name(),
            orders = orders.name(),
            "components resolved"
        );
        Ok(Self::from_parts(settings, store, market_data, estimator, orders))
    }

    pub fn from_parts(
        settings: Settings,
        store: Arc<dyn StorePort>,
        market_data: Arc<dyn MarketDataPort>,
        estimator: Arc<dyn EstimatePort>,
        orders: Arc<dyn OrderPort>,
    ) -> Self {
        let timeout = settings.refresh.upstream_timeout;
        let snapshot = SnapshotProvider::new(
            market_data,
            Arc::clone(&store),
            SnapshotOptions::from(&settings),
        );
        let signals =
            SignalService::new(estimator, Arc::clone(&store), settings.signal.clone(), timeout);
        let executor = TradeExecutor::new(
            Arc::clone(&store),
            orders,
            settings.max_position_size(),
            timeout,
        );
        let registry = SubscriberRegistry::new(settings.push_queue_capacity);

        Self {
            settings,
            store,
            snapshot: Arc::new(snapshot),
            signals: Arc::new(signals),
            executor: Arc::new(executor),
            registry: Arc::new(registry),
            clock: Arc::new(RefreshClock::default()),
        }
    }

    /// Inserts the sample catalogue, leaving existing markets untouched.
    ///
    /// Only paper mode is seeded; live mode trades real markets exclusively.
    pub async fn seed_sample_markets(&self) -> Result<usize, PolydashError> {
        if self.settings.mode != TradingMode::Paper {
            return Ok(0);
        }
        let store = Arc::clone(&self.store);
        let markets = sample_markets(chrono::Utc::now(), self.settings.refresh.market_limit);
        blocking(move || {
            let mut inserted = 0;
            for market in &markets {
                if store.insert_market_if_absent(market)? {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
        .await
    }

    pub async fn portfolio(&self) -> Result<PortfolioSummary, PolydashError> {
        let store = Arc::clone(&self.store);
        let (positions, trades) = blocking(move || {
            Ok((store.list_positions(None)?, store.list_trades(usize::MAX)?))
        })
        .await?;

        let bankroll = self.settings.signal.bankroll;
        Ok(PortfolioSummary {
            stats: PortfolioStats::compute(&positions, &trades, bankroll),
            balance: paper_balance(bankroll, &positions),
            mode: self.settings.mode,
        })
    }
}

fn market_source(settings: &Settings) -> Result<Arc<dyn MarketDataPort>, PolydashError> {
    #[cfg(feature = "live")]
    if settings.mode == TradingMode::Live {
        if let Some(credentials) = &settings.polymarket {
            let adapter = crate::adapters::gamma_market_adapter::GammaMarketAdapter::new(
                &credentials.api_url,
                settings.refresh.upstream_timeout,
            )?;
            return Ok(Arc::new(adapter));
        }
    }
    Ok(Arc::new(SampleMarketAdapter::new(settings.refresh.demo_drift)))
}

fn estimator(settings: &Settings) -> Result<Arc<dyn EstimatePort>, PolydashError> {
    #[cfg(feature = "live")]
    if let Some(url) = &settings.estimator_url {
        let adapter = crate::adapters::http_estimate_adapter::HttpEstimateAdapter::new(
            url,
            settings.refresh.upstream_timeout,
        )?;
        return Ok(Arc::new(adapter));
    }
    #[cfg(not(feature = "live"))]
    if settings.estimator_url.is_some() {
        tracing::warn!("[estimator] url is ignored without the `live` feature");
    }
    Ok(Arc::new(HeuristicEstimateAdapter))
}
