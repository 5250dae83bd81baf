#![allow(dead_code)]

use async_trait::async_trait;
use polydash::adapters::file_config_adapter::FileConfigAdapter;
use polydash::adapters::heuristic_estimate_adapter::HeuristicEstimateAdapter;
use polydash::adapters::paper_order_adapter::PaperOrderAdapter;
use polydash::adapters::sample_market_adapter::SampleMarketAdapter;
use polydash::adapters::sqlite_adapter::SqliteAdapter;
use polydash::domain::error::PolydashError;
use polydash::domain::execution::{OrderTicket, TradeRequest};
use polydash::domain::position::Side;
use polydash::domain::settings::Settings;
use polydash::domain::trade::Fill;
use polydash::ports::order_port::OrderPort;
use polydash::ports::store_port::StorePort;
use polydash::services::app::App;
use std::sync::Arc;
use std::time::Duration;

/// Order port that always fails, standing in for an unreachable exchange.
pub struct FailingOrders;

#[async_trait]
impl OrderPort for FailingOrders {
    fn name(&self) -> &str {
        "failing"
    }

    async fn submit(&self, _ticket: &OrderTicket) -> Result<Fill, PolydashError> {
        Err(PolydashError::upstream("failing", "connection refused"))
    }
}

/// Order port that never answers inside the test timeout.
pub struct SlowOrders;

#[async_trait]
impl OrderPort for SlowOrders {
    fn name(&self) -> &str {
        "slow"
    }

    async fn submit(&self, ticket: &OrderTicket) -> Result<Fill, PolydashError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        PaperOrderAdapter::new(0.0).submit(ticket).await
    }
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::resolve(&FileConfigAdapter::empty()).unwrap();
    settings.refresh.upstream_timeout = Duration::from_millis(200);
    settings.refresh.market_limit = 8;
    settings
}

pub fn memory_store() -> Arc<dyn StorePort> {
    let store = SqliteAdapter::in_memory().unwrap();
    store.initialize_schema().unwrap();
    Arc::new(store)
}

pub async fn app_with_orders(orders: Arc<dyn OrderPort>) -> Arc<App> {
    let settings = test_settings();
    let app = App::from_parts(
        settings,
        memory_store(),
        Arc::new(SampleMarketAdapter::new(0.0)),
        Arc::new(HeuristicEstimateAdapter),
        orders,
    );
    app.seed_sample_markets().await.unwrap();
    Arc::new(app)
}

/// Paper-trading app over an in-memory store seeded with the sample markets.
pub async fn paper_app() -> Arc<App> {
    let fee_rate = test_settings().fee_rate;
    app_with_orders(Arc::new(PaperOrderAdapter::new(fee_rate))).await
}

pub fn request(market_id: &str, side: Side, size: f64, price: Option<f64>) -> TradeRequest {
    TradeRequest {
        market_id: market_id.to_string(),
        side,
        size,
        price,
    }
}

/// (trade rows, position rows) currently in the store.
pub fn row_counts(app: &App) -> (usize, usize) {
    let trades = app.store.list_trades(usize::MAX).unwrap().len();
    let positions = app.store.list_positions(None).unwrap().len();
    (trades, positions)
}
