//! Trade executor: the only writer of trades and positions.
//!
//! Requests are validated before anything is written. Work on one market
//! is serialized by a per-market async lock so concurrent fills cannot lose
//! an update to the averaged entry price; the store's transaction makes the
//! trade and position writes atomic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use super::blocking;
use crate::domain::error::PolydashError;
use crate::domain::execution::{build_ticket, validate_request, OrderTicket, TradeRequest};
use crate::domain::market::{check_probability, Market};
use crate::domain::position::Position;
use crate::domain::trade::{Fill, Trade};
use crate::ports::order_port::OrderPort;
use crate::ports::store_port::StorePort;

pub struct TradeExecutor {
    store: Arc<dyn StorePort>,
    orders: Arc<dyn OrderPort>,
    max_position_size: f64,
    timeout: Duration,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TradeExecutor {
    pub fn new(
        store: Arc<dyn StorePort>,
        orders: Arc<dyn OrderPort>,
        max_position_size: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            orders,
            max_position_size,
            timeout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_position_size(&self) -> f64 {
        self.max_position_size
    }

    pub async fn execute(&self, request: TradeRequest) -> Result<(Trade, Position), PolydashError> {
        validate_request(&request, self.max_position_size)?;

        let lock = self.market_lock(&request.market_id);
        let _guard = lock.lock().await;

        let market = self.load_market(&request.market_id).await?;
        let ticket = build_ticket(&request, &market)?;
        let fill = self.submit(&ticket).await?;

        let store = Arc::clone(&self.store);
        let (trade, position) = blocking(move || store.record_fill(&fill)).await?;
        info!(
            trade = trade.id,
            position = position.id,
            market = %trade.market_id,
            side = %trade.side,
            size = trade.size,
            price = trade.price,
            "trade executed"
        );
        Ok((trade, position))
    }

    /// Closes an open position at `price`, or at the market's YES price.
    pub async fn close(&self, position_id: i64, price: Option<f64>) -> Result<Position, PolydashError> {
        if let Some(price) = price {
            check_probability("price", price)?;
        }

        let position = self.load_position(position_id).await?;
        if !position.is_open() {
            return Err(PolydashError::PositionClosed { id: position_id });
        }

        let lock = self.market_lock(&position.market_id);
        let _guard = lock.lock().await;

        let exit_price = match price {
            Some(price) => price,
            None => self.load_market(&position.market_id).await?.yes_price,
        };

        let store = Arc::clone(&self.store);
        let closed = blocking(move || store.close_position(position_id, exit_price)).await?;
        info!(
            position = closed.id,
            market = %closed.market_id,
            exit_price,
            pnl = closed.pnl,
            "position closed"
        );
        Ok(closed)
    }

    async fn submit(&self, ticket: &OrderTicket) -> Result<Fill, PolydashError> {
        let fill = tokio::time::timeout(self.timeout, self.orders.submit(ticket))
            .await
            .map_err(|_| {
                PolydashError::upstream(
                    self.orders.name(),
                    format!("no fill within {:?}", self.timeout),
                )
            })?
            .inspect_err(|e| warn!(market = %ticket.market_id, error = %e, "order not filled"))?;

        if fill.market_id != ticket.market_id || fill.side != ticket.side {
            return Err(PolydashError::OrderRejected {
                reason: "fill does not match the submitted order".into(),
            });
        }
        if !(fill.size > 0.0 && fill.size <= ticket.size) {
            return Err(PolydashError::OrderRejected {
                reason: format!("fill size {} outside (0, {}]", fill.size, ticket.size),
            });
        }
        check_probability("fill price", fill.price)
            .map_err(|e| PolydashError::OrderRejected { reason: e.to_string() })?;
        Ok(fill)
    }

    async fn load_market(&self, market_id: &str) -> Result<Market, PolydashError> {
        let store = Arc::clone(&self.store);
        let id = market_id.to_string();
        blocking(move || store.get_market(&id))
            .await?
            .ok_or_else(|| PolydashError::market_not_found(market_id))
    }

    async fn load_position(&self, id: i64) -> Result<Position, PolydashError> {
        let store = Arc::clone(&self.store);
        blocking(move || store.get_position(id))
            .await?
            .ok_or_else(|| PolydashError::NotFound {
                entity: "position",
                id: id.to_string(),
            })
    }

    fn market_lock(&self, market_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(market_id.to_string()).or_default())
    }
}
