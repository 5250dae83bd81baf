//! Trade request validation and fill arithmetic.
//!
//! Everything here runs before the store is touched: a request that fails
//! any check never reaches a write.

use serde::{Deserialize, Serialize};

use super::error::PolydashError;
use super::market::{check_probability, Market};
use super::position::Side;

/// A trade as requested by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub market_id: String,
    pub side: Side,
    pub size: f64,
    /// Limit price as a YES probability. Defaults to the market's quote.
    #[serde(default)]
    pub price: Option<f64>,
}

/// A request that passed validation, with its price resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTicket {
    pub market_id: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
}

/// Checks size and price ranges and the per-trade size limit.
pub fn validate_request(
    request: &TradeRequest,
    max_position_size: f64,
) -> Result<(), PolydashError> {
    if request.market_id.trim().is_empty() {
        return Err(PolydashError::validation("market_id must not be empty"));
    }
    if !request.size.is_finite() || request.size <= 0.0 {
        return Err(PolydashError::validation(format!(
            "size must be positive, got {}",
            request.size
        )));
    }
    if let Some(price) = request.price {
        check_probability("price", price)?;
    }
    if request.size > max_position_size {
        return Err(PolydashError::LimitExceeded {
            size: request.size,
            max: max_position_size,
        });
    }
    Ok(())
}

/// Builds the order ticket for a validated request against its market.
pub fn build_ticket(request: &TradeRequest, market: &Market) -> Result<OrderTicket, PolydashError> {
    let price = request.price.unwrap_or(market.yes_price);
    check_probability("price", price)?;
    Ok(OrderTicket {
        market_id: market.id.clone(),
        side: request.side,
        size: request.size,
        price,
    })
}

/// Size-weighted average of an existing entry and an added fill.
pub fn weighted_entry_price(
    held_size: f64,
    held_price: f64,
    added_size: f64,
    added_price: f64,
) -> f64 {
    let total = held_size + added_size;
    if total <= 0.0 {
        return added_price;
    }
    (held_size * held_price + added_size * added_price) / total
}

pub fn trading_fee(size: f64, price: f64, fee_rate: f64) -> f64 {
    size * price * fee_rate
}
