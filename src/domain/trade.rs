//! Executed trades. Records are append-only once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Side;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub market_id: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
    pub question: Option<String>,
    pub category: Option<String>,
}

/// An order as executed by the order provider, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub market_id: String,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    pub fee: f64,
    pub order_id: Option<String>,
}
