//! Positions: stakes in one side of a market.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PolydashError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "YES", alias = "Yes")]
    Yes,
    #[serde(alias = "NO", alias = "No")]
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }

    /// Profit or loss of `size` held from `entry` to `current`.
    ///
    /// Prices are YES probabilities for both sides, so a NO stake gains
    /// when the YES price falls.
    pub fn profit_loss(&self, entry: f64, current: f64, size: f64) -> f64 {
        match self {
            Side::Yes => (current - entry) * size,
            Side::No => (entry - current) * size,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Side {
    type Err = PolydashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Side::Yes),
            "no" => Ok(Side::No),
            other => Err(PolydashError::validation(format!(
                "side must be yes or no, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
        }
    }
}

impl FromStr for PositionStatus {
    type Err = PolydashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PositionStatus::Open),
            "closed" => Ok(PositionStatus::Closed),
            other => Err(PolydashError::validation(format!(
                "status must be open or closed, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub market_id: String,
    pub side: Side,
    pub size: f64,
    pub entry_price: f64,
    pub current_price: Option<f64>,
    pub pnl: f64,
    pub status: PositionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Denormalized from the market for display.
    pub question: Option<String>,
    pub category: Option<String>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn pnl_at(&self, price: f64) -> f64 {
        self.side.profit_loss(self.entry_price, price, self.size)
    }

    /// Capital committed to the position at entry.
    pub fn exposure(&self) -> f64 {
        self.size
    }
}
