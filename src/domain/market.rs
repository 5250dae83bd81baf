//! Markets: tradeable yes/no propositions and their quoted prices.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PolydashError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub liquidity: f64,
    pub yes_price: f64,
    pub no_price: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// How the yes and no prices of a market relate to each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PricePolicy {
    /// Each price is range-checked on its own.
    Independent,
    /// `yes_price + no_price` must be within `tolerance` of 1.
    Complementary { tolerance: f64 },
}

impl Market {
    /// Probability the market assigns to YES.
    pub fn implied_probability(&self) -> f64 {
        self.yes_price
    }

    /// Whole days until `end_date`, negative once expired.
    ///
    /// `None` when there is no end date or it cannot be parsed.
    pub fn time_to_expiry_days(&self, now: DateTime<Utc>) -> Option<i64> {
        let end = parse_end_date(self.end_date.as_deref()?)?;
        Some((end - now).num_days())
    }

    pub fn validate(&self, policy: PricePolicy) -> Result<(), PolydashError> {
        if self.id.trim().is_empty() {
            return Err(PolydashError::validation("market id must not be empty"));
        }
        if !(self.volume.is_finite() && self.volume >= 0.0) {
            return Err(PolydashError::validation(format!(
                "market {} has negative volume",
                self.id
            )));
        }
        if !(self.liquidity.is_finite() && self.liquidity >= 0.0) {
            return Err(PolydashError::validation(format!(
                "market {} has negative liquidity",
                self.id
            )));
        }
        check_probability("yes_price", self.yes_price)?;
        check_probability("no_price", self.no_price)?;

        if let PricePolicy::Complementary { tolerance } = policy {
            let gap = (self.yes_price + self.no_price - 1.0).abs();
            if gap > tolerance {
                return Err(PolydashError::validation(format!(
                    "market {} prices are not complementary: yes {} + no {}",
                    self.id, self.yes_price, self.no_price
                )));
            }
        }
        Ok(())
    }
}

/// Rejects NaN and anything outside `[0, 1]`.
pub fn check_probability(name: &str, value: f64) -> Result<(), PolydashError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PolydashError::validation(format!(
            "{name} must be between 0 and 1, got {value}"
        )))
    }
}

fn parse_end_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
