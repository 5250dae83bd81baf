//! Trading signal generation.
//!
//! A signal compares an estimated fair probability with the market's YES
//! price and sizes the stake with a capped Kelly fraction. Everything here
//! is a pure function of its inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::Market;
use super::position::{Position, Side};

const DEFAULT_VOLATILITY: f64 = 0.3;
const DEFAULT_HORIZON_YEARS: f64 = 0.25;
const DAYS_PER_YEAR: f64 = 365.25;
/// Edge at which confidence reaches ~63% of the model's certainty.
const EDGE_SCALE: f64 = 0.05;
const PRICE_FLOOR: f64 = 0.01;
const PRICE_CEILING: f64 = 0.99;
const VOLUME_REFERENCE: f64 = 500_000.0;
const LIQUIDITY_REFERENCE: f64 = 50_000.0;

/// A fair-probability estimate for one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityEstimate {
    pub fair_value: f64,
    /// How much the model trusts its own estimate, in `[0, 1]`.
    pub certainty: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub market_id: String,
    pub side: Side,
    pub confidence: f64,
    pub recommended_size: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub rationale: String,
    pub risk_score: f64,
}

/// Fractions of bankroll a new stake may bring open exposure up to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureLimits {
    pub single_position: f64,
    pub category_concentration: f64,
}

impl Default for ExposureLimits {
    fn default() -> Self {
        ExposureLimits {
            single_position: 0.1,
            category_concentration: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub bankroll: f64,
    pub risk_tolerance: f64,
    pub max_position_size: f64,
    pub edge_threshold: f64,
    pub entry_improvement: f64,
    pub limits: ExposureLimits,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            bankroll: 10_000.0,
            risk_tolerance: 0.25,
            max_position_size: 100.0,
            edge_threshold: 0.005,
            entry_improvement: 0.01,
            limits: ExposureLimits::default(),
        }
    }
}

/// Produces at most one signal for `market`.
///
/// `open_positions` feeds the exposure checks; a stake that would breach a
/// limit is halved rather than dropped.
pub fn generate_signal(
    market: &Market,
    estimate: &ProbabilityEstimate,
    open_positions: &[Position],
    config: &SignalConfig,
    now: DateTime<Utc>,
) -> Option<TradingSignal> {
    let days = market.time_to_expiry_days(now);
    if matches!(days, Some(d) if d < 0) {
        return None;
    }

    let quote = market.yes_price;
    let fair = estimate.fair_value.clamp(0.0, 1.0);
    let edge = fair - quote;

    let side = if edge > config.edge_threshold {
        Side::Yes
    } else if edge < -config.edge_threshold {
        Side::No
    } else {
        return None;
    };

    let fraction = kelly_fraction(side, fair, quote);
    let mut size = (config.bankroll * config.risk_tolerance * fraction)
        .min(config.max_position_size)
        .max(0.0);
    if breaches_limits(size, market, open_positions, config) {
        size *= 0.5;
    }
    let size = round_to(size, 2);
    if size <= 0.0 {
        return None;
    }

    let certainty = estimate.certainty.clamp(0.0, 1.0);
    let confidence = (certainty * (1.0 - (-edge.abs() / EDGE_SCALE).exp())).clamp(0.0, 1.0);

    let entry_price = match side {
        Side::Yes => (quote - config.entry_improvement).max(PRICE_FLOOR),
        Side::No => (quote + config.entry_improvement).min(PRICE_CEILING),
    };
    let (stop_loss, take_profit) = exit_levels(side, entry_price);

    let expiry = match days {
        Some(d) => format!("{d} days to expiry"),
        None => "no expiry".to_string(),
    };
    let rationale = format!(
        "Fair value {fair:.3} vs market {quote:.3}: edge {edge:+.3}, Kelly fraction {fraction:.3}, {expiry} ({})",
        estimate.source
    );

    Some(TradingSignal {
        market_id: market.id.clone(),
        side,
        confidence: round_to(confidence, 4),
        recommended_size: size,
        entry_price: round_to(entry_price, 3),
        stop_loss: Some(round_to(stop_loss, 3)),
        take_profit: Some(round_to(take_profit, 3)),
        rationale,
        risk_score: round_to(risk_score(confidence, market.liquidity, days), 4),
    })
}

/// Kelly fraction for a binary contract bought at `quote` with win probability `fair`.
pub fn kelly_fraction(side: Side, fair: f64, quote: f64) -> f64 {
    let fraction = match side {
        Side::Yes if quote < 1.0 => (fair - quote) / (1.0 - quote),
        Side::No if quote > 0.0 => (quote - fair) / quote,
        _ => 0.0,
    };
    fraction.clamp(0.0, 1.0)
}

/// Fair value after log-odds time decay, as for a binary option.
pub fn time_decay_fair_value(price: f64, years: f64, volatility: f64) -> f64 {
    if years <= 0.0 {
        return price;
    }
    let p = price.clamp(0.001, 0.999);
    let log_odds = (p / (1.0 - p)).ln();
    let decay = (-0.5 * volatility * volatility * years).exp();
    let fair = 1.0 / (1.0 + (-log_odds * decay).exp());
    fair.clamp(0.001, 0.999)
}

/// Local fair-value model used when no estimation service is configured.
///
/// Thin, illiquid markets are assumed to be mispriced by up to three
/// points in a direction fixed by the market id.
pub fn heuristic_estimate(market: &Market, now: DateTime<Utc>) -> ProbabilityEstimate {
    let years = market
        .time_to_expiry_days(now)
        .map(|d| d as f64 / DAYS_PER_YEAR)
        .unwrap_or(DEFAULT_HORIZON_YEARS);
    let base = time_decay_fair_value(market.yes_price, years, DEFAULT_VOLATILITY);

    let volume_factor = (market.volume / VOLUME_REFERENCE).min(1.0);
    let liquidity_factor = (market.liquidity / LIQUIDITY_REFERENCE).min(1.0);
    let inefficiency = (1.0 - volume_factor) * 0.02 + (1.0 - liquidity_factor) * 0.01;
    let tilt = (stable_unit(&market.id) - 0.5) * 2.0 * inefficiency;

    ProbabilityEstimate {
        fair_value: (base + tilt).clamp(0.001, 0.999),
        certainty: 0.5 + 0.3 * volume_factor,
        source: "local heuristic".to_string(),
    }
}

fn breaches_limits(
    size: f64,
    market: &Market,
    open_positions: &[Position],
    config: &SignalConfig,
) -> bool {
    let bankroll = config.bankroll;
    if bankroll <= 0.0 {
        return true;
    }
    let open: Vec<&Position> = open_positions.iter().filter(|p| p.is_open()).collect();
    let total: f64 = open.iter().map(|p| p.exposure()).sum();
    let in_category: f64 = open
        .iter()
        .filter(|p| p.category.is_some() && p.category == market.category)
        .map(|p| p.exposure())
        .sum();

    size / bankroll > config.limits.single_position
        || (in_category + size) / bankroll > config.limits.category_concentration
        || (total + size) / bankroll > config.risk_tolerance
}

/// Stop-loss and take-profit as YES prices for a stake entered at `entry`.
fn exit_levels(side: Side, entry: f64) -> (f64, f64) {
    match side {
        Side::Yes => (
            (entry * 0.8).max(PRICE_FLOOR),
            (entry * 1.3).min(PRICE_CEILING),
        ),
        Side::No => {
            let held = 1.0 - entry;
            (
                1.0 - (held * 0.8).max(PRICE_FLOOR),
                1.0 - (held * 1.3).min(PRICE_CEILING),
            )
        }
    }
}

fn risk_score(confidence: f64, liquidity: f64, days: Option<i64>) -> f64 {
    let liquidity_risk = 1.0 - (liquidity / LIQUIDITY_REFERENCE).clamp(0.0, 1.0);
    let expiry_risk = match days {
        Some(d) => (1.0 - d as f64 / 30.0).clamp(0.0, 1.0),
        None => 0.5,
    };
    (((1.0 - confidence) + liquidity_risk + expiry_risk) / 3.0).clamp(0.0, 1.0)
}

/// FNV-1a of `key`, mapped to `[0, 1)`. Stable across runs and platforms.
fn stable_unit(key: &str) -> f64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    (hash % 10_000) as f64 / 10_000.0
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
