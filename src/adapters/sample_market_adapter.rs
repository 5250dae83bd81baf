//! Built-in sample markets for demo mode.
//!
//! The catalogue is fixed; with `demo_drift > 0` each fetch moves the YES
//! price of every market by a random amount up to `demo_drift`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::domain::error::PolydashError;
use crate::domain::market::Market;
use crate::ports::market_data_port::MarketDataPort;

struct SampleMarket {
    question: &'static str,
    category: &'static str,
    volume: f64,
    yes_price: f64,
    days_to_expiry: i64,
}

const CATALOGUE: [SampleMarket; 8] = [
    SampleMarket {
        question: "Will the Democratic candidate win the 2024 US Presidential Election?",
        category: "Politics",
        volume: 1_500_000.0,
        yes_price: 0.52,
        days_to_expiry: 45,
    },
    SampleMarket {
        question: "Will Bitcoin reach $50,000 by end of 2024?",
        category: "Crypto",
        volume: 890_000.0,
        yes_price: 0.68,
        days_to_expiry: 90,
    },
    SampleMarket {
        question: "Will there be a major AI breakthrough announced in 2024?",
        category: "Technology",
        volume: 340_000.0,
        yes_price: 0.74,
        days_to_expiry: 120,
    },
    SampleMarket {
        question: "Will the S&P 500 reach 5000 points in 2024?",
        category: "Finance",
        volume: 567_000.0,
        yes_price: 0.43,
        days_to_expiry: 60,
    },
    SampleMarket {
        question: "Will Ethereum reach $3000 by end of 2024?",
        category: "Crypto",
        volume: 423_000.0,
        yes_price: 0.61,
        days_to_expiry: 75,
    },
    SampleMarket {
        question: "Will there be a recession in the US in 2024?",
        category: "Economics",
        volume: 234_000.0,
        yes_price: 0.28,
        days_to_expiry: 100,
    },
    SampleMarket {
        question: "Will Tesla stock price exceed $300 in 2024?",
        category: "Stocks",
        volume: 189_000.0,
        yes_price: 0.35,
        days_to_expiry: 30,
    },
    SampleMarket {
        question: "Will the Federal Reserve cut interest rates in 2024?",
        category: "Economics",
        volume: 445_000.0,
        yes_price: 0.72,
        days_to_expiry: 14,
    },
];

const LIQUIDITY_SHARE: f64 = 0.06;

/// The sample catalogue at its base prices, end dates relative to `now`.
pub fn sample_markets(now: DateTime<Utc>, limit: usize) -> Vec<Market> {
    CATALOGUE
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, sample)| build_market(i, sample, sample.yes_price, now))
        .collect()
}

fn build_market(index: usize, sample: &SampleMarket, yes_price: f64, now: DateTime<Utc>) -> Market {
    let yes_price = round3(yes_price.clamp(0.01, 0.99));
    let end = now + Duration::days(sample.days_to_expiry);
    Market {
        id: format!("demo_market_{}", index + 1),
        question: sample.question.to_string(),
        end_date: Some(end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        category: Some(sample.category.to_string()),
        volume: sample.volume,
        liquidity: sample.volume * LIQUIDITY_SHARE,
        yes_price,
        no_price: round3(1.0 - yes_price),
        created_at: None,
        updated_at: None,
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Sample feed. End dates are fixed when the adapter is created, so the
/// markets move toward expiry as the process runs.
pub struct SampleMarketAdapter {
    drift: f64,
    anchor: DateTime<Utc>,
    rng: Mutex<StdRng>,
}

impl SampleMarketAdapter {
    pub fn new(drift: f64) -> Self {
        Self::anchored(drift, Utc::now())
    }

    pub fn anchored(drift: f64, anchor: DateTime<Utc>) -> Self {
        Self {
            drift,
            anchor,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(drift: f64, seed: u64) -> Self {
        Self {
            drift,
            anchor: Utc::now(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl MarketDataPort for SampleMarketAdapter {
    fn name(&self) -> &str {
        "sample"
    }

    async fn fetch_markets(&self, limit: usize) -> Result<Vec<Market>, PolydashError> {
        let anchor = self.anchor;
        if self.drift <= 0.0 {
            return Ok(sample_markets(anchor, limit));
        }

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| PolydashError::upstream("sample", "random source poisoned"))?;
        Ok(CATALOGUE
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, sample)| {
                let moved = sample.yes_price + rng.gen_range(-self.drift..=self.drift);
                build_market(i, sample, moved, anchor)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::PricePolicy;

    #[test]
    fn catalogue_has_eight_valid_markets() {
        let markets = sample_markets(Utc::now(), 50);
        assert_eq!(markets.len(), 8);
        for market in &markets {
            market
                .validate(PricePolicy::Complementary { tolerance: 1e-9 })
                .unwrap();
            assert!(market.time_to_expiry_days(Utc::now()).unwrap() >= 13);
        }
        assert_eq!(markets[0].id, "demo_market_1");
        assert_eq!(markets[0].yes_price, 0.52);
        assert!((markets[0].liquidity - 90_000.0).abs() < 1e-6);
    }

    #[test]
    fn limit_truncates() {
        assert_eq!(sample_markets(Utc::now(), 3).len(), 3);
        assert!(sample_markets(Utc::now(), 0).is_empty());
    }

    #[tokio::test]
    async fn zero_drift_returns_base_prices() {
        let adapter = SampleMarketAdapter::new(0.0);
        let markets = adapter.fetch_markets(8).await.unwrap();
        assert_eq!(markets[1].yes_price, 0.68);
    }

    #[tokio::test]
    async fn drift_stays_within_bounds() {
        let adapter = SampleMarketAdapter::with_seed(0.05, 7);
        for _ in 0..20 {
            let markets = adapter.fetch_markets(8).await.unwrap();
            for (market, sample) in markets.iter().zip(CATALOGUE.iter()) {
                assert!((market.yes_price - sample.yes_price).abs() <= 0.0505);
                assert!((market.yes_price + market.no_price - 1.0).abs() < 1e-9);
            }
        }
    }

    #[tokio::test]
    async fn end_dates_count_down_from_creation() {
        let created = Utc::now() - Duration::days(30);
        let adapter = SampleMarketAdapter::anchored(0.0, created);

        let first = adapter.fetch_markets(8).await.unwrap();
        let second = adapter.fetch_markets(8).await.unwrap();
        assert_eq!(first[0].end_date, second[0].end_date);

        let now = Utc::now();
        // 45-day market created 30 days ago
        let left = first[0].time_to_expiry_days(now).unwrap();
        assert!((14..=15).contains(&left), "{left}");
        // 14-day market has already expired
        assert!(first[7].time_to_expiry_days(now).unwrap() < 0);
    }
}
