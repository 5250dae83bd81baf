//! Live market data from the Polymarket Gamma API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::error::PolydashError;
use crate::domain::market::Market;
use crate::ports::market_data_port::MarketDataPort;

const SOURCE: &str = "gamma";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    id: String,
    question: Option<String>,
    end_date: Option<String>,
    category: Option<String>,
    volume_num: Option<f64>,
    liquidity_num: Option<f64>,
    /// JSON-encoded array of decimal strings, YES first.
    outcome_prices: Option<String>,
}

impl GammaMarket {
    fn into_market(self) -> Option<Market> {
        let prices: Vec<String> = serde_json::from_str(self.outcome_prices.as_deref()?).ok()?;
        let yes_price: f64 = prices.first()?.parse().ok()?;
        let no_price: f64 = prices.get(1)?.parse().ok()?;
        Some(Market {
            id: self.id,
            question: self.question.unwrap_or_else(|| "Unknown market".to_string()),
            end_date: self.end_date,
            category: self.category,
            volume: self.volume_num.unwrap_or(0.0),
            liquidity: self.liquidity_num.unwrap_or(0.0),
            yes_price,
            no_price,
            created_at: None,
            updated_at: None,
        })
    }
}

pub struct GammaMarketAdapter {
    http: Client,
    base_url: String,
}

impl GammaMarketAdapter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PolydashError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PolydashError::upstream(SOURCE, e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MarketDataPort for GammaMarketAdapter {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_markets(&self, limit: usize) -> Result<Vec<Market>, PolydashError> {
        let url = format!(
            "{}/markets?active=true&closed=false&order=volumeNum&ascending=false&limit={limit}",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PolydashError::upstream(SOURCE, e))?;
        if !response.status().is_success() {
            return Err(PolydashError::upstream(
                SOURCE,
                format!("HTTP {}", response.status()),
            ));
        }
        let raw: Vec<GammaMarket> = response
            .json()
            .await
            .map_err(|e| PolydashError::upstream(SOURCE, e))?;

        let total = raw.len();
        let markets: Vec<Market> = raw.into_iter().filter_map(GammaMarket::into_market).collect();
        if markets.len() < total {
            debug!(skipped = total - markets.len(), "gamma markets without prices");
        }
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_outcome_prices() {
        let raw: GammaMarket = serde_json::from_str(
            r#"{"id":"12","question":"Q?","endDate":"2030-01-01T00:00:00Z","volumeNum":1200.5,
                "liquidityNum":80,"outcomePrices":"[\"0.61\",\"0.39\"]"}"#,
        )
        .unwrap();
        let market = raw.into_market().unwrap();
        assert_eq!(market.id, "12");
        assert_eq!(market.yes_price, 0.61);
        assert_eq!(market.no_price, 0.39);
        assert_eq!(market.volume, 1200.5);
    }

    #[test]
    fn market_without_prices_is_skipped() {
        let raw: GammaMarket = serde_json::from_str(r#"{"id":"12"}"#).unwrap();
        assert!(raw.into_market().is_none());
    }
}
