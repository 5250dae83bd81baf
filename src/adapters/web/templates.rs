//! HTML templates using Askama.

use askama::Template;

use crate::domain::market::Market;
use crate::domain::portfolio::PortfolioStats;
use crate::domain::settings::TradingMode;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate<'a> {
    pub mode: TradingMode,
    pub stats: &'a PortfolioStats,
    pub balance: f64,
    pub markets: &'a [Market],
    pub refresh_secs: u64,
}

impl DashboardTemplate<'_> {
    pub fn mode_label(&self) -> &'static str {
        match self.mode {
            TradingMode::Paper => "PAPER",
            TradingMode::Live => "LIVE",
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate<'a> {
    pub message: &'a str,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sample_market_adapter::sample_markets;

    #[test]
    fn dashboard_renders_markets_and_stats() {
        let stats = PortfolioStats::compute(&[], &[], 10_000.0);
        let markets = sample_markets(chrono::Utc::now(), 2);
        let html = DashboardTemplate {
            mode: TradingMode::Paper,
            stats: &stats,
            balance: 10_000.0,
            markets: &markets,
            refresh_secs: 30,
        }
        .render()
        .unwrap();

        assert!(html.contains("PAPER"));
        assert!(html.contains("mode-paper"));
        assert!(html.contains("demo_market_1"));
        assert!(html.contains("Will Bitcoin reach $50,000 by end of 2024?"));
        assert!(html.contains("10000.00"));
    }

    #[test]
    fn error_page_escapes_message() {
        let html = ErrorTemplate {
            message: "<script>",
            status: 404,
        }
        .render()
        .unwrap();
        assert!(html.contains("404"));
        assert!(!html.contains("<script>"));
    }
}
