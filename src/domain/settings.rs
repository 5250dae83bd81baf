//! Runtime settings, resolved and validated once at startup.
//!
//! Every component receives the piece of [`Settings`] it needs through its
//! constructor; nothing reads configuration after this point.

use serde::Serialize;
use std::time::Duration;

use super::error::PolydashError;
use super::market::PricePolicy;
use super::signal::{ExposureLimits, SignalConfig};
use crate::ports::config_port::ConfigPort;

const DEFAULT_GAMMA_URL: &str = "https://gamma-api.polymarket.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    /// Orders are filled locally against the store.
    Paper,
    /// Market data comes from the upstream exchange.
    Live,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolymarketCredentials {
    pub api_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub upstream_timeout: Duration,
    pub market_limit: usize,
    pub demo_drift: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub pool_size: u32,
    pub mode: TradingMode,
    pub signal: SignalConfig,
    pub fee_rate: f64,
    pub price_policy: PricePolicy,
    pub refresh: RefreshSettings,
    pub push_queue_capacity: usize,
    pub log_level: String,
    pub polymarket: Option<PolymarketCredentials>,
    pub estimator_url: Option<String>,
}

impl Settings {
    pub fn resolve(config: &dyn ConfigPort) -> Result<Self, PolydashError> {
        let host = non_empty(config, "server", "host").unwrap_or_else(|| "127.0.0.1".into());
        let port = config.get_int("server", "port", 3000);
        if !(1..=65535).contains(&port) {
            return Err(invalid("server", "port", "port must be between 1 and 65535"));
        }

        let database_path =
            non_empty(config, "database", "path").unwrap_or_else(|| "data/polydash.db".into());
        let pool_size = u32::try_from(config.get_int("database", "pool_size", 4))
            .ok()
            .filter(|size| *size >= 1)
            .ok_or_else(|| {
                invalid(
                    "database",
                    "pool_size",
                    "pool_size must be between 1 and 4294967295",
                )
            })?;

        let signal = resolve_signal(config)?;
        let fee_rate = config.get_double("trading", "fee_rate", 0.001);
        if !(0.0..1.0).contains(&fee_rate) {
            return Err(invalid("trading", "fee_rate", "fee_rate must be in [0, 1)"));
        }
        let price_policy = resolve_price_policy(config)?;
        let refresh = resolve_refresh(config)?;

        let push_queue_capacity = config.get_int("push", "queue_capacity", 32);
        if push_queue_capacity < 1 {
            return Err(invalid("push", "queue_capacity", "queue_capacity must be at least 1"));
        }

        let polymarket = resolve_credentials(config);
        let demo_mode = config.get_bool("trading", "demo_mode", true);
        let mode = resolve_mode(demo_mode, polymarket.is_some(), cfg!(feature = "live"));

        Ok(Settings {
            host,
            port: port as u16,
            database_path,
            pool_size,
            mode,
            signal,
            fee_rate,
            price_policy,
            refresh,
            push_queue_capacity: push_queue_capacity as usize,
            log_level: non_empty(config, "logging", "level").unwrap_or_else(|| "info".into()),
            polymarket,
            estimator_url: non_empty(config, "estimator", "url"),
        })
    }

    pub fn max_position_size(&self) -> f64 {
        self.signal.max_position_size
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Live mode needs all of: demo mode off, credentials, and the `live` build.
pub fn resolve_mode(demo_mode: bool, has_credentials: bool, live_built: bool) -> TradingMode {
    if !demo_mode && has_credentials && live_built {
        TradingMode::Live
    } else {
        TradingMode::Paper
    }
}

fn resolve_signal(config: &dyn ConfigPort) -> Result<SignalConfig, PolydashError> {
    let bankroll = config.get_double("trading", "bankroll", 10_000.0);
    if bankroll <= 0.0 {
        return Err(invalid("trading", "bankroll", "bankroll must be positive"));
    }
    let max_position_size = config.get_double("trading", "max_position_size", 100.0);
    if max_position_size <= 0.0 {
        return Err(invalid(
            "trading",
            "max_position_size",
            "max_position_size must be positive",
        ));
    }
    let risk_tolerance = config.get_double("trading", "risk_tolerance", 0.25);
    if risk_tolerance <= 0.0 || risk_tolerance > 1.0 {
        return Err(invalid(
            "trading",
            "risk_tolerance",
            "risk_tolerance must be between 0 and 1",
        ));
    }
    let edge_threshold = config.get_double("trading", "edge_threshold", 0.005);
    if !(0.0..1.0).contains(&edge_threshold) {
        return Err(invalid(
            "trading",
            "edge_threshold",
            "edge_threshold must be in [0, 1)",
        ));
    }
    let entry_improvement = config.get_double("trading", "entry_improvement", 0.01);
    if !(0.0..0.5).contains(&entry_improvement) {
        return Err(invalid(
            "trading",
            "entry_improvement",
            "entry_improvement must be in [0, 0.5)",
        ));
    }

    Ok(SignalConfig {
        bankroll,
        risk_tolerance,
        max_position_size,
        edge_threshold,
        entry_improvement,
        limits: ExposureLimits::default(),
    })
}

fn resolve_price_policy(config: &dyn ConfigPort) -> Result<PricePolicy, PolydashError> {
    let tolerance = config.get_double("trading", "price_tolerance", 0.01);
    if !(0.0..1.0).contains(&tolerance) {
        return Err(invalid(
            "trading",
            "price_tolerance",
            "price_tolerance must be in [0, 1)",
        ));
    }
    let policy = non_empty(config, "trading", "price_policy")
        .unwrap_or_else(|| "independent".into())
        .to_ascii_lowercase();
    match policy.as_str() {
        "independent" => Ok(PricePolicy::Independent),
        "complementary" => Ok(PricePolicy::Complementary { tolerance }),
        _ => Err(invalid(
            "trading",
            "price_policy",
            "price_policy must be independent or complementary",
        )),
    }
}

fn resolve_refresh(config: &dyn ConfigPort) -> Result<RefreshSettings, PolydashError> {
    let interval_secs = config.get_int("refresh", "interval_secs", 30);
    if interval_secs < 1 {
        return Err(invalid("refresh", "interval_secs", "interval_secs must be at least 1"));
    }
    let timeout_ms = config.get_int("refresh", "upstream_timeout_ms", 5000);
    if timeout_ms < 1 {
        return Err(invalid(
            "refresh",
            "upstream_timeout_ms",
            "upstream_timeout_ms must be at least 1",
        ));
    }
    let market_limit = config.get_int("refresh", "market_limit", 20);
    if market_limit < 1 {
        return Err(invalid("refresh", "market_limit", "market_limit must be at least 1"));
    }
    let demo_drift = config.get_double("refresh", "demo_drift", 0.0);
    if !(0.0..=0.5).contains(&demo_drift) {
        return Err(invalid("refresh", "demo_drift", "demo_drift must be in [0, 0.5]"));
    }

    Ok(RefreshSettings {
        interval: Duration::from_secs(interval_secs as u64),
        upstream_timeout: Duration::from_millis(timeout_ms as u64),
        market_limit: market_limit as usize,
        demo_drift,
    })
}

fn resolve_credentials(config: &dyn ConfigPort) -> Option<PolymarketCredentials> {
    Some(PolymarketCredentials {
        api_url: non_empty(config, "polymarket", "api_url")
            .unwrap_or_else(|| DEFAULT_GAMMA_URL.into()),
        api_key: non_empty(config, "polymarket", "api_key")?,
        api_secret: non_empty(config, "polymarket", "api_secret")?,
        passphrase: non_empty(config, "polymarket", "passphrase")?,
    })
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn invalid(section: &str, key: &str, reason: &str) -> PolydashError {
    PolydashError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
