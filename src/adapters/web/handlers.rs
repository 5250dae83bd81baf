//! HTTP request handlers for the web adapter.

use askama::Template;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::domain::execution::TradeRequest;
use crate::domain::market::Market;
use crate::domain::position::PositionStatus;
use crate::domain::settings::TradingMode;
use crate::domain::signal::TradingSignal;
use crate::services::app::{App, PortfolioSummary};
use crate::services::blocking;
use crate::services::push::PushMessage;
use crate::services::snapshot::SourceStatus;

use super::templates::{DashboardTemplate, ErrorTemplate};
use super::WebError;

const DEFAULT_TRADE_LIMIT: usize = 50;

pub async fn dashboard(State(app): State<Arc<App>>) -> Result<Html<String>, WebError> {
    let markets = app.snapshot.markets().await;
    let summary = app.portfolio().await?;
    let template = DashboardTemplate {
        mode: summary.mode,
        stats: &summary.stats,
        balance: summary.balance,
        markets: &markets,
        refresh_secs: app.settings.refresh.interval.as_secs(),
    };
    template
        .render()
        .map(Html)
        .map_err(|e| WebError::internal(format!("template error: {e}")))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub status: Option<String>,
}

pub async fn list_markets(
    State(app): State<Arc<App>>,
    Query(params): Query<ListParams>,
) -> Json<Vec<Market>> {
    let mut markets = app.snapshot.markets().await;
    if let Some(limit) = params.limit {
        markets.truncate(limit);
    }
    Json(markets)
}

#[derive(Debug, Serialize)]
pub struct MarketDetail {
    pub market: Market,
    pub implied_probability: f64,
    pub days_to_expiry: Option<i64>,
    pub signal: Option<TradingSignal>,
}

pub async fn get_market(
    State(app): State<Arc<App>>,
    Path(id): Path<String>,
) -> Result<Json<MarketDetail>, WebError> {
    let cached = app.snapshot.cached().into_iter().find(|m| m.id == id);
    let market = match cached {
        Some(market) => market,
        None => {
            let store = Arc::clone(&app.store);
            let lookup = id.clone();
            blocking(move || store.get_market(&lookup))
                .await?
                .ok_or_else(|| WebError::not_found(format!("market not found: {id}")))?
        }
    };

    let signal = app.signals.signal_for(&market).await?;
    Ok(Json(MarketDetail {
        implied_probability: market.implied_probability(),
        days_to_expiry: market.time_to_expiry_days(chrono::Utc::now()),
        signal,
        market,
    }))
}

pub async fn list_positions(
    State(app): State<Arc<App>>,
    Query(params): Query<ListParams>,
) -> Result<Response, WebError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<PositionStatus>)
        .transpose()?;
    let store = Arc::clone(&app.store);
    let positions = blocking(move || store.list_positions(status)).await?;
    Ok(Json(positions).into_response())
}

pub async fn list_trades(
    State(app): State<Arc<App>>,
    Query(params): Query<ListParams>,
) -> Result<Response, WebError> {
    let limit = params.limit.unwrap_or(DEFAULT_TRADE_LIMIT);
    let store = Arc::clone(&app.store);
    let trades = blocking(move || store.list_trades(limit)).await?;
    Ok(Json(trades).into_response())
}

pub async fn portfolio(State(app): State<Arc<App>>) -> Result<Json<PortfolioSummary>, WebError> {
    Ok(Json(app.portfolio().await?))
}

pub async fn signals(State(app): State<Arc<App>>) -> Result<Json<Vec<TradingSignal>>, WebError> {
    let markets = app.snapshot.markets().await;
    Ok(Json(app.signals.signals(&markets).await?))
}

pub async fn execute_trade(
    State(app): State<Arc<App>>,
    body: Result<Json<TradeRequest>, JsonRejection>,
) -> Result<Response, WebError> {
    let Json(request) = body.map_err(|e| WebError::bad_request(e.body_text()))?;
    let (trade, position) = app.executor.execute(request).await?;

    app.registry.broadcast(&PushMessage::TradeExecuted {
        trade: trade.clone(),
        position: position.clone(),
    });
    Ok(Json(json!({ "success": true, "trade": trade, "position": position })).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseRequest {
    #[serde(default)]
    pub price: Option<f64>,
}

pub async fn close_position(
    State(app): State<Arc<App>>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Response, WebError> {
    let price = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<CloseRequest>(&body)
            .map_err(|e| WebError::bad_request(format!("invalid close request: {e}")))?
            .price
    };
    let position = app.executor.close(id, price).await?;

    app.registry.broadcast(&PushMessage::PositionClosed {
        position: position.clone(),
    });
    Ok(Json(json!({ "success": true, "position": position })).into_response())
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub mode: TradingMode,
    pub market_data: SourceStatus,
    pub estimator: SourceStatus,
    pub last_refresh: Option<chrono::DateTime<chrono::Utc>>,
    pub subscribers: usize,
    /// Largest size a single trade request may carry.
    pub max_position_size: f64,
}

pub async fn status(State(app): State<Arc<App>>) -> Json<StatusReport> {
    Json(StatusReport {
        mode: app.settings.mode,
        market_data: app.snapshot.status(),
        estimator: app.signals.status(),
        last_refresh: app.clock.last(),
        subscribers: app.registry.len(),
        max_position_size: app.executor.max_position_size(),
    })
}

pub async fn not_found(uri: Uri) -> Response {
    if uri.path().starts_with("/api") {
        return WebError::not_found(format!("no route for {}", uri.path())).into_response();
    }
    let template = ErrorTemplate {
        message: "Page not found",
        status: StatusCode::NOT_FOUND.as_u16(),
    };
    match template.render() {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Page not found").into_response(),
    }
}
