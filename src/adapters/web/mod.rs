//! Web server adapter.
//!
//! JSON API under `/api`, the push channel at `/ws`, and a server-rendered
//! dashboard at `/` backed by static assets.

mod error;
mod handlers;
mod templates;
mod ws;

pub use error::{status_from_error, WebError};
pub use handlers::*;
pub use templates::*;
pub use ws::websocket_handler;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::app::App;

pub fn build_router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(handlers::dashboard))
        .route("/api/markets", get(handlers::list_markets))
        .route("/api/markets/{id}", get(handlers::get_market))
        .route("/api/positions", get(handlers::list_positions))
        .route("/api/positions/{id}/close", post(handlers::close_position))
        .route("/api/trades", get(handlers::list_trades))
        .route("/api/trade", post(handlers::execute_trade))
        .route("/api/portfolio", get(handlers::portfolio))
        .route("/api/signals", get(handlers::signals))
        .route("/api/status", get(handlers::status))
        .route("/ws", get(ws::websocket_handler))
        .nest_service("/static", ServeDir::new("static"))
        .fallback(handlers::not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app)
}
