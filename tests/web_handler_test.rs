//! HTTP API tests driven through the router with `oneshot`.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use polydash::adapters::web::build_router;
use polydash::services::app::App;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use common::*;

async fn router() -> (Router, Arc<App>) {
    let app = paper_app().await;
    (build_router(Arc::clone(&app)), app)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(router, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(router, request).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn empty_portfolio_is_all_zeros() {
    let (router, _) = router().await;
    let (status, body) = get_json(&router, "/api/portfolio").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_pnl"], 0.0);
    assert_eq!(body["open_positions"], 0);
    assert_eq!(body["total_trades"], 0);
    assert_eq!(body["win_rate"], 0.0);
    assert_eq!(body["total_closed_positions"], 0);
    assert_eq!(body["balance"], 10_000.0);
    assert_eq!(body["mode"], "paper");
}

#[tokio::test]
async fn lists_sample_markets() {
    let (router, _) = router().await;
    let (status, body) = get_json(&router, "/api/markets?limit=3").await;

    assert_eq!(status, StatusCode::OK);
    let markets = body.as_array().unwrap();
    assert_eq!(markets.len(), 3);
    assert_eq!(markets[0]["id"], "demo_market_1");
}

#[tokio::test]
async fn market_detail_and_unknown_market() {
    let (router, _) = router().await;

    let (status, body) = get_json(&router, "/api/markets/demo_market_2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["market"]["id"], "demo_market_2");
    assert_eq!(body["implied_probability"], 0.68);

    let (status, body) = get_json(&router, "/api/markets/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn trade_then_list_trades() {
    let (router, _) = router().await;

    let (status, body) = post_json(
        &router,
        "/api/trade",
        json!({ "market_id": "demo_market_1", "side": "YES", "size": 10.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["position"]["status"], "open");

    let (status, body) = get_json(&router, "/api/trades").await;
    assert_eq!(status, StatusCode::OK);
    let trades = body.as_array().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0]["price"], 0.52);
    assert_eq!(trades[0]["side"], "yes");

    let (_, body) = get_json(&router, "/api/positions?status=open").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = get_json(&router, "/api/positions?status=closed").await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_trades_map_to_status_codes() {
    let (router, app) = router().await;

    let (status, body) = post_json(
        &router,
        "/api/trade",
        json!({ "market_id": "demo_market_1", "side": "yes", "size": -1.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["detail"].as_str().unwrap().contains("size"));

    let (status, _) = post_json(
        &router,
        "/api/trade",
        json!({ "market_id": "demo_market_1", "side": "yes", "size": 500.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post_json(
        &router,
        "/api/trade",
        json!({ "market_id": "missing", "side": "yes", "size": 1.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&router, "/api/trade", json!({ "side": "maybe" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(row_counts(&app), (0, 0));
}

#[tokio::test]
async fn close_twice_conflicts() {
    let (router, _) = router().await;
    let (_, body) = post_json(
        &router,
        "/api/trade",
        json!({ "market_id": "demo_market_1", "side": "yes", "size": 10.0, "price": 0.5 }),
    )
    .await;
    let id = body["position"]["id"].as_i64().unwrap();
    let uri = format!("/api/positions/{id}/close");

    let (status, body) = post_json(&router, &uri, json!({ "price": 0.6 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"]["status"], "closed");

    let (status, body) = post_json(&router, &uri, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = post_json(&router, "/api/positions/999/close", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn close_accepts_empty_body() {
    let (router, app) = router().await;
    let (_, position) = app
        .executor
        .execute(request(
            "demo_market_1",
            polydash::domain::position::Side::Yes,
            2.0,
            None,
        ))
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/positions/{}/close", position.id))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn signals_are_sorted_by_confidence() {
    let (router, _) = router().await;
    let (status, body) = get_json(&router, "/api/signals").await;

    assert_eq!(status, StatusCode::OK);
    let confidences: Vec<f64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["confidence"].as_f64().unwrap())
        .collect();
    assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn status_reports_sources() {
    let (router, _) = router().await;
    let (status, body) = get_json(&router, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "paper");
    assert_eq!(body["market_data"]["source"], "sample");
    assert_eq!(body["estimator"]["source"], "heuristic");
    assert_eq!(body["subscribers"], 0);
    assert_eq!(body["max_position_size"], 100.0);
}

#[tokio::test]
async fn dashboard_renders_html() {
    let (router, _) = router().await;
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("PAPER"));
    assert!(body.contains("demo_market_1"));
}

#[tokio::test]
async fn unknown_routes_fall_back() {
    let (router, _) = router().await;

    let (status, body) = get_json(&router, "/api/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let request = Request::builder().uri("/nothing").body(Body::empty()).unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Page not found"));
}
