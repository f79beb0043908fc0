//! Integration tests for storefront routes that answer without the backend.
//!
//! The router is configured with an unreachable backend, so every test here
//! also checks that the route does not need one.

#![allow(clippy::unwrap_used)]

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use duka_integration_tests::{test_config, test_config_with};
use duka_storefront::state::AppState;
use tower::ServiceExt;

async fn send(request: Request<Body>) -> Response {
    duka_storefront::app(AppState::new(test_config()))
        .oneshot(request)
        .await
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_cart_count_without_cart_is_zero() {
    let response = send(get("/cart/count")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(body_text(response).await.trim(), "0");
}

#[tokio::test]
async fn test_quote_without_cart_is_not_found() {
    let response = send(get("/cart/quote")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_sync_signal_is_rejected() {
    let response = send(post_form("/cart/sync", "signal=reload")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hidden_page_does_not_refresh() {
    let response = send(post_form("/cart/sync", "signal=hidden")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_product_view_answers_immediately() {
    let response = send(Request::post("/products/p_rice/viewed").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_unreachable_backend_shows_empty_cart_in_configured_currency() {
    let app = duka_storefront::app(AppState::new(test_config_with(&[("DUKA_CURRENCY", "USD")])));
    let response = app.oneshot(get("/cart")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("$0.00"));
    assert!(!page.contains("K0.00"));
}
