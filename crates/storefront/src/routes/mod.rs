//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Health check
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! GET  /cart/count             - Cart count badge (fragment)
//! POST /cart/add               - Add to cart (returns count badge, triggers cart-updated)
//! POST /cart/update            - Update quantity (returns cart_items fragment)
//! POST /cart/remove            - Remove item (returns cart_items fragment)
//! POST /cart/clear             - Remove every item (returns cart_items fragment)
//! POST /cart/sync              - Cross-tab sync signal (cart_items fragment or 204)
//!
//! # Exports
//! GET  /cart/quote             - Printable quote
//! GET  /cart/export.csv        - Cart lines as CSV download
//! GET  /cart/export/print      - Cart lines as printable table
//!
//! # Checkout
//! POST /checkout               - Place the order
//!
//! # Products
//! POST /products/{id}/viewed   - Product view tracking (204)
//! ```

pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    http::{HeaderValue, header},
    routing::{get, post},
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::state::AppState;

/// Create the cart routes router.
///
/// Cart responses are per-visitor and never cached.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/sync", post(cart::sync))
        .route("/quote", get(cart::quote))
        .route("/export.csv", get(cart::export_csv))
        .route("/export/print", get(cart::export_print))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::place_order))
        .route("/products/{id}/viewed", post(products::viewed))
}
