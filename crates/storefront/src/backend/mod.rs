//! Commerce backend API client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for carts, prices and orders - NO
//!   local copies beyond the cart currently shown to the customer
//! - Plain JSON over HTTP via `reqwest`, camelCase bodies
//! - The [`CartApi`] trait is the seam the cart store is written against, so
//!   the store can run over [`BackendClient`] in production and over an
//!   in-memory backend in tests
//!
//! # Example
//!
//! ```rust,ignore
//! use duka_storefront::backend::{BackendClient, CartApi};
//!
//! let client = BackendClient::new(&config.backend);
//!
//! let cart = client.create_cart().await?;
//! let cart = client.add_cart_item(&cart.id, &product_id, 2).await?;
//! ```

mod client;
mod conversions;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod types;

use std::future::Future;

pub use client::BackendClient;
pub use types::*;

use duka_core::{CartId, CartItemId, ProductId};
use thiserror::Error;

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found (stale or deleted cart, unknown item).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused an identifier because of its format.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The backend rejected the request (out of stock, payment declined, ...).
    ///
    /// Displays the backend message verbatim so it can be shown to customers.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message from the backend error body.
        message: String,
    },

    /// The backend failed (5xx).
    #[error("Backend error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Message from the backend error body.
        message: String,
    },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

impl ApiError {
    /// Whether this error means the referenced cart no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error is a server-side or transport failure rather than
    /// a rejection of the request itself.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Server { .. } | Self::RateLimited(_)
        )
    }
}

/// Cart and checkout operations offered by the commerce backend.
///
/// Every mutation returns the full cart as the backend sees it after the
/// change; callers replace their local copy with it wholesale.
pub trait CartApi: Send + Sync {
    /// Create a new, empty cart.
    fn create_cart(&self) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Fetch a cart. Fails with [`ApiError::NotFound`] for stale ids.
    fn get_cart(&self, cart_id: &CartId) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Add a product to a cart. Whether duplicates merge is up to the backend.
    fn add_cart_item(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Set the quantity of an existing cart item.
    fn update_cart_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Remove an item. Fails with [`ApiError::InvalidIdentifier`] for
    /// malformed item ids.
    fn remove_cart_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Remove every item from a cart.
    fn clear_cart(&self, cart_id: &CartId) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Convert a cart into an order.
    fn checkout_cart(
        &self,
        request: &CheckoutRequest,
    ) -> impl Future<Output = Result<CheckoutResult, ApiError>> + Send;
}
