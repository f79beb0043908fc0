//! HTTP implementation of [`CartApi`] using `reqwest`.

use std::sync::Arc;

use duka_core::{CartId, CartItemId, ProductId};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::types::{AddItemBody, ErrorBody, UpdateItemBody};
use super::{ApiError, Cart, CartApi, CheckoutRequest, CheckoutResult};
use crate::config::BackendConfig;

/// Error codes the backend uses for malformed identifiers.
const INVALID_ID_CODES: &[&str] = &["INVALID_ID", "INVALID_ITEM_ID", "INVALID_IDENTIFIER"];

/// Longest slice of a raw error body kept in logs and messages.
const MAX_BODY_EXCERPT: usize = 200;

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the commerce backend REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
}

impl BackendClient {
    /// Create a new backend client.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            inner: Arc::new(BackendClientInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.clone(),
                api_token: config.api_token.clone(),
            }),
        }
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self
            .inner
            .client
            .request(method, self.url(segments))
            .header(reqwest::header::ACCEPT, "application/json");

        match &self.inner.api_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if !status.is_success() {
            let err = classify_error(status, &body);
            if err.is_transient() {
                tracing::error!(
                    status = %status,
                    body = %excerpt(&body),
                    "Backend returned server error"
                );
            } else {
                debug!(status = %status, error = %err, "Backend rejected request");
            }
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&body),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }

    /// Record a product view without waiting for the backend.
    ///
    /// Failures are logged at debug level and otherwise ignored.
    pub fn track_product_view(&self, product_id: ProductId) {
        let client = self.clone();
        tokio::spawn(async move {
            let request = client.request(Method::POST, &["products", product_id.as_str(), "views"]);
            match request.send().await {
                Ok(response) if !response.status().is_success() => {
                    debug!(product_id = %product_id, status = %response.status(), "Product view not recorded");
                }
                Ok(_) => {}
                Err(e) => debug!(product_id = %product_id, error = %e, "Product view tracking failed"),
            }
        });
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_token", &self.inner.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl CartApi for BackendClient {
    #[instrument(skip(self))]
    async fn create_cart(&self) -> Result<Cart, ApiError> {
        self.send(self.request(Method::POST, &["carts"])).await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, ApiError> {
        self.send(self.request(Method::GET, &["carts", cart_id.as_str()]))
            .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, product_id = %product_id))]
    async fn add_cart_item(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let request = self
            .request(Method::POST, &["carts", cart_id.as_str(), "items"])
            .json(&AddItemBody {
                product_id,
                quantity,
            });
        self.send(request).await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, item_id = %item_id))]
    async fn update_cart_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
        quantity: u32,
    ) -> Result<Cart, ApiError> {
        let request = self
            .request(
                Method::PATCH,
                &["carts", cart_id.as_str(), "items", item_id.as_str()],
            )
            .json(&UpdateItemBody { quantity });
        self.send(request).await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id, item_id = %item_id))]
    async fn remove_cart_item(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<Cart, ApiError> {
        self.send(self.request(
            Method::DELETE,
            &["carts", cart_id.as_str(), "items", item_id.as_str()],
        ))
        .await
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn clear_cart(&self, cart_id: &CartId) -> Result<Cart, ApiError> {
        self.send(self.request(Method::DELETE, &["carts", cart_id.as_str(), "items"]))
            .await
    }

    #[instrument(skip(self, request), fields(cart_id = %request.cart_id, method = ?request.payment_method))]
    async fn checkout_cart(&self, request: &CheckoutRequest) -> Result<CheckoutResult, ApiError> {
        self.send(self.request(Method::POST, &["checkout"]).json(request))
            .await
    }
}

// =============================================================================
// Error Classification
// =============================================================================

/// Map a non-success response to an [`ApiError`].
pub(crate) fn classify_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                excerpt(body)
            }
        });

    let invalid_id_code = parsed
        .code
        .as_deref()
        .is_some_and(|code| INVALID_ID_CODES.contains(&code));

    if status == StatusCode::NOT_FOUND {
        ApiError::NotFound(message)
    } else if invalid_id_code
        && matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY)
    {
        ApiError::InvalidIdentifier(message)
    } else if status.is_client_error() {
        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    } else {
        ApiError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(MAX_BODY_EXCERPT).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            base_url: Url::parse(base).unwrap(),
            api_token: Some(SecretString::from("tok_live_9f8e7d6c")),
        })
    }

    #[test]
    fn test_url_encodes_segments() {
        let client = client("https://api.duka.test/v1/");
        let url = client.url(&["carts", "cart 1/2", "items"]);
        assert_eq!(url.as_str(), "https://api.duka.test/v1/carts/cart%201%2F2/items");
    }

    #[test]
    fn test_url_without_trailing_slash() {
        let client = client("https://api.duka.test/v1");
        assert_eq!(
            client.url(&["checkout"]).as_str(),
            "https://api.duka.test/v1/checkout"
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", client("https://api.duka.test/"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("tok_live"));
    }

    #[test]
    fn test_classify_not_found() {
        let err = classify_error(StatusCode::NOT_FOUND, r#"{"message":"Cart not found"}"#);
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Cart not found"));
    }

    #[test]
    fn test_classify_invalid_identifier() {
        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Item id must be a UUID","code":"INVALID_ID"}"#,
        );
        assert!(matches!(err, ApiError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_classify_rejection_keeps_message() {
        let err = classify_error(
            StatusCode::CONFLICT,
            r#"{"message":"Only 2 left in stock","code":"OUT_OF_STOCK"}"#,
        );
        assert_eq!(err.to_string(), "Only 2 left in stock");
        assert!(matches!(err, ApiError::Rejected { status: 409, .. }));
    }

    #[test]
    fn test_classify_server_error_with_plain_body() {
        let err = classify_error(StatusCode::BAD_GATEWAY, "upstream timeout");
        assert!(matches!(
            err,
            ApiError::Server { status: 502, ref message } if message == "upstream timeout"
        ));
    }

    #[test]
    fn test_classify_empty_body_uses_reason() {
        let err = classify_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.to_string(), "Backend error (503): Service Unavailable");
    }
}
