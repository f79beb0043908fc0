//! Cart store extractor.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use duka_core::UserId;
use tower_sessions::Session;

use crate::backend::BackendClient;
use crate::cart::{CartIdentity, CartStore, SessionCartIdStorage};
use crate::models::session_keys;
use crate::state::AppState;

/// Cart store over the backend and the visitor's session.
pub type SessionCartStore = CartStore<BackendClient, SessionCartIdStorage>;

/// Extractor that builds the visitor's cart store.
///
/// The identity is the signed-in user when the session carries a user id,
/// otherwise the guest namespace.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(SessionCart(mut store): SessionCart) -> Result<String> {
///     store.ensure_cart_exists().await?;
///     Ok(format!("{} items", store.cart().map_or(0, Cart::item_count)))
/// }
/// ```
pub struct SessionCart(pub SessionCartStore);

impl FromRequestParts<AppState> for SessionCart {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session layer missing"))?;

        let identity = session
            .get::<UserId>(session_keys::CURRENT_USER_ID)
            .await
            .ok()
            .flatten()
            .map_or(CartIdentity::Guest, CartIdentity::User);

        Ok(Self(CartStore::new(
            state.backend().clone(),
            SessionCartIdStorage::new(session),
            identity,
        )))
    }
}
