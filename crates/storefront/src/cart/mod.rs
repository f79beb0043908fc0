//! Cart state management.
//!
//! [`CartStore`] is the single source of truth for the cart a customer sees.
//! It hides which storage key holds the active cart id, when a cart gets
//! created, and how stale ids are recovered from.
//!
//! # Identity namespaces
//!
//! Guests and signed-in users keep their cart ids under separate keys so that
//! signing in never silently merges two carts:
//!
//! ```text
//! duka_cart_id_guest          - guest cart
//! duka_cart_id_user_{user_id} - cart of a signed-in user
//! ```

mod storage;
mod store;
mod sync;

pub use storage::{
    CartIdStorage, MemoryCartIdStorage, SessionCartIdStorage, StorageError, StorageEvent,
    StorageEvents,
};
pub use store::CartStore;
pub use sync::SyncSignal;

use duka_core::{CartItemId, UserId};
use thiserror::Error;

use crate::backend::ApiError;

/// Storage key of the guest cart id.
pub const GUEST_CART_KEY: &str = "duka_cart_id_guest";

/// Prefix of per-user cart id keys.
const USER_CART_KEY_PREFIX: &str = "duka_cart_id_user_";

/// Who the cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CartIdentity {
    /// No signed-in user.
    #[default]
    Guest,
    /// A signed-in user.
    User(UserId),
}

impl CartIdentity {
    /// Storage key holding this identity's active cart id.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Guest => GUEST_CART_KEY.to_string(),
            Self::User(user_id) => format!("{USER_CART_KEY_PREFIX}{user_id}"),
        }
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// Errors surfaced by [`CartStore`] operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Backend call failed; displays the backend error unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Reading or writing the cart id failed.
    #[error("Cart storage error: {0}")]
    Storage(#[from] StorageError),

    /// Item id is not usable (empty or whitespace).
    #[error("Invalid cart item: {0}")]
    InvalidItem(String),

    /// Item id is not in the current cart.
    #[error("Item {0} is not in your cart")]
    ItemNotFound(CartItemId),

    /// Quantity below the minimum of 1.
    #[error("Quantity must be at least 1 (got {0})")]
    InvalidQuantity(u32),

    /// Recovery from a stale item id failed and the cart was emptied.
    #[error("Your cart was invalid and has been cleared")]
    CartReset,

    /// No cart id is known yet.
    #[error("No active cart")]
    NoActiveCart,
}

impl CartError {
    /// Whether the error came from the request itself rather than from the
    /// backend or storage failing.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Api(err) => matches!(
                err,
                ApiError::NotFound(_) | ApiError::InvalidIdentifier(_) | ApiError::Rejected { .. }
            ),
            Self::Storage(_) => false,
            Self::InvalidItem(_)
            | Self::ItemNotFound(_)
            | Self::InvalidQuantity(_)
            | Self::CartReset
            | Self::NoActiveCart => true,
        }
    }
}

/// Result type alias for cart operations.
pub type Result<T> = std::result::Result<T, CartError>;
