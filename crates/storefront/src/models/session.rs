//! Session-related types.
//!
//! Cart ids live in the session under the namespaced keys built by
//! [`crate::cart::CartIdentity::storage_key`]; the keys below hold everything
//! else.

/// Session keys for visitor state.
pub mod keys {
    /// Key holding the signed-in user's id, set by the account service.
    pub const CURRENT_USER_ID: &str = "current_user_id";
}
