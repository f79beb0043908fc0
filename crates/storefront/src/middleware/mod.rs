//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with in-memory store)
//!
//! Handlers that touch the cart take a [`SessionCart`], which builds a cart
//! store over the request's session.

pub mod cart;
pub mod session;

pub use cart::{SessionCart, SessionCartStore};
pub use session::create_session_layer;
