//! Duka Core - Shared types library.
//!
//! This crate provides the domain types shared by the Duka storefront and its
//! integration tests:
//! - opaque string identifiers for carts, cart items, products and users
//! - decimal prices with currency formatting
//! - validated email addresses
//! - payment status reported by the backend after checkout
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! Everything that talks to the backend lives in `duka-storefront`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
