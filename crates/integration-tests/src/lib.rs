//! Integration tests for Duka.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p duka-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_checkout` - cart store and checkout wizard over the in-memory backend
//! - `quote_export` - quotes, CSV and printable tables built from real carts
//! - `http` - storefront routes that answer without the backend
//!
//! Shared fixtures live here.

use duka_storefront::backend::ProductSnapshot;
use duka_storefront::backend::memory::InMemoryBackend;
use duka_storefront::cart::{CartIdentity, CartStore, MemoryCartIdStorage};
use duka_storefront::checkout::{CheckoutWizard, CustomerInfo, Fulfillment, PaymentDetails};
use duka_storefront::config::StorefrontConfig;
use rust_decimal::Decimal;

/// Store type used throughout the tests.
pub type TestStore = CartStore<InMemoryBackend, MemoryCartIdStorage>;

/// A product priced in whole kwacha, 16% VAT, no discount.
#[must_use]
pub fn product(name: &str, price: i64) -> ProductSnapshot {
    ProductSnapshot {
        name: name.to_string(),
        sku: Some(name.to_uppercase().replace(' ', "-")),
        price: Decimal::from(price),
        discounted_price: None,
        tax_rate: Some(Decimal::from(16)),
    }
}

/// The same product with a discounted unit price.
#[must_use]
pub fn discounted(name: &str, price: i64, discounted_price: i64) -> ProductSnapshot {
    ProductSnapshot {
        discounted_price: Some(Decimal::from(discounted_price)),
        ..product(name, price)
    }
}

/// Backend stocking rice, oil and a discounted kettle.
#[must_use]
pub fn shop() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_product("p_rice", product("Rice 5kg", 120))
        .with_product("p_oil", product("Cooking oil 2L", 85))
        .with_product("p_kettle", discounted("Kettle", 100, 80))
}

/// A guest store over `backend` and `storage`.
#[must_use]
pub fn guest_store(backend: &InMemoryBackend, storage: &MemoryCartIdStorage) -> TestStore {
    CartStore::new(backend.clone(), storage.clone(), CartIdentity::Guest)
}

/// A wizard filled in for a pickup order paid with `payment`.
#[must_use]
pub fn pickup_wizard(payment: PaymentDetails) -> CheckoutWizard {
    let mut wizard = CheckoutWizard::new();
    wizard.set_fulfillment(Fulfillment::Pickup);
    wizard.set_customer(CustomerInfo {
        name: "Chanda Mwale".to_string(),
        email: "chanda@duka.test".to_string(),
        phone: "0971234567".to_string(),
    });
    wizard.set_payment(payment);
    wizard
}

/// Configuration pointing at a backend that is never contacted.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    test_config_with(&[])
}

/// [`test_config`] with extra environment variables.
///
/// # Panics
///
/// Panics if the variables fail to load.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_config_with(vars: &[(&str, &str)]) -> StorefrontConfig {
    StorefrontConfig::from_lookup(|key| match key {
        "DUKA_BACKEND_URL" => Some("http://127.0.0.1:9/v1/".to_string()),
        "DUKA_BASE_URL" => Some("http://localhost:3000".to_string()),
        _ => vars
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| (*value).to_string()),
    })
    .expect("test configuration should load")
}
