//! Wire types exchanged with the commerce backend.
//!
//! Amounts are decimals; the backend may send them as JSON strings or numbers.

use duka_core::{CartId, CartItemId, CurrencyCode, OrderId, PaymentStatus, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::checkout::{Address, CardDetails, CustomerInfo, Fulfillment, MobileMoneyDetails, PaymentMethod};

// =============================================================================
// Cart Types
// =============================================================================

/// A cart as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Opaque cart ID assigned by the backend.
    pub id: CartId,
    /// Cart items, in display order.
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Sum of line totals before tax.
    pub subtotal: Decimal,
    /// Tax on the subtotal.
    pub tax_total: Decimal,
    /// Subtotal plus tax.
    pub total: Decimal,
    /// Currency of every amount in the cart.
    #[serde(default)]
    pub currency: CurrencyCode,
}

impl Cart {
    /// Total number of units across all items.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find an item by its ID.
    #[must_use]
    pub fn find_item(&self, item_id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }
}

/// A single line in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Opaque item ID. Never assume it is numeric.
    pub id: CartItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Units of the product, at least 1.
    pub quantity: u32,
    /// Product fields copied at add time.
    #[serde(alias = "product")]
    pub product_snapshot: ProductSnapshot,
}

impl CartItem {
    /// Line total at the price the customer pays.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product_snapshot.effective_unit_price() * Decimal::from(self.quantity)
    }
}

/// Product fields denormalized into a cart item when it was added.
///
/// Later price changes on the live product do not affect the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    /// Product name.
    pub name: String,
    /// Stock keeping unit.
    #[serde(default)]
    pub sku: Option<String>,
    /// List price.
    pub price: Decimal,
    /// Sale price. `None` or `0` means the product is not discounted.
    #[serde(default)]
    pub discounted_price: Option<Decimal>,
    /// VAT rate in percent, e.g. `16`.
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
}

impl ProductSnapshot {
    /// The sale price, only when it is a real discount on the list price.
    #[must_use]
    pub fn discount_price(&self) -> Option<Decimal> {
        self.discounted_price
            .filter(|discounted| *discounted > Decimal::ZERO && *discounted < self.price)
    }

    /// Unit price the customer pays.
    #[must_use]
    pub fn effective_unit_price(&self) -> Decimal {
        self.discount_price().unwrap_or(self.price)
    }
}

// =============================================================================
// Checkout Types
// =============================================================================

/// Body of the checkout call.
///
/// Card and mobile money details travel in separate optional fields; at most
/// one of them is set, matching `payment_method`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub cart_id: CartId,
    pub customer: CustomerInfo,
    pub fulfillment: Fulfillment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_details: Option<CardDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_money_details: Option<MobileMoneyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    /// Backend order ID.
    pub order_id: OrderId,
    /// Human-facing order number.
    pub order_number: String,
    /// Payment status right after checkout.
    pub payment_status: PaymentStatus,
}

/// Error body returned by the backend on non-success responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Body for adding an item.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddItemBody<'a> {
    pub product_id: &'a ProductId,
    pub quantity: u32,
}

/// Body for updating an item quantity.
#[derive(Debug, Serialize)]
pub(crate) struct UpdateItemBody {
    pub quantity: u32,
}
