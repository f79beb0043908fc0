//! Conversions from checkout input to backend request bodies.

use duka_core::CartId;

use super::CheckoutRequest;
use crate::checkout::{CheckoutInput, PaymentDetails};

impl CheckoutRequest {
    /// Build the checkout body for a cart.
    ///
    /// The billing address falls back to the shipping address. Payment
    /// details are split into the per-method fields the backend expects.
    #[must_use]
    pub fn new(cart_id: &CartId, input: &CheckoutInput) -> Self {
        let (card_details, mobile_money_details) = match &input.payment {
            PaymentDetails::Card(card) => (Some(card.normalized()), None),
            PaymentDetails::MobileMoney(mobile) => (None, Some(mobile.normalized())),
            PaymentDetails::BankTransfer | PaymentDetails::CashOnPickup => (None, None),
        };

        Self {
            cart_id: cart_id.clone(),
            customer: input.customer.trimmed(),
            fulfillment: input.fulfillment,
            shipping_address: input.shipping_address.clone(),
            billing_address: input.billing_address().cloned(),
            payment_method: input.payment.method(),
            card_details,
            mobile_money_details,
            notes: input
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
        }
    }
}
