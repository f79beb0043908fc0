//! Checkout route handler.
//!
//! The page collects every step in one form; the handler walks the wizard
//! through fulfillment, details and review so each step's guard runs, then
//! places the order.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use crate::backend::CheckoutResult;
use crate::checkout::{
    Address, CardDetails, CheckoutError, CheckoutWizard, CustomerInfo, Fulfillment,
    MobileMoneyDetails, PaymentDetails, PaymentMethod,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::SessionCart;

/// Checkout form data.
///
/// Not `Debug`: it carries the raw card number and CVV.
#[derive(Deserialize)]
pub struct CheckoutForm {
    pub fulfillment: Fulfillment,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub line1: String,
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: String,
    /// Separate billing address; left blank to bill the shipping address.
    pub billing_line1: Option<String>,
    pub billing_city: Option<String>,
    pub billing_country: Option<String>,
    pub payment_method: PaymentMethod,
    pub card_number: Option<String>,
    pub card_expiry_month: Option<String>,
    pub card_expiry_year: Option<String>,
    pub card_cvv: Option<String>,
    pub cardholder_name: Option<String>,
    pub mobile_provider: Option<String>,
    pub mobile_number: Option<String>,
    pub notes: Option<String>,
}

/// Treat blank form fields as absent.
fn filled(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CheckoutForm {
    fn customer(&self) -> CustomerInfo {
        CustomerInfo {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    fn shipping_address(&self) -> Address {
        Address {
            line1: self.line1.clone(),
            line2: filled(self.line2.clone()),
            city: self.city.clone(),
            province: filled(self.province.clone()),
            postal_code: filled(self.postal_code.clone()),
            country: self.country.clone(),
        }
    }

    fn billing_address(&self) -> Option<Address> {
        filled(self.billing_line1.clone()).map(|line1| Address {
            line1,
            city: self.billing_city.clone().unwrap_or_default(),
            country: self.billing_country.clone().unwrap_or_default(),
            ..Address::default()
        })
    }

    fn payment(&self) -> PaymentDetails {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        match self.payment_method {
            PaymentMethod::Card => PaymentDetails::Card(CardDetails {
                number: field(&self.card_number),
                expiry_month: field(&self.card_expiry_month),
                expiry_year: field(&self.card_expiry_year),
                cvv: field(&self.card_cvv),
                cardholder_name: field(&self.cardholder_name),
            }),
            PaymentMethod::MobileMoney => PaymentDetails::MobileMoney(MobileMoneyDetails {
                provider: field(&self.mobile_provider),
                phone_number: field(&self.mobile_number),
            }),
            PaymentMethod::BankTransfer => PaymentDetails::BankTransfer,
            PaymentMethod::CashOnPickup => PaymentDetails::CashOnPickup,
        }
    }

    /// A wizard holding everything the form submitted.
    fn wizard(&self) -> CheckoutWizard {
        let mut wizard = CheckoutWizard::new();
        wizard.set_fulfillment(self.fulfillment);
        wizard.set_customer(self.customer());
        wizard.set_shipping_address(self.shipping_address());
        wizard.set_billing_address(self.billing_address());
        wizard.set_payment(self.payment());
        wizard.set_notes(filled(self.notes.clone()));
        wizard
    }
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/complete.html")]
pub struct CheckoutCompleteTemplate {
    pub result: CheckoutResult,
}

/// Failed order template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/failed.html")]
pub struct CheckoutFailedTemplate {
    pub message: String,
}

/// Place an order for the visitor's cart.
///
/// Step problems answer `422` with the first blocking field. A rejected
/// order renders the backend's message unchanged with its status; the cart
/// is left as it was so the customer can try again.
#[instrument(skip_all)]
pub async fn place_order(
    SessionCart(mut store): SessionCart,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    tracing::info!(
        fulfillment = ?form.fulfillment,
        payment_method = ?form.payment_method,
        "Checkout submitted"
    );
    add_breadcrumb("checkout", "Place order", None);

    store.ensure_cart_exists().await?;

    let mut wizard = form.wizard();
    wizard.next(store.cart())?;
    wizard.next(store.cart())?;

    match wizard.place_order(&mut store).await {
        Ok(result) => Ok(CheckoutCompleteTemplate { result }.into_response()),
        Err(e @ CheckoutError::Cart(_)) if e.is_client_error() => {
            let error = AppError::from(e);
            let message = wizard
                .error()
                .map_or_else(|| error.to_string(), ToString::to_string);
            Ok((error.status(), CheckoutFailedTemplate { message }).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
