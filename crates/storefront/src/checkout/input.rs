//! Checkout input types.
//!
//! A [`CheckoutInput`] is built fresh for every checkout attempt and lives
//! only as long as the request that places the order.

use serde::{Deserialize, Serialize};

/// Customer contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl CustomerInfo {
    /// Copy with surrounding whitespace removed from every field.
    #[must_use]
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
}

/// How the order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    /// Shipped to the shipping address.
    Delivery,
    /// Collected from the store.
    Pickup,
}

impl std::str::FromStr for Fulfillment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(Self::Delivery),
            "pickup" => Ok(Self::Pickup),
            other => Err(format!("unknown fulfillment option: {other}")),
        }
    }
}

/// Payment method selector as sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    MobileMoney,
    BankTransfer,
    CashOnPickup,
}

/// Card details. `Debug` never prints the number or CVV.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
    pub cardholder_name: String,
}

impl CardDetails {
    /// Digits of the card number only.
    #[must_use]
    pub fn digits(&self) -> String {
        self.number.chars().filter(char::is_ascii_digit).collect()
    }

    /// Last four digits, for confirmation screens.
    #[must_use]
    pub fn last_four(&self) -> String {
        let digits = self.digits();
        digits
            .get(digits.len().saturating_sub(4)..)
            .unwrap_or_default()
            .to_string()
    }

    /// Copy with the number reduced to digits and other fields trimmed.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            number: self.digits(),
            expiry_month: self.expiry_month.trim().to_string(),
            expiry_year: self.expiry_year.trim().to_string(),
            cvv: self.cvv.trim().to_string(),
            cardholder_name: self.cardholder_name.trim().to_string(),
        }
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &format_args!("**** {}", self.last_four()))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"[REDACTED]")
            .field("cardholder_name", &self.cardholder_name)
            .finish()
    }
}

/// Mobile money wallet details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileMoneyDetails {
    /// Wallet provider, e.g. `mtn` or `airtel`.
    pub provider: String,
    /// Wallet phone number as typed by the customer.
    pub phone_number: String,
}

impl MobileMoneyDetails {
    /// Copy with the phone number in local 10-digit form when it parses.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            provider: self.provider.trim().to_string(),
            phone_number: super::validation::normalize_mobile_number(&self.phone_number)
                .unwrap_or_else(|| self.phone_number.trim().to_string()),
        }
    }
}

/// Payment details, keyed by method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDetails {
    Card(CardDetails),
    MobileMoney(MobileMoneyDetails),
    BankTransfer,
    CashOnPickup,
}

impl PaymentDetails {
    /// The method selector for this payload.
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::Card(_) => PaymentMethod::Card,
            Self::MobileMoney(_) => PaymentMethod::MobileMoney,
            Self::BankTransfer => PaymentMethod::BankTransfer,
            Self::CashOnPickup => PaymentMethod::CashOnPickup,
        }
    }
}

/// Everything the backend needs to turn a cart into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutInput {
    pub customer: CustomerInfo,
    pub fulfillment: Fulfillment,
    /// Required for delivery, ignored for pickup.
    pub shipping_address: Option<Address>,
    /// Defaults to the shipping address when `None`.
    pub billing_address: Option<Address>,
    pub payment: PaymentDetails,
    pub notes: Option<String>,
}

impl CheckoutInput {
    /// Billing address, falling back to the shipping address.
    #[must_use]
    pub fn billing_address(&self) -> Option<&Address> {
        self.billing_address
            .as_ref()
            .or(self.shipping_address.as_ref())
    }
}
