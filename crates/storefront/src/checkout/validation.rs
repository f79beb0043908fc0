//! Field validation for checkout details.

use std::sync::LazyLock;

use duka_core::Email;
use regex::Regex;
use thiserror::Error;

use super::input::{
    Address, CardDetails, CustomerInfo, Fulfillment, MobileMoneyDetails, PaymentDetails,
};

/// Local mobile number: leading zero and nine more digits.
static LOCAL_MOBILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0\d{9}$").expect("Invalid regex"));

/// Country calling code for numbers rewritten to local form.
const COUNTRY_CODE: &str = "260";

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Enter a valid email address")]
    InvalidEmail,

    #[error("Enter a valid mobile number, e.g. 0971234567")]
    InvalidMobileNumber,

    #[error("Card number must be 13 to 19 digits")]
    InvalidCardNumber,

    #[error("Expiry month must be between 1 and 12")]
    InvalidExpiryMonth,

    #[error("Expiry year must be 2 or 4 digits")]
    InvalidExpiryYear,

    #[error("CVV must be 3 or 4 digits")]
    InvalidCvv,

    #[error("Cash on pickup is only available for pickup orders")]
    CashRequiresPickup,

    #[error("Your cart is empty")]
    EmptyCart,
}

/// Normalize a mobile number to local form, `0XXXXXXXXX`.
///
/// Spaces, dashes and parentheses are dropped and an international `+260`
/// or `260` prefix becomes a leading `0`. Returns `None` when the result is
/// not a ten-digit local number.
#[must_use]
pub fn normalize_mobile_number(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    let local = if let Some(rest) = compact.strip_prefix('+') {
        rest.strip_prefix(COUNTRY_CODE)
            .map(|national| format!("0{national}"))?
    } else if let Some(national) = compact
        .strip_prefix(COUNTRY_CODE)
        .filter(|_| compact.len() == 12)
    {
        format!("0{national}")
    } else {
        compact
    };

    LOCAL_MOBILE_RE.is_match(&local).then_some(local)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

impl CustomerInfo {
    /// Check that every contact field is present and the email parses.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.name, "Name")?;
        require(&self.email, "Email")?;
        require(&self.phone, "Phone")?;
        Email::parse(&self.email).map_err(|_| ValidationError::InvalidEmail)?;
        Ok(())
    }
}

impl Address {
    /// Check the fields needed to deliver to this address.
    ///
    /// # Errors
    ///
    /// Returns the first missing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.line1, "Address line 1")?;
        require(&self.city, "City")?;
        require(&self.country, "Country")
    }
}

impl CardDetails {
    /// Check number length, expiry, CVV and cardholder name.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let compact: String = self
            .number
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        if !is_digits(&compact) || !(13..=19).contains(&compact.len()) {
            return Err(ValidationError::InvalidCardNumber);
        }

        let month = self.expiry_month.trim();
        match month.parse::<u8>() {
            Ok(1..=12) if is_digits(month) => {}
            _ => return Err(ValidationError::InvalidExpiryMonth),
        }

        let year = self.expiry_year.trim();
        if !is_digits(year) || !matches!(year.len(), 2 | 4) {
            return Err(ValidationError::InvalidExpiryYear);
        }

        let cvv = self.cvv.trim();
        if !is_digits(cvv) || !matches!(cvv.len(), 3 | 4) {
            return Err(ValidationError::InvalidCvv);
        }

        require(&self.cardholder_name, "Cardholder name")
    }
}

impl MobileMoneyDetails {
    /// Check the provider and the wallet number.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.provider, "Mobile money provider")?;
        normalize_mobile_number(&self.phone_number)
            .map(drop)
            .ok_or(ValidationError::InvalidMobileNumber)
    }
}

impl PaymentDetails {
    /// Validate the payload for the chosen fulfillment.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails, or
    /// [`ValidationError::CashRequiresPickup`] for cash on a delivery order.
    pub fn validate(&self, fulfillment: Fulfillment) -> Result<(), ValidationError> {
        match self {
            Self::Card(card) => card.validate(),
            Self::MobileMoney(mobile) => mobile.validate(),
            Self::BankTransfer => Ok(()),
            Self::CashOnPickup if fulfillment == Fulfillment::Pickup => Ok(()),
            Self::CashOnPickup => Err(ValidationError::CashRequiresPickup),
        }
    }
}
