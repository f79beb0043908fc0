//! Checkout orchestration.
//!
//! A linear three-step wizard (fulfillment, details, review) collects the
//! [`CheckoutInput`] and hands it to [`crate::cart::CartStore::checkout`].
//! Each step gates forward navigation on its own fields; going back is
//! always allowed until the order is placed.

mod input;
mod validation;
mod wizard;

pub use input::{
    Address, CardDetails, CheckoutInput, CustomerInfo, Fulfillment, MobileMoneyDetails,
    PaymentDetails, PaymentMethod,
};
pub use validation::{ValidationError, normalize_mobile_number};
pub use wizard::{CheckoutState, CheckoutStep, CheckoutWizard};

use thiserror::Error;

use crate::cart::CartError;

/// Errors from driving the checkout wizard.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The current step is missing or has invalid fields.
    #[error("{step} is incomplete: {reason}")]
    StepIncomplete {
        step: CheckoutStep,
        reason: ValidationError,
    },

    /// The requested move is not possible from the current state.
    #[error("Cannot {action} from the {state} state")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Placing the order failed; displays the cart error unchanged.
    #[error(transparent)]
    Cart(#[from] CartError),
}

impl CheckoutError {
    /// Whether the customer can fix this by editing the form.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::StepIncomplete { .. } | Self::InvalidTransition { .. } => true,
            Self::Cart(err) => err.is_client_error(),
        }
    }
}

/// Result type alias for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ApiError;

    #[test]
    fn test_declined_order_is_client_error() {
        let declined = CheckoutError::from(CartError::from(ApiError::Rejected {
            status: 402,
            message: "Card declined".to_string(),
        }));
        assert!(declined.is_client_error());

        let outage = CheckoutError::from(CartError::from(ApiError::Server {
            status: 503,
            message: "maintenance".to_string(),
        }));
        assert!(!outage.is_client_error());
    }
}
