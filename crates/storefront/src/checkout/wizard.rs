//! The checkout wizard state machine.

use std::fmt;

use tracing::{info, instrument, warn};

use super::input::{Address, CheckoutInput, CustomerInfo, Fulfillment, PaymentDetails};
use super::validation::ValidationError;
use super::{CheckoutError, Result};
use crate::backend::{Cart, CartApi, CheckoutResult};
use crate::cart::{CartIdStorage, CartStore};

/// A step of the wizard that collects input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutStep {
    /// Delivery or pickup.
    Fulfillment,
    /// Contact, address and payment details.
    Details,
    /// Final review before placing the order.
    Review,
}

impl CheckoutStep {
    /// Human-readable step title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Fulfillment => "Fulfillment",
            Self::Details => "Details",
            Self::Review => "Review",
        }
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Where the wizard is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckoutState {
    #[default]
    Fulfillment,
    Details,
    Review,
    /// The order was placed. Terminal.
    Completed(CheckoutResult),
    /// Placing the order failed. The customer stays on review and may try
    /// again by hand.
    Failed(String),
}

impl CheckoutState {
    /// The input step shown for this state; `None` once completed.
    #[must_use]
    pub const fn step(&self) -> Option<CheckoutStep> {
        match self {
            Self::Fulfillment => Some(CheckoutStep::Fulfillment),
            Self::Details => Some(CheckoutStep::Details),
            Self::Review | Self::Failed(_) => Some(CheckoutStep::Review),
            Self::Completed(_) => None,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Fulfillment => "fulfillment",
            Self::Details => "details",
            Self::Review => "review",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<CheckoutStep> for CheckoutState {
    fn from(step: CheckoutStep) -> Self {
        match step {
            CheckoutStep::Fulfillment => Self::Fulfillment,
            CheckoutStep::Details => Self::Details,
            CheckoutStep::Review => Self::Review,
        }
    }
}

/// Collects checkout input step by step and places the order.
#[derive(Debug, Clone, Default)]
pub struct CheckoutWizard {
    state: CheckoutState,
    fulfillment: Option<Fulfillment>,
    customer: CustomerInfo,
    shipping_address: Address,
    billing_address: Option<Address>,
    payment: Option<PaymentDetails>,
    notes: Option<String>,
}

impl CheckoutWizard {
    /// Start a wizard on the first step.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    /// The message of the last failed order attempt.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            CheckoutState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// The placed order, once completed.
    #[must_use]
    pub const fn result(&self) -> Option<&CheckoutResult> {
        match &self.state {
            CheckoutState::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub const fn set_fulfillment(&mut self, fulfillment: Fulfillment) {
        self.fulfillment = Some(fulfillment);
    }

    pub fn set_customer(&mut self, customer: CustomerInfo) {
        self.customer = customer;
    }

    pub fn set_shipping_address(&mut self, address: Address) {
        self.shipping_address = address;
    }

    /// Set a separate billing address; `None` bills the shipping address.
    pub fn set_billing_address(&mut self, address: Option<Address>) {
        self.billing_address = address;
    }

    pub fn set_payment(&mut self, payment: PaymentDetails) {
        self.payment = Some(payment);
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
    }

    /// Check the fields of `step`.
    ///
    /// # Errors
    ///
    /// Returns the first field that blocks the step.
    pub fn check_step(
        &self,
        step: CheckoutStep,
        cart: Option<&Cart>,
    ) -> std::result::Result<(), ValidationError> {
        match step {
            CheckoutStep::Fulfillment => self
                .fulfillment
                .map(drop)
                .ok_or(ValidationError::Required("Fulfillment option")),
            CheckoutStep::Details => self.check_details(),
            CheckoutStep::Review => {
                self.check_details()?;
                match cart {
                    Some(cart) if !cart.is_empty() => Ok(()),
                    _ => Err(ValidationError::EmptyCart),
                }
            }
        }
    }

    fn check_details(&self) -> std::result::Result<(), ValidationError> {
        let fulfillment = self
            .fulfillment
            .ok_or(ValidationError::Required("Fulfillment option"))?;
        self.customer.validate()?;
        if fulfillment == Fulfillment::Delivery {
            self.shipping_address.validate()?;
        }
        if let Some(billing) = &self.billing_address {
            billing.validate()?;
        }
        self.payment
            .as_ref()
            .ok_or(ValidationError::Required("Payment method"))?
            .validate(fulfillment)
    }

    /// Whether the current step allows moving forward.
    #[must_use]
    pub fn can_proceed(&self, cart: Option<&Cart>) -> bool {
        match &self.state {
            CheckoutState::Completed(_) => false,
            state => state
                .step()
                .is_some_and(|step| self.check_step(step, cart).is_ok()),
        }
    }

    /// Move to the next step if the current one is complete.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepIncomplete`] when the current step fails
    /// its checks, or [`CheckoutError::InvalidTransition`] from review and
    /// beyond; review moves on only through [`Self::place_order`].
    pub fn next(&mut self, cart: Option<&Cart>) -> Result<CheckoutStep> {
        let (current, next) = match self.state {
            CheckoutState::Fulfillment => (CheckoutStep::Fulfillment, CheckoutStep::Details),
            CheckoutState::Details => (CheckoutStep::Details, CheckoutStep::Review),
            _ => return Err(self.invalid("go forward")),
        };
        self.check_step(current, cart)
            .map_err(|reason| CheckoutError::StepIncomplete {
                step: current,
                reason,
            })?;
        self.state = next.into();
        Ok(next)
    }

    /// Move to the previous step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidTransition`] on the first step or
    /// after the order was placed.
    pub fn back(&mut self) -> Result<CheckoutStep> {
        let previous = match self.state {
            CheckoutState::Details => CheckoutStep::Fulfillment,
            CheckoutState::Review | CheckoutState::Failed(_) => CheckoutStep::Details,
            _ => return Err(self.invalid("go back")),
        };
        self.state = previous.into();
        Ok(previous)
    }

    /// Assemble the input for an order attempt.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepIncomplete`] for the details step when
    /// anything required is missing.
    pub fn build_input(&self) -> Result<CheckoutInput> {
        let incomplete = |reason| CheckoutError::StepIncomplete {
            step: CheckoutStep::Details,
            reason,
        };
        self.check_details().map_err(incomplete)?;

        let (Some(fulfillment), Some(payment)) = (self.fulfillment, self.payment.clone()) else {
            return Err(incomplete(ValidationError::Required("Payment method")));
        };

        Ok(CheckoutInput {
            customer: self.customer.clone(),
            fulfillment,
            shipping_address: (fulfillment == Fulfillment::Delivery)
                .then(|| self.shipping_address.clone()),
            billing_address: self.billing_address.clone(),
            payment,
            notes: self.notes.clone(),
        })
    }

    /// Place the order for the store's cart.
    ///
    /// Allowed from review, and from a failed attempt. Success completes the
    /// wizard; failure records the backend message verbatim and leaves the
    /// customer on review. Nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::StepIncomplete`] when the cart is empty or
    /// details are missing, and [`CheckoutError::Cart`] when the order was
    /// not accepted.
    #[instrument(skip_all)]
    pub async fn place_order<A: CartApi, S: CartIdStorage>(
        &mut self,
        store: &mut CartStore<A, S>,
    ) -> Result<CheckoutResult> {
        if !matches!(self.state, CheckoutState::Review | CheckoutState::Failed(_)) {
            return Err(self.invalid("place an order"));
        }
        self.check_step(CheckoutStep::Review, store.cart())
            .map_err(|reason| CheckoutError::StepIncomplete {
                step: CheckoutStep::Review,
                reason,
            })?;
        let input = self.build_input()?;

        match store.checkout(&input).await {
            Ok(result) => {
                info!(order_number = %result.order_number, "Order placed");
                self.state = CheckoutState::Completed(result.clone());
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, "Order failed");
                self.state = CheckoutState::Failed(e.to_string());
                Err(e.into())
            }
        }
    }

    fn invalid(&self, action: &'static str) -> CheckoutError {
        CheckoutError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
