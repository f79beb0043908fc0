//! Status enums reported by the commerce backend.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Payment status of an order right after checkout.
///
/// Card payments usually settle immediately; mobile money and bank transfer
/// orders stay pending until the customer confirms on their side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    AwaitingPayment,
    Paid,
    Failed,
}

impl PaymentStatus {
    /// Human-readable label for order confirmation pages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::AwaitingPayment => "Awaiting payment",
            Self::Paid => "Paid",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let status: PaymentStatus = serde_json::from_str("\"awaiting_payment\"").unwrap();
        assert_eq!(status, PaymentStatus::AwaitingPayment);
        assert_eq!(serde_json::to_string(&PaymentStatus::Paid).unwrap(), "\"paid\"");
    }
}
