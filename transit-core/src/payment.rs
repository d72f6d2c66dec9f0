use serde::{Deserialize, Serialize};
use transit_shared::Money;
use uuid::Uuid;

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    MobileWallet,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::MobileWallet => "MOBILE_WALLET",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }
}

/// A verified "payment succeeded" notification from the gateway adapter.
/// Signature checks and redirect handling happen before this is built.
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub user_id: Uuid,
    pub amount: Money,
    pub reference_id: String,
    pub method: PaymentMethod,
}

impl PaymentNotification {
    /// Gateways report amounts in major units; convert at the boundary.
    pub fn from_gateway(
        user_id: Uuid,
        amount_major: f64,
        reference_id: &str,
        method: PaymentMethod,
    ) -> EngineResult<Self> {
        let amount = Money::from_major(amount_major)
            .map_err(|e| EngineError::InvalidAmount(e.to_string()))?;
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount("top-up amount must be positive".to_string()));
        }
        let reference_id = reference_id.trim();
        if reference_id.is_empty() {
            return Err(EngineError::InvalidTransfer("reference id is required".to_string()));
        }
        Ok(Self {
            user_id,
            amount,
            reference_id: reference_id.to_string(),
            method,
        })
    }
}

/// Result of applying a top-up. A replayed webhook lands in `AlreadyApplied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopupOutcome {
    Applied { balance: Money },
    AlreadyApplied { balance: Money },
}

impl TopupOutcome {
    pub fn balance(&self) -> Money {
        match self {
            TopupOutcome::Applied { balance } | TopupOutcome::AlreadyApplied { balance } => *balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_converts_major_units() {
        let n = PaymentNotification::from_gateway(Uuid::new_v4(), 50.0, " R1 ", PaymentMethod::Card).unwrap();
        assert_eq!(n.amount, Money::from_minor(5000));
        assert_eq!(n.reference_id, "R1");
    }

    #[test]
    fn test_notification_rejects_bad_input() {
        let user = Uuid::new_v4();
        assert!(matches!(
            PaymentNotification::from_gateway(user, 0.0, "R1", PaymentMethod::Card),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            PaymentNotification::from_gateway(user, f64::NAN, "R1", PaymentMethod::Card),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(PaymentNotification::from_gateway(user, 10.0, "", PaymentMethod::MobileWallet).is_err());
    }
}
