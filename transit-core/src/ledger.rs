use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use transit_shared::Money;
use uuid::Uuid;

use crate::{EngineError, EngineResult};

/// Purpose tag stored next to `owner_ref` for rider wallets.
pub const PERSONAL_PURPOSE: &str = "PERSONAL";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Topup,
    TicketPurchase,
    Refund,
    TransportBooking,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Topup => "TOPUP",
            TransactionType::TicketPurchase => "TICKET_PURCHASE",
            TransactionType::Refund => "REFUND",
            TransactionType::TransportBooking => "TRANSPORT_BOOKING",
            TransactionType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOPUP" => Ok(TransactionType::Topup),
            "TICKET_PURCHASE" => Ok(TransactionType::TicketPurchase),
            "REFUND" => Ok(TransactionType::Refund),
            "TRANSPORT_BOOKING" => Ok(TransactionType::TransportBooking),
            "ADJUSTMENT" => Ok(TransactionType::Adjustment),
            other => Err(EngineError::UnknownValue { kind: "transaction type", value: other.to_string() }),
        }
    }
}

/// The operator's own positions. Every rider-facing transfer has one of these
/// on the other side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemWallet {
    /// Funds top-ups; its balance is minus the float owed to riders.
    Liability,
    /// Collects ticket sales and pays refunds.
    Revenue,
}

impl SystemWallet {
    pub fn name(&self) -> &'static str {
        match self {
            SystemWallet::Liability => "system:liability",
            SystemWallet::Revenue => "system:revenue",
        }
    }

    pub fn purpose(&self) -> &'static str {
        match self {
            SystemWallet::Liability => "RIDER_FLOAT",
            SystemWallet::Revenue => "FARE_REVENUE",
        }
    }
}

/// Who a wallet belongs to. Maps onto the `(owner_ref, purpose)` unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerRef {
    User(Uuid),
    System(SystemWallet),
}

impl OwnerRef {
    pub fn owner_key(&self) -> String {
        match self {
            OwnerRef::User(id) => id.to_string(),
            OwnerRef::System(w) => w.name().to_string(),
        }
    }

    pub fn purpose(&self) -> &'static str {
        match self {
            OwnerRef::User(_) => PERSONAL_PURPOSE,
            OwnerRef::System(w) => w.purpose(),
        }
    }

    /// System wallets may run negative; rider wallets never do.
    pub fn is_system(&self) -> bool {
        matches!(self, OwnerRef::System(_))
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner_key(), self.purpose())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub owner_ref: String,
    pub purpose: String,
    pub is_system: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One immutable signed posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub reference_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A movement of funds, realized as a matched debit/credit pair.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub sender_wallet_id: Uuid,
    pub receiver_wallet_id: Uuid,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub reference_id: String,
    pub description: Option<String>,
}

impl Transfer {
    pub fn validate(&self) -> EngineResult<()> {
        if !self.amount.is_positive() {
            return Err(EngineError::InvalidTransfer(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.sender_wallet_id == self.receiver_wallet_id {
            return Err(EngineError::InvalidTransfer(
                "sender and receiver must differ".to_string(),
            ));
        }
        if self.reference_id.trim().is_empty() {
            return Err(EngineError::InvalidTransfer("reference id is required".to_string()));
        }
        Ok(())
    }

    /// The two legs, sender first. Their amounts always sum to zero.
    pub fn legs(&self) -> [(Uuid, Money); 2] {
        [
            (self.sender_wallet_id, Money::from_minor(-self.amount.minor())),
            (self.receiver_wallet_id, self.amount),
        ]
    }
}

pub fn purchase_reference(ticket_id: Uuid) -> String {
    format!("ticket-{}", ticket_id)
}

pub fn refund_reference(ticket_id: Uuid) -> String {
    format!("ticket-{}-refund", ticket_id)
}
