use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use transit_shared::{Masked, Money};
use uuid::Uuid;

use crate::EngineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Confirmed,
    Cancelled,
    /// Removed by an administrator rather than cancelled by the rider.
    Deleted,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Confirmed => "CONFIRMED",
            TicketStatus::Cancelled => "CANCELLED",
            TicketStatus::Deleted => "DELETED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TicketStatus::Confirmed)
    }
}

impl FromStr for TicketStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(TicketStatus::Confirmed),
            "CANCELLED" => Ok(TicketStatus::Cancelled),
            "DELETED" => Ok(TicketStatus::Deleted),
            other => Err(EngineError::UnknownValue { kind: "ticket status", value: other.to_string() }),
        }
    }
}

/// Who the seat is for, relative to the booking user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerRelation {
    #[serde(rename = "SELF")]
    SelfRider,
    Spouse,
    Child,
    Parent,
    Other,
}

impl PassengerRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassengerRelation::SelfRider => "SELF",
            PassengerRelation::Spouse => "SPOUSE",
            PassengerRelation::Child => "CHILD",
            PassengerRelation::Parent => "PARENT",
            PassengerRelation::Other => "OTHER",
        }
    }
}

impl FromStr for PassengerRelation {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SELF" => Ok(PassengerRelation::SelfRider),
            "SPOUSE" => Ok(PassengerRelation::Spouse),
            "CHILD" => Ok(PassengerRelation::Child),
            "PARENT" => Ok(PassengerRelation::Parent),
            "OTHER" => Ok(PassengerRelation::Other),
            other => Err(EngineError::UnknownValue { kind: "passenger relation", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub trip_id: Uuid,
    pub hold_id: Uuid,
    pub pickup_stop_id: Uuid,
    pub dropoff_stop_id: Uuid,
    pub passenger_name: Masked<String>,
    pub passenger_relation: PassengerRelation,
    pub serial_no: i32,
    pub ticket_code: String,
    pub price_paid: Money,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Boarding code printed on the ticket: the trip serial plus a random suffix,
/// e.g. `T007-4KQ9ZD`. Uniqueness per trip is enforced by the store.
pub fn generate_ticket_code(serial_no: i32) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("T{:03}-{}", serial_no, suffix)
}
