use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use transit_shared::Money;
use uuid::Uuid;

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    ToCampus,
    FromCampus,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ToCampus => "TO_CAMPUS",
            Direction::FromCampus => "FROM_CAMPUS",
        }
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TO_CAMPUS" => Ok(Direction::ToCampus),
            "FROM_CAMPUS" => Ok(Direction::FromCampus),
            other => Err(EngineError::UnknownValue { kind: "trip direction", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Scheduled,
    Departed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Scheduled => "SCHEDULED",
            TripStatus::Departed => "DEPARTED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TripStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(TripStatus::Scheduled),
            "DEPARTED" => Ok(TripStatus::Departed),
            "CANCELLED" => Ok(TripStatus::Cancelled),
            other => Err(EngineError::UnknownValue { kind: "trip status", value: other.to_string() }),
        }
    }
}

/// A scheduled departure with a finite seat inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub route_id: Uuid,
    pub direction: Direction,
    pub departure_time: DateTime<Utc>,
    pub booking_opens_at: DateTime<Utc>,
    pub booking_closes_at: DateTime<Utc>,
    pub total_capacity: i32,
    pub available_seats: i32,
    pub base_price: Money,
    pub status: TripStatus,
}

impl Trip {
    /// `booking_opens_at <= now < booking_closes_at` and the trip still runs.
    pub fn ensure_bookable(&self, now: DateTime<Utc>) -> EngineResult<()> {
        if self.status == TripStatus::Cancelled {
            return Err(EngineError::TripCancelled { trip_id: self.id });
        }
        if self.status == TripStatus::Departed
            || now < self.booking_opens_at
            || now >= self.booking_closes_at
        {
            return Err(EngineError::BookingWindowClosed { trip_id: self.id });
        }
        Ok(())
    }

    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.status == TripStatus::Departed || now >= self.departure_time
    }
}
