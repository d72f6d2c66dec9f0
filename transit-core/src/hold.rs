use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use transit_shared::Masked;
use uuid::Uuid;

use crate::identity::Role;
use crate::ticket::PassengerRelation;
use crate::{EngineError, EngineResult};

/// A time-boxed claim on exactly one seat of a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub pickup_stop_id: Uuid,
    pub dropoff_stop_id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// State of a hold row as seen at a given instant. A confirmed hold has no
/// state here: confirming deletes the row in the same transaction that
/// issues the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Held,
    Expired,
}

impl Hold {
    pub fn state_at(&self, now: DateTime<Utc>) -> HoldState {
        if self.is_expired(now) {
            HoldState::Expired
        } else {
            HoldState::Held
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Checks a confirm may consume this hold on behalf of `user_id`.
    pub fn ensure_consumable(&self, user_id: Uuid, now: DateTime<Utc>) -> EngineResult<()> {
        if self.user_id != user_id {
            return Err(EngineError::HoldNotOwned(self.id));
        }
        if self.state_at(now) == HoldState::Expired {
            return Err(EngineError::HoldExpired { hold_id: self.id });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldRequest {
    pub user_id: Uuid,
    pub role: Role,
    pub trip_id: Uuid,
    pub pickup_stop_id: Uuid,
    pub dropoff_stop_id: Uuid,
    pub count: i32,
}

impl HoldRequest {
    pub fn validate(&self, max_seats: i32) -> EngineResult<()> {
        if self.count < 1 || self.count > max_seats {
            return Err(EngineError::InvalidSeatCount { requested: self.count, max: max_seats });
        }
        Ok(())
    }

    pub fn expiry_from(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
        now + Duration::seconds(ttl_seconds as i64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmItem {
    pub hold_id: Uuid,
    pub passenger_name: Masked<String>,
    pub passenger_relation: PassengerRelation,
}

/// Rejects empty batches and repeated hold ids before any row is touched.
pub fn validate_batch(items: &[ConfirmItem]) -> EngineResult<()> {
    if items.is_empty() {
        return Err(EngineError::EmptyBatch);
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.hold_id) {
            return Err(EngineError::DuplicateBatchItem { hold_id: item.hold_id });
        }
        if item.passenger_name.expose().trim().is_empty() {
            return Err(EngineError::MissingPassengerName { hold_id: item.hold_id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hold(user_id: Uuid, expires_in: i64) -> Hold {
        let now = Utc::now();
        Hold {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            pickup_stop_id: Uuid::new_v4(),
            dropoff_stop_id: Uuid::new_v4(),
            user_id,
            expires_at: now + Duration::seconds(expires_in),
            created_at: now,
        }
    }

    fn item(hold_id: Uuid) -> ConfirmItem {
        ConfirmItem {
            hold_id,
            passenger_name: Masked::new("Alex Doe".to_string()),
            passenger_relation: PassengerRelation::SelfRider,
        }
    }

    #[test]
    fn test_hold_lifecycle_states() {
        let user = Uuid::new_v4();
        let live = hold(user, 600);
        assert_eq!(live.state_at(Utc::now()), HoldState::Held);
        assert!(live.ensure_consumable(user, Utc::now()).is_ok());

        let stale = hold(user, -1);
        assert_eq!(stale.state_at(Utc::now()), HoldState::Expired);
        assert!(matches!(
            stale.ensure_consumable(user, Utc::now()),
            Err(EngineError::HoldExpired { .. })
        ));
    }

    #[test]
    fn test_hold_ownership() {
        let live = hold(Uuid::new_v4(), 600);
        assert!(matches!(
            live.ensure_consumable(Uuid::new_v4(), Utc::now()),
            Err(EngineError::HoldNotOwned(_))
        ));
    }

    #[test]
    fn test_seat_count_bounds() {
        let mut req = HoldRequest {
            user_id: Uuid::new_v4(),
            role: Role::Student,
            trip_id: Uuid::new_v4(),
            pickup_stop_id: Uuid::new_v4(),
            dropoff_stop_id: Uuid::new_v4(),
            count: 1,
        };
        assert!(req.validate(4).is_ok());
        req.count = 0;
        assert!(matches!(req.validate(4), Err(EngineError::InvalidSeatCount { .. })));
        req.count = 5;
        assert!(matches!(req.validate(4), Err(EngineError::InvalidSeatCount { requested: 5, max: 4 })));
    }

    #[test]
    fn test_batch_validation() {
        assert!(matches!(validate_batch(&[]), Err(EngineError::EmptyBatch)));

        let id = Uuid::new_v4();
        assert!(matches!(
            validate_batch(&[item(id), item(id)]),
            Err(EngineError::DuplicateBatchItem { .. })
        ));
        assert!(validate_batch(&[item(id), item(Uuid::new_v4())]).is_ok());
    }
}
