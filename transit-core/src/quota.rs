use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Role;
use crate::trip::Direction;
use crate::{EngineError, EngineResult};

/// Weekly booking policy for one role and direction. Read-only input to
/// `hold_seats`; bookings never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRule {
    pub user_role: Role,
    pub direction: Direction,
    pub weekly_limit: i32,
    pub allow_dependent_booking: bool,
}

/// What the user already has in the quota week, in the rule's direction.
/// Both confirmed tickets and unexpired holds count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaUsage {
    /// Seats held or confirmed.
    pub seats: i64,
    /// Distinct trips with at least one seat held or confirmed.
    pub trips: i64,
    /// Whether the user already has a seat on the trip being booked.
    pub already_on_trip: bool,
}

impl QuotaRule {
    /// Decides whether `requested` more seats fit the rule.
    ///
    /// Without dependent booking every seat counts against the limit and only a
    /// single seat may be requested. With it, family seats on one trip count as
    /// one booking, so usage is measured in trips.
    pub fn check(&self, usage: &QuotaUsage, requested: i32) -> EngineResult<()> {
        let requested = requested as i64;
        let limit = self.weekly_limit as i64;

        if self.allow_dependent_booking {
            let added = if usage.already_on_trip { 0 } else { 1 };
            if usage.trips + added > limit {
                return Err(EngineError::QuotaExceeded {
                    limit: self.weekly_limit,
                    used: usage.trips,
                    requested: added,
                });
            }
            return Ok(());
        }

        if requested > 1 {
            return Err(EngineError::DependentBookingNotAllowed);
        }
        if usage.seats + requested > limit {
            return Err(EngineError::QuotaExceeded {
                limit: self.weekly_limit,
                used: usage.seats,
                requested,
            });
        }
        Ok(())
    }
}

/// The ISO week (Monday 00:00 UTC up to the next Monday) containing `at`.
pub fn quota_week(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = at.date_naive();
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    let start = Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN));
    (start, start + Duration::days(7))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(limit: i32, dependents: bool) -> QuotaRule {
        QuotaRule {
            user_role: Role::Student,
            direction: Direction::ToCampus,
            weekly_limit: limit,
            allow_dependent_booking: dependents,
        }
    }

    #[test]
    fn test_single_seat_quota() {
        let r = rule(3, false);
        let usage = QuotaUsage { seats: 2, trips: 2, already_on_trip: false };
        assert!(r.check(&usage, 1).is_ok());

        let full = QuotaUsage { seats: 3, trips: 3, already_on_trip: false };
        assert!(matches!(
            r.check(&full, 1),
            Err(EngineError::QuotaExceeded { limit: 3, used: 3, requested: 1 })
        ));
    }

    #[test]
    fn test_multi_seat_requires_dependent_booking() {
        let r = rule(10, false);
        assert!(matches!(
            r.check(&QuotaUsage::default(), 2),
            Err(EngineError::DependentBookingNotAllowed)
        ));
    }

    #[test]
    fn test_dependent_booking_counts_trips() {
        let r = rule(2, true);

        // Four family seats on a fresh trip count as one booking.
        let usage = QuotaUsage { seats: 3, trips: 1, already_on_trip: false };
        assert!(r.check(&usage, 4).is_ok());

        // Adding seats to a trip the user is already on costs nothing.
        let on_trip = QuotaUsage { seats: 6, trips: 2, already_on_trip: true };
        assert!(r.check(&on_trip, 2).is_ok());

        let at_limit = QuotaUsage { seats: 6, trips: 2, already_on_trip: false };
        assert!(matches!(r.check(&at_limit, 1), Err(EngineError::QuotaExceeded { .. })));
    }

    #[test]
    fn test_zero_limit_blocks_role() {
        let r = rule(0, false);
        assert!(r.check(&QuotaUsage::default(), 1).is_err());
    }

    #[test]
    fn test_quota_week_starts_on_monday() {
        // 2026-10-22 is a Thursday.
        let at = Utc.with_ymd_and_hms(2026, 10, 22, 15, 30, 0).unwrap();
        let (start, end) = quota_week(at);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 10, 26, 0, 0, 0).unwrap());

        let monday = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        assert_eq!(quota_week(monday).0, monday);
    }
}
