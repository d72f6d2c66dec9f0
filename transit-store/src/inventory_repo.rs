use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use std::collections::HashMap;
use tracing::error;
use transit_core::trip::Trip;
use transit_core::{EngineError, EngineResult};
use transit_shared::Money;
use uuid::Uuid;

use crate::error::DbResultExt;

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    route_id: Uuid,
    direction: String,
    departure_time: DateTime<Utc>,
    booking_opens_at: DateTime<Utc>,
    booking_closes_at: DateTime<Utc>,
    total_capacity: i32,
    available_seats: i32,
    base_price: i64,
    status: String,
}

impl TryFrom<TripRow> for Trip {
    type Error = EngineError;

    fn try_from(r: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: r.id,
            route_id: r.route_id,
            direction: r.direction.parse()?,
            departure_time: r.departure_time,
            booking_opens_at: r.booking_opens_at,
            booking_closes_at: r.booking_closes_at,
            total_capacity: r.total_capacity,
            available_seats: r.available_seats,
            base_price: Money::from_minor(r.base_price),
            status: r.status.parse()?,
        })
    }
}

const TRIP_COLUMNS: &str = "id, route_id, direction, departure_time, booking_opens_at, \
    booking_closes_at, total_capacity, available_seats, base_price, status";

/// Seat counters on `trips`. Every change is a single conditional UPDATE so
/// the check and the write cannot be separated by another writer.
pub struct SeatInventory;

impl SeatInventory {
    pub async fn get_trip(conn: &mut PgConnection, trip_id: Uuid) -> EngineResult<Trip> {
        sqlx::query_as::<_, TripRow>(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
            .bind(trip_id)
            .fetch_optional(&mut *conn)
            .await
            .db_context("fetch trip")?
            .ok_or(EngineError::TripNotFound(trip_id))?
            .try_into()
    }

    /// Row-locks every trip in `trip_ids`, always in id order, so two batches
    /// touching the same trips queue up instead of deadlocking.
    pub async fn lock_trips(
        tx: &mut Transaction<'_, Postgres>,
        trip_ids: &[Uuid],
    ) -> EngineResult<HashMap<Uuid, Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(&format!(
            "SELECT {} FROM trips WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            TRIP_COLUMNS
        ))
        .bind(trip_ids)
        .fetch_all(&mut **tx)
        .await
        .db_context("lock trips")?;

        let mut trips = HashMap::with_capacity(rows.len());
        for row in rows {
            let trip = Trip::try_from(row)?;
            trips.insert(trip.id, trip);
        }
        if let Some(missing) = trip_ids.iter().find(|id| !trips.contains_key(*id)) {
            return Err(EngineError::TripNotFound(*missing));
        }
        Ok(trips)
    }

    async fn trip_exists(conn: &mut PgConnection, trip_id: Uuid) -> EngineResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM trips WHERE id = $1)")
            .bind(trip_id)
            .fetch_one(&mut *conn)
            .await
            .db_context("check trip")
    }

    /// Takes `count` seats, returning what is left. Nothing changes when the
    /// trip has fewer than `count` seats.
    pub async fn claim_seats(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: Uuid,
        count: i32,
    ) -> EngineResult<i32> {
        if count < 1 {
            return Err(EngineError::InvalidSeatCount { requested: count, max: i32::MAX });
        }

        let remaining: Option<i32> = sqlx::query_scalar(
            "UPDATE trips SET available_seats = available_seats - $2, updated_at = NOW()
             WHERE id = $1 AND available_seats >= $2
             RETURNING available_seats",
        )
        .bind(trip_id)
        .bind(count)
        .fetch_optional(&mut **tx)
        .await
        .db_context("claim seats")?;

        if let Some(left) = remaining {
            return Ok(left);
        }
        if !Self::trip_exists(&mut **tx, trip_id).await? {
            return Err(EngineError::TripNotFound(trip_id));
        }
        Err(EngineError::NoSeatsAvailable { trip_id, requested: count })
    }

    /// Returns `count` seats. Going above capacity means seats were
    /// double-released somewhere; that is reported, never clamped.
    pub async fn release_seats(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: Uuid,
        count: i32,
    ) -> EngineResult<i32> {
        if count < 1 {
            return Err(EngineError::InvalidSeatCount { requested: count, max: i32::MAX });
        }

        let available: Option<i32> = sqlx::query_scalar(
            "UPDATE trips SET available_seats = available_seats + $2, updated_at = NOW()
             WHERE id = $1 AND available_seats + $2 <= total_capacity
             RETURNING available_seats",
        )
        .bind(trip_id)
        .bind(count)
        .fetch_optional(&mut **tx)
        .await
        .db_context("release seats")?;

        if let Some(now_available) = available {
            return Ok(now_available);
        }
        if !Self::trip_exists(&mut **tx, trip_id).await? {
            return Err(EngineError::TripNotFound(trip_id));
        }
        error!(%trip_id, count, "seat release would exceed trip capacity");
        Err(EngineError::ConsistencyViolation(format!(
            "releasing {} seats on trip {} would exceed capacity",
            count, trip_id
        )))
    }

    /// Next per-trip ticket serial. Holds the trip row lock until commit.
    pub async fn allocate_serial(tx: &mut Transaction<'_, Postgres>, trip_id: Uuid) -> EngineResult<i32> {
        sqlx::query_scalar(
            "UPDATE trips SET next_serial = next_serial + 1 WHERE id = $1 RETURNING next_serial",
        )
        .bind(trip_id)
        .fetch_optional(&mut **tx)
        .await
        .db_context("allocate ticket serial")?
        .ok_or(EngineError::TripNotFound(trip_id))
    }
}
