use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use std::collections::BTreeMap;
use tracing::{debug, info};
use transit_core::hold::{Hold, HoldRequest};
use transit_core::repository::{ExpiredHoldSweeper, SweepReport};
use transit_core::EngineResult;
use uuid::Uuid;

use crate::error::DbResultExt;
use crate::inventory_repo::SeatInventory;

#[derive(sqlx::FromRow)]
struct HoldRow {
    id: Uuid,
    trip_id: Uuid,
    pickup_stop_id: Uuid,
    dropoff_stop_id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<HoldRow> for Hold {
    fn from(r: HoldRow) -> Self {
        Hold {
            id: r.id,
            trip_id: r.trip_id,
            pickup_stop_id: r.pickup_stop_id,
            dropoff_stop_id: r.dropoff_stop_id,
            user_id: r.user_id,
            expires_at: r.expires_at,
            created_at: r.created_at,
        }
    }
}

const HOLD_COLUMNS: &str =
    "id, trip_id, pickup_stop_id, dropoff_stop_id, user_id, expires_at, created_at";

pub struct HoldRepository;

impl HoldRepository {
    /// One row per seat, all sharing the same expiry.
    pub async fn insert_holds(
        tx: &mut Transaction<'_, Postgres>,
        req: &HoldRequest,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> EngineResult<Vec<Hold>> {
        let mut holds = Vec::with_capacity(req.count.max(0) as usize);
        for _ in 0..req.count {
            let row = sqlx::query_as::<_, HoldRow>(&format!(
                "INSERT INTO holds (id, trip_id, pickup_stop_id, dropoff_stop_id, user_id, expires_at, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING {}",
                HOLD_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(req.trip_id)
            .bind(req.pickup_stop_id)
            .bind(req.dropoff_stop_id)
            .bind(req.user_id)
            .bind(expires_at)
            .bind(now)
            .fetch_one(&mut **tx)
            .await
            .db_context("insert hold")?;
            holds.push(row.into());
        }
        Ok(holds)
    }

    /// Locks the given holds in id order. Missing ids are simply absent from
    /// the result, including holds a concurrent sweep has just removed.
    pub async fn lock_holds(
        tx: &mut Transaction<'_, Postgres>,
        hold_ids: &[Uuid],
    ) -> EngineResult<Vec<Hold>> {
        let rows = sqlx::query_as::<_, HoldRow>(&format!(
            "SELECT {} FROM holds WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            HOLD_COLUMNS
        ))
        .bind(hold_ids)
        .fetch_all(&mut **tx)
        .await
        .db_context("lock holds")?;

        Ok(rows.into_iter().map(Hold::from).collect())
    }

    pub async fn delete_hold(tx: &mut Transaction<'_, Postgres>, hold_id: Uuid) -> EngineResult<bool> {
        let result = sqlx::query("DELETE FROM holds WHERE id = $1")
            .bind(hold_id)
            .execute(&mut **tx)
            .await
            .db_context("delete hold")?;
        Ok(result.rows_affected() == 1)
    }
}

/// Postgres-backed sweep of expired holds.
#[derive(Clone)]
pub struct PgHoldSweeper {
    pool: Pool<Postgres>,
    batch_size: i64,
}

impl PgHoldSweeper {
    pub fn new(pool: Pool<Postgres>, batch_size: i64) -> Self {
        Self { pool, batch_size: batch_size.max(1) }
    }
}

#[derive(sqlx::FromRow)]
struct ExpiredHold {
    id: Uuid,
    trip_id: Uuid,
}

#[async_trait]
impl ExpiredHoldSweeper for PgHoldSweeper {
    async fn sweep_expired(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let mut tx = self.pool.begin().await.db_context("begin sweep")?;

        // Holds locked by an in-flight confirm are skipped; the next pass sees
        // them again if the confirm rolls back.
        let expired = sqlx::query_as::<_, ExpiredHold>(
            "SELECT id, trip_id FROM holds
             WHERE expires_at < $1
             ORDER BY expires_at
             LIMIT $2
             FOR UPDATE SKIP LOCKED",
        )
        .bind(now)
        .bind(self.batch_size)
        .fetch_all(&mut *tx)
        .await
        .db_context("select expired holds")?;

        if expired.is_empty() {
            return Ok(SweepReport::default());
        }

        let mut per_trip: BTreeMap<Uuid, Vec<Uuid>> = BTreeMap::new();
        for hold in &expired {
            per_trip.entry(hold.trip_id).or_default().push(hold.id);
        }

        for (trip_id, hold_ids) in &per_trip {
            SeatInventory::release_seats(&mut tx, *trip_id, hold_ids.len() as i32).await?;
            sqlx::query("DELETE FROM holds WHERE id = ANY($1)")
                .bind(hold_ids.as_slice())
                .execute(&mut *tx)
                .await
                .db_context("delete expired holds")?;
            debug!(%trip_id, reclaimed = hold_ids.len(), "reclaimed expired holds");
        }

        tx.commit().await.db_context("commit sweep")?;

        let report = SweepReport {
            holds_reclaimed: expired.len(),
            trips_touched: per_trip.len(),
        };
        info!(holds = report.holds_reclaimed, trips = report.trips_touched, "expired holds swept");
        Ok(report)
    }
}
