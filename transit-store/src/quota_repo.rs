use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use transit_core::identity::Role;
use transit_core::quota::{QuotaRule, QuotaUsage};
use transit_core::trip::Direction;
use transit_core::EngineResult;
use uuid::Uuid;

use crate::error::DbResultExt;

#[derive(sqlx::FromRow)]
struct RuleRow {
    weekly_limit: i32,
    allow_dependent_booking: bool,
}

#[derive(sqlx::FromRow)]
struct UsageRow {
    seats: i64,
    trips: i64,
    already_on_trip: bool,
}

pub struct QuotaRepository;

impl QuotaRepository {
    pub async fn rule_for(
        conn: &mut PgConnection,
        role: Role,
        direction: Direction,
    ) -> EngineResult<Option<QuotaRule>> {
        let row = sqlx::query_as::<_, RuleRow>(
            "SELECT weekly_limit, allow_dependent_booking FROM quota_rules
             WHERE user_role = $1 AND direction = $2",
        )
        .bind(role.as_str())
        .bind(direction.as_str())
        .fetch_optional(&mut *conn)
        .await
        .db_context("fetch quota rule")?;

        Ok(row.map(|r| QuotaRule {
            user_role: role,
            direction,
            weekly_limit: r.weekly_limit,
            allow_dependent_booking: r.allow_dependent_booking,
        }))
    }

    pub async fn upsert_rule(conn: &mut PgConnection, rule: &QuotaRule) -> EngineResult<()> {
        sqlx::query(
            "INSERT INTO quota_rules (user_role, direction, weekly_limit, allow_dependent_booking)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_role, direction)
             DO UPDATE SET weekly_limit = EXCLUDED.weekly_limit,
                           allow_dependent_booking = EXCLUDED.allow_dependent_booking",
        )
        .bind(rule.user_role.as_str())
        .bind(rule.direction.as_str())
        .bind(rule.weekly_limit)
        .bind(rule.allow_dependent_booking)
        .execute(&mut *conn)
        .await
        .db_context("upsert quota rule")?;
        Ok(())
    }

    /// Serializes concurrent bookings by one user until `tx` ends.
    pub async fn lock_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> EngineResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(user_id.to_string())
            .execute(&mut **tx)
            .await
            .db_context("lock user quota")?;
        Ok(())
    }

    /// Confirmed tickets plus live holds for `user_id` on trips in
    /// `direction` departing within `[week_start, week_end)`.
    pub async fn usage(
        conn: &mut PgConnection,
        user_id: Uuid,
        direction: Direction,
        week: (DateTime<Utc>, DateTime<Utc>),
        trip_id: Uuid,
        now: DateTime<Utc>,
    ) -> EngineResult<QuotaUsage> {
        let row = sqlx::query_as::<_, UsageRow>(
            "WITH seats AS (
                SELECT t.trip_id FROM tickets t JOIN trips tr ON tr.id = t.trip_id
                 WHERE t.user_id = $1 AND t.status = 'CONFIRMED'
                   AND tr.direction = $2 AND tr.departure_time >= $3 AND tr.departure_time < $4
                UNION ALL
                SELECT h.trip_id FROM holds h JOIN trips tr ON tr.id = h.trip_id
                 WHERE h.user_id = $1 AND h.expires_at > $6
                   AND tr.direction = $2 AND tr.departure_time >= $3 AND tr.departure_time < $4
             )
             SELECT COUNT(*)::BIGINT AS seats,
                    COUNT(DISTINCT trip_id)::BIGINT AS trips,
                    COALESCE(BOOL_OR(trip_id = $5), FALSE) AS already_on_trip
               FROM seats",
        )
        .bind(user_id)
        .bind(direction.as_str())
        .bind(week.0)
        .bind(week.1)
        .bind(trip_id)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .db_context("count quota usage")?;

        Ok(QuotaUsage {
            seats: row.seats,
            trips: row.trips,
            already_on_trip: row.already_on_trip,
        })
    }
}
