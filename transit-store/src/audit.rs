use serde::Serialize;
use sqlx::PgConnection;
use tracing::error;
use transit_core::{EngineError, EngineResult};
use uuid::Uuid;

use crate::error::DbResultExt;

/// Seat accounting for one trip.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct InventoryAudit {
    pub trip_id: Uuid,
    pub total_capacity: i32,
    pub available_seats: i32,
    pub held: i64,
    pub confirmed: i64,
}

impl InventoryAudit {
    pub fn accounted(&self) -> i64 {
        self.available_seats as i64 + self.held + self.confirmed
    }

    pub fn is_balanced(&self) -> bool {
        self.accounted() == self.total_capacity as i64
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UnbalancedReference {
    pub transaction_type: String,
    pub reference_id: String,
    pub net: i64,
    pub entries: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerAudit {
    pub references_checked: i64,
}

/// Read-only invariant checks. Any mismatch is reported and logged; nothing
/// is corrected.
pub struct InvariantAuditor;

impl InvariantAuditor {
    /// `available + holds + confirmed == capacity`. Expired holds still count
    /// until a sweep reclaims their seats.
    pub async fn audit_trip(conn: &mut PgConnection, trip_id: Uuid) -> EngineResult<InventoryAudit> {
        let audit = sqlx::query_as::<_, InventoryAudit>(
            "SELECT tr.id AS trip_id, tr.total_capacity, tr.available_seats,
                    (SELECT COUNT(*) FROM holds h WHERE h.trip_id = tr.id)::BIGINT AS held,
                    (SELECT COUNT(*) FROM tickets t
                      WHERE t.trip_id = tr.id AND t.status = 'CONFIRMED')::BIGINT AS confirmed
               FROM trips tr WHERE tr.id = $1",
        )
        .bind(trip_id)
        .fetch_optional(&mut *conn)
        .await
        .db_context("audit trip")?
        .ok_or(EngineError::TripNotFound(trip_id))?;

        if !audit.is_balanced() {
            error!(
                %trip_id,
                capacity = audit.total_capacity,
                available = audit.available_seats,
                held = audit.held,
                confirmed = audit.confirmed,
                "trip inventory does not add up"
            );
            return Err(EngineError::ConsistencyViolation(format!(
                "trip {}: {} seats accounted for, capacity {}",
                trip_id,
                audit.accounted(),
                audit.total_capacity
            )));
        }
        Ok(audit)
    }

    /// Every transfer reference must net to zero, with one credit per debit.
    /// A reference is unique per wallet, so several disjoint transfers may
    /// share it; each still contributes a balanced pair.
    pub async fn audit_ledger(conn: &mut PgConnection) -> EngineResult<LedgerAudit> {
        let unbalanced = sqlx::query_as::<_, UnbalancedReference>(
            "SELECT transaction_type, reference_id,
                    SUM(amount)::BIGINT AS net, COUNT(*)::BIGINT AS entries
               FROM ledger_entries
              GROUP BY transaction_type, reference_id
             HAVING SUM(amount) <> 0
                 OR COUNT(*) FILTER (WHERE amount < 0) <> COUNT(*) FILTER (WHERE amount > 0)
              LIMIT 20",
        )
        .fetch_all(&mut *conn)
        .await
        .db_context("audit ledger")?;

        if let Some(first) = unbalanced.first() {
            error!(
                count = unbalanced.len(),
                transaction_type = %first.transaction_type,
                reference_id = %first.reference_id,
                net = first.net,
                "ledger references do not balance"
            );
            return Err(EngineError::ConsistencyViolation(format!(
                "{} unbalanced ledger reference(s), first {}:{} nets {}",
                unbalanced.len(),
                first.transaction_type,
                first.reference_id,
                first.net
            )));
        }

        let references_checked: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM (SELECT 1 FROM ledger_entries GROUP BY transaction_type, reference_id) r",
        )
        .fetch_one(&mut *conn)
        .await
        .db_context("count ledger references")?;

        Ok(LedgerAudit { references_checked })
    }
}
