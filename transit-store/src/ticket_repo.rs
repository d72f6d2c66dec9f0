use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use transit_core::ticket::{Ticket, TicketStatus};
use transit_core::{EngineError, EngineResult};
use transit_shared::{Masked, Money};
use uuid::Uuid;

use crate::error::{is_unique_violation, map_db_error, DbResultExt};

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    user_id: Uuid,
    trip_id: Uuid,
    hold_id: Uuid,
    pickup_stop_id: Uuid,
    dropoff_stop_id: Uuid,
    passenger_name: String,
    passenger_relation: String,
    serial_no: i32,
    ticket_code: String,
    price_paid: i64,
    status: String,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = EngineError;

    fn try_from(r: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: r.id,
            user_id: r.user_id,
            trip_id: r.trip_id,
            hold_id: r.hold_id,
            pickup_stop_id: r.pickup_stop_id,
            dropoff_stop_id: r.dropoff_stop_id,
            passenger_name: Masked::new(r.passenger_name),
            passenger_relation: r.passenger_relation.parse()?,
            serial_no: r.serial_no,
            ticket_code: r.ticket_code,
            price_paid: Money::from_minor(r.price_paid),
            status: r.status.parse()?,
            created_at: r.created_at,
            cancelled_at: r.cancelled_at,
        })
    }
}

const TICKET_COLUMNS: &str = "id, user_id, trip_id, hold_id, pickup_stop_id, dropoff_stop_id, \
    passenger_name, passenger_relation, serial_no, ticket_code, price_paid, status, created_at, cancelled_at";

pub struct TicketRepository;

impl TicketRepository {
    /// Persists a freshly confirmed ticket. A second ticket for the same hold
    /// is refused by the store.
    pub async fn insert(tx: &mut Transaction<'_, Postgres>, ticket: &Ticket) -> EngineResult<Ticket> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "INSERT INTO tickets (id, user_id, trip_id, hold_id, pickup_stop_id, dropoff_stop_id,
                passenger_name, passenger_relation, serial_no, ticket_code, price_paid, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {}",
            TICKET_COLUMNS
        ))
        .bind(ticket.id)
        .bind(ticket.user_id)
        .bind(ticket.trip_id)
        .bind(ticket.hold_id)
        .bind(ticket.pickup_stop_id)
        .bind(ticket.dropoff_stop_id)
        .bind(ticket.passenger_name.expose())
        .bind(ticket.passenger_relation.as_str())
        .bind(ticket.serial_no)
        .bind(&ticket.ticket_code)
        .bind(ticket.price_paid.minor())
        .bind(ticket.status.as_str())
        .bind(ticket.created_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                EngineError::DuplicateIdempotencyKey { reference_id: format!("hold-{}", ticket.hold_id) }
            } else {
                map_db_error("insert ticket", e)
            }
        })?;

        row.try_into()
    }

    /// The ticket a hold was turned into, if it was confirmed.
    pub async fn find_by_hold(conn: &mut PgConnection, hold_id: Uuid) -> EngineResult<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>(&format!("SELECT {} FROM tickets WHERE hold_id = $1", TICKET_COLUMNS))
            .bind(hold_id)
            .fetch_optional(&mut *conn)
            .await
            .db_context("fetch ticket by hold")?
            .map(Ticket::try_from)
            .transpose()
    }

    pub async fn lock(tx: &mut Transaction<'_, Postgres>, ticket_id: Uuid) -> EngineResult<Ticket> {
        sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets WHERE id = $1 FOR UPDATE",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_optional(&mut **tx)
        .await
        .db_context("lock ticket")?
        .ok_or(EngineError::TicketNotFound(ticket_id))?
        .try_into()
    }

    /// Moves a CONFIRMED ticket to `status`. Returns `None` when the ticket
    /// had already left CONFIRMED.
    pub async fn close(
        tx: &mut Transaction<'_, Postgres>,
        ticket_id: Uuid,
        status: TicketStatus,
        at: DateTime<Utc>,
    ) -> EngineResult<Option<Ticket>> {
        sqlx::query_as::<_, TicketRow>(&format!(
            "UPDATE tickets SET status = $2, cancelled_at = $3
             WHERE id = $1 AND status = 'CONFIRMED'
             RETURNING {}",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(&mut **tx)
        .await
        .db_context("close ticket")?
        .map(Ticket::try_from)
        .transpose()
    }

    pub async fn list_for_user(conn: &mut PgConnection, user_id: Uuid) -> EngineResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets WHERE user_id = $1 ORDER BY created_at DESC",
            TICKET_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .db_context("list tickets")?;

        rows.into_iter().map(Ticket::try_from).collect()
    }
}
