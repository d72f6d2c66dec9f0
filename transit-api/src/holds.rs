use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transit_core::hold::{ConfirmItem, Hold, HoldRequest};
use transit_core::identity::Actor;
use transit_booking::ConfirmedTicket;
use transit_shared::models::events::{TicketConfirmedEvent, TOPIC_TICKET_CONFIRMED};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub trip_id: Uuid,
    pub pickup_stop_id: Uuid,
    pub dropoff_stop_id: Uuid,
    #[serde(default = "default_count")]
    pub count: i32,
}

fn default_count() -> i32 { 1 }

#[derive(Debug, Serialize)]
pub struct CreateHoldResponse {
    pub trip_id: Uuid,
    pub hold_ids: Vec<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateHoldResponse {
    fn from_holds(trip_id: Uuid, holds: &[Hold]) -> Self {
        Self {
            trip_id,
            hold_ids: holds.iter().map(|h| h.id).collect(),
            expires_at: holds.iter().map(|h| h.expires_at).min(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConfirmHoldsRequest {
    pub items: Vec<ConfirmItem>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmHoldsResponse {
    pub tickets: Vec<ConfirmedTicket>,
}

/// POST /v1/holds
pub async fn create_holds(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateHoldRequest>,
) -> Result<(StatusCode, Json<CreateHoldResponse>), AppError> {
    let request = HoldRequest {
        user_id: actor.user_id,
        role: actor.role,
        trip_id: payload.trip_id,
        pickup_stop_id: payload.pickup_stop_id,
        dropoff_stop_id: payload.dropoff_stop_id,
        count: payload.count,
    };

    let holds = state
        .booking
        .hold_seats(request)
        .await
        .map_err(|e| state.reject(e))?;

    state.metrics.holds_created.inc_by(holds.len() as u64);
    Ok((StatusCode::CREATED, Json(CreateHoldResponse::from_holds(payload.trip_id, &holds))))
}

/// POST /v1/holds/confirm
pub async fn confirm_holds(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ConfirmHoldsRequest>,
) -> Result<Json<ConfirmHoldsResponse>, AppError> {
    let tickets = state
        .booking
        .confirm_batch(actor, payload.items)
        .await
        .map_err(|e| state.reject(e))?;

    record_confirmed(&state, &tickets);
    Ok(Json(ConfirmHoldsResponse { tickets }))
}

/// Counts and announces tickets issued by this request. Tickets handed back
/// from an earlier attempt were already announced then.
fn record_confirmed(state: &AppState, tickets: &[ConfirmedTicket]) {
    let now = Utc::now().timestamp();
    for ticket in tickets.iter().filter(|t| t.newly_issued).map(|t| &t.ticket) {
        state.metrics.tickets_confirmed.inc();
        if ticket.price_paid.is_positive() {
            state.metrics.transfers_applied.inc();
        }
        state.publish(
            TOPIC_TICKET_CONFIRMED,
            ticket.id.to_string(),
            TicketConfirmedEvent {
                ticket_id: ticket.id,
                trip_id: ticket.trip_id,
                user_id: ticket.user_id,
                ticket_code: ticket.ticket_code.clone(),
                price_paid: ticket.price_paid,
                timestamp: now,
            },
        );
    }
}

#[cfg(test)]
#[path = "holds_tests.rs"]
mod holds_tests;
