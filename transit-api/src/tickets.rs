use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use transit_booking::Cancellation;
use transit_core::identity::Actor;
use transit_core::ticket::{Ticket, TicketStatus};
use transit_shared::models::events::{TicketCancelledEvent, TOPIC_TICKET_CANCELLED};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// GET /v1/tickets
pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let tickets = state
        .booking
        .tickets_for(actor.user_id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(tickets))
}

/// POST /v1/tickets/{id}/cancel
pub async fn cancel_ticket(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Cancellation>, AppError> {
    let cancellation = state
        .booking
        .cancel_ticket(ticket_id, actor)
        .await
        .map_err(|e| state.reject(e))?;

    if cancellation.newly_cancelled {
        state.metrics.tickets_cancelled.inc();
        if cancellation.refunded.is_positive() {
            state.metrics.transfers_applied.inc();
        }
        let ticket = &cancellation.ticket;
        state.publish(
            TOPIC_TICKET_CANCELLED,
            ticket.id.to_string(),
            TicketCancelledEvent {
                ticket_id: ticket.id,
                trip_id: ticket.trip_id,
                user_id: ticket.user_id,
                refunded: cancellation.refunded,
                removed_by_admin: ticket.status == TicketStatus::Deleted,
                timestamp: Utc::now().timestamp(),
            },
        );
    }

    Ok(Json(cancellation))
}
