use chrono::Utc;
use serde::Serialize;
use sqlx::{Pool, Postgres};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use transit_core::hold::{validate_batch, ConfirmItem, Hold, HoldRequest};
use transit_core::identity::Actor;
use transit_core::ledger::{purchase_reference, refund_reference, OwnerRef, TransactionType, Transfer};
use transit_core::quota::quota_week;
use transit_core::ticket::{generate_ticket_code, Ticket, TicketStatus};
use transit_core::trip::TripStatus;
use transit_core::{EngineError, EngineResult};
use transit_shared::Money;
use transit_store::app_config::BookingRules;
use transit_store::error::DbResultExt;
use transit_store::{
    HoldRepository, QuotaRepository, SeatInventory, SystemWalletRegistry, TicketRepository,
    TransactionExecutor, WalletLedger,
};
use uuid::Uuid;

use crate::deadline::with_deadline;

/// Result of a cancel request. A repeated cancel comes back with
/// `newly_cancelled == false` and nothing refunded.
#[derive(Debug, Clone, Serialize)]
pub struct Cancellation {
    pub ticket: Ticket,
    pub refunded: Money,
    pub newly_cancelled: bool,
}

/// One ticket out of a confirm batch. `newly_issued` is false when the hold
/// had already been confirmed by an earlier attempt of the same request.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub newly_issued: bool,
}

/// Drives holds, confirmations and cancellations. Each operation is one
/// store transaction spanning inventory, tickets and the ledger.
#[derive(Clone)]
pub struct BookingCoordinator {
    pool: Pool<Postgres>,
    system_wallets: Arc<SystemWalletRegistry>,
    rules: BookingRules,
}

impl BookingCoordinator {
    pub fn new(pool: Pool<Postgres>, system_wallets: Arc<SystemWalletRegistry>, rules: BookingRules) -> Self {
        Self { pool, system_wallets, rules }
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.rules.request_timeout_ms)
    }

    /// Claims `req.count` seats and records one hold per seat.
    pub async fn hold_seats(&self, req: HoldRequest) -> EngineResult<Vec<Hold>> {
        with_deadline(self.deadline(), "hold_seats", self.hold_seats_inner(req)).await
    }

    async fn hold_seats_inner(&self, req: HoldRequest) -> EngineResult<Vec<Hold>> {
        req.validate(self.rules.max_seats_per_request)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.db_context("begin hold")?;

        // Quota check and claim must not interleave with another request
        // from the same user.
        QuotaRepository::lock_user(&mut tx, req.user_id).await?;

        let trip = SeatInventory::get_trip(&mut *tx, req.trip_id).await?;
        trip.ensure_bookable(now)?;

        if let Some(rule) = QuotaRepository::rule_for(&mut *tx, req.role, trip.direction).await? {
            let usage = QuotaRepository::usage(
                &mut *tx,
                req.user_id,
                trip.direction,
                quota_week(trip.departure_time),
                trip.id,
                now,
            )
            .await?;
            rule.check(&usage, req.count)?;
        }

        let remaining = SeatInventory::claim_seats(&mut tx, trip.id, req.count).await?;
        let expires_at = HoldRequest::expiry_from(now, self.rules.hold_ttl_seconds);
        let holds = HoldRepository::insert_holds(&mut tx, &req, now, expires_at).await?;

        tx.commit().await.db_context("commit hold")?;

        info!(
            user_id = %req.user_id,
            trip_id = %trip.id,
            seats = req.count,
            remaining,
            %expires_at,
            "seats held"
        );
        Ok(holds)
    }

    /// Turns holds into tickets, charging the rider for paid trips. Either
    /// every item succeeds or nothing changes.
    pub async fn confirm_batch(&self, actor: Actor, items: Vec<ConfirmItem>) -> EngineResult<Vec<ConfirmedTicket>> {
        with_deadline(self.deadline(), "confirm_batch", self.confirm_batch_inner(actor, items)).await
    }

    async fn confirm_batch_inner(
        &self,
        actor: Actor,
        items: Vec<ConfirmItem>,
    ) -> EngineResult<Vec<ConfirmedTicket>> {
        validate_batch(&items)?;
        let now = Utc::now();
        let revenue = self.system_wallets.revenue().await?;

        let mut tx = self.pool.begin().await.db_context("begin confirm")?;

        let hold_ids: Vec<Uuid> = items.iter().map(|i| i.hold_id).collect();
        let mut locked: HashMap<Uuid, Hold> = HoldRepository::lock_holds(&mut tx, &hold_ids)
            .await?
            .into_iter()
            .map(|h| (h.id, h))
            .collect();

        // Trips are locked after holds and before any wallet, in id order.
        let trip_ids: Vec<Uuid> = locked
            .values()
            .map(|h| h.trip_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let trips = SeatInventory::lock_trips(&mut tx, &trip_ids).await?;

        let mut rider_wallet: Option<Uuid> = None;
        let mut tickets = Vec::with_capacity(items.len());

        for item in items {
            let Some(hold) = locked.remove(&item.hold_id) else {
                // Already confirmed by an earlier attempt of this request.
                match TicketRepository::find_by_hold(&mut *tx, item.hold_id).await? {
                    Some(prior) if prior.user_id == actor.user_id => {
                        tickets.push(ConfirmedTicket { ticket: prior, newly_issued: false });
                        continue;
                    }
                    Some(_) => return Err(EngineError::HoldNotOwned(item.hold_id)),
                    None => return Err(EngineError::HoldNotFound(item.hold_id)),
                }
            };

            hold.ensure_consumable(actor.user_id, now)?;

            let trip = trips
                .get(&hold.trip_id)
                .ok_or(EngineError::TripNotFound(hold.trip_id))?;
            if trip.status == TripStatus::Cancelled {
                return Err(EngineError::TripCancelled { trip_id: trip.id });
            }

            if !HoldRepository::delete_hold(&mut tx, hold.id).await? {
                return Err(EngineError::HoldNotFound(hold.id));
            }

            let serial_no = SeatInventory::allocate_serial(&mut tx, trip.id).await?;
            let draft = Ticket {
                id: Uuid::new_v4(),
                user_id: actor.user_id,
                trip_id: trip.id,
                hold_id: hold.id,
                pickup_stop_id: hold.pickup_stop_id,
                dropoff_stop_id: hold.dropoff_stop_id,
                passenger_name: item.passenger_name,
                passenger_relation: item.passenger_relation,
                serial_no,
                ticket_code: generate_ticket_code(serial_no),
                price_paid: trip.base_price,
                status: TicketStatus::Confirmed,
                created_at: now,
                cancelled_at: None,
            };
            let ticket = TicketRepository::insert(&mut tx, &draft).await?;

            if ticket.price_paid.is_positive() {
                let sender = match rider_wallet {
                    Some(id) => id,
                    None => {
                        let wallet =
                            WalletLedger::get_or_create_wallet(&mut *tx, OwnerRef::User(actor.user_id)).await?;
                        rider_wallet = Some(wallet.id);
                        wallet.id
                    }
                };
                TransactionExecutor::execute(
                    &mut tx,
                    &Transfer {
                        sender_wallet_id: sender,
                        receiver_wallet_id: revenue,
                        amount: ticket.price_paid,
                        transaction_type: TransactionType::TicketPurchase,
                        reference_id: purchase_reference(ticket.id),
                        description: Some(format!("Ticket {}", ticket.ticket_code)),
                    },
                )
                .await?;
            }

            tickets.push(ConfirmedTicket { ticket, newly_issued: true });
        }

        tx.commit().await.db_context("commit confirm")?;

        let issued = tickets.iter().filter(|t| t.newly_issued).count();
        info!(user_id = %actor.user_id, tickets = tickets.len(), issued, "holds confirmed");
        Ok(tickets)
    }

    /// Cancels a confirmed ticket, returns its seat and refunds what was paid.
    pub async fn cancel_ticket(&self, ticket_id: Uuid, actor: Actor) -> EngineResult<Cancellation> {
        with_deadline(self.deadline(), "cancel_ticket", self.cancel_ticket_inner(ticket_id, actor)).await
    }

    async fn cancel_ticket_inner(&self, ticket_id: Uuid, actor: Actor) -> EngineResult<Cancellation> {
        let now = Utc::now();
        let admin = actor.role.is_admin();
        let revenue = self.system_wallets.revenue().await?;

        let mut tx = self.pool.begin().await.db_context("begin cancel")?;

        let ticket = TicketRepository::lock(&mut tx, ticket_id).await?;
        if !admin && ticket.user_id != actor.user_id {
            return Err(EngineError::TicketNotOwned(ticket_id));
        }
        if ticket.status.is_terminal() {
            return Ok(Cancellation { ticket, refunded: Money::ZERO, newly_cancelled: false });
        }

        if !admin {
            let trip = SeatInventory::get_trip(&mut *tx, ticket.trip_id).await?;
            if trip.has_departed(now) {
                return Err(EngineError::CancellationWindowClosed { ticket_id });
            }
        }

        let status = if admin && ticket.user_id != actor.user_id {
            TicketStatus::Deleted
        } else {
            TicketStatus::Cancelled
        };

        let Some(closed) = TicketRepository::close(&mut tx, ticket_id, status, now).await? else {
            return Ok(Cancellation { ticket, refunded: Money::ZERO, newly_cancelled: false });
        };

        SeatInventory::release_seats(&mut tx, closed.trip_id, 1).await?;

        let mut refunded = Money::ZERO;
        if closed.price_paid.is_positive() {
            let rider = WalletLedger::get_or_create_wallet(&mut *tx, OwnerRef::User(closed.user_id)).await?;
            let refund = Transfer {
                sender_wallet_id: revenue,
                receiver_wallet_id: rider.id,
                amount: closed.price_paid,
                transaction_type: TransactionType::Refund,
                reference_id: refund_reference(closed.id),
                description: Some(format!("Refund for ticket {}", closed.ticket_code)),
            };
            match TransactionExecutor::execute(&mut tx, &refund).await {
                Ok(_) => refunded = closed.price_paid,
                Err(EngineError::DuplicateIdempotencyKey { reference_id }) => {
                    warn!(%ticket_id, %reference_id, "refund already recorded");
                }
                Err(e) => return Err(e),
            }
        }

        tx.commit().await.db_context("commit cancel")?;

        info!(%ticket_id, status = status.as_str(), %refunded, by = %actor.user_id, "ticket cancelled");
        Ok(Cancellation { ticket: closed, refunded, newly_cancelled: true })
    }

    pub async fn tickets_for(&self, user_id: Uuid) -> EngineResult<Vec<Ticket>> {
        let mut conn = self.pool.acquire().await.db_context("acquire connection")?;
        TicketRepository::list_for_user(&mut conn, user_id).await
    }
}
