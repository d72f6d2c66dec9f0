use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use transit_core::identity::Actor;
use transit_core::ledger::TransactionType;
use transit_core::EngineError;
use transit_shared::Money;
use transit_store::audit::{InventoryAudit, LedgerAudit};
use transit_store::error::DbResultExt;
use transit_store::InvariantAuditor;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    /// Decimal string in major units, e.g. "12.50".
    pub amount: String,
    pub reference_id: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreditResponse {
    pub user_id: Uuid,
    pub balance: Money,
}

/// GET /v1/admin/trips/{id}/audit
pub async fn audit_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<InventoryAudit>, AppError> {
    let mut conn = state
        .db
        .pool
        .acquire()
        .await
        .db_context("acquire connection")
        .map_err(|e| state.reject(e))?;
    let audit = InvariantAuditor::audit_trip(&mut conn, trip_id)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(audit))
}

/// GET /v1/admin/ledger/audit
pub async fn audit_ledger(State(state): State<AppState>) -> Result<Json<LedgerAudit>, AppError> {
    let mut conn = state
        .db
        .pool
        .acquire()
        .await
        .db_context("acquire connection")
        .map_err(|e| state.reject(e))?;
    let audit = InvariantAuditor::audit_ledger(&mut conn)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(audit))
}

/// POST /v1/admin/wallets/{user_id}/credit
pub async fn credit_wallet(
    State(state): State<AppState>,
    Extension(admin): Extension<Actor>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<CreditRequest>,
) -> Result<Json<CreditResponse>, AppError> {
    let amount: Money = payload
        .amount
        .parse()
        .map_err(|e: transit_shared::MoneyError| state.reject(EngineError::InvalidAmount(e.to_string())))?;

    let description = payload
        .description
        .unwrap_or_else(|| format!("Adjustment by {}", admin.user_id));

    let balance = state
        .wallets
        .credit_wallet(
            user_id,
            amount,
            TransactionType::Adjustment,
            &payload.reference_id,
            Some(description),
        )
        .await
        .map_err(|e| state.reject(e))?;

    state.metrics.transfers_applied.inc();
    tracing::info!(%user_id, %amount, by = %admin.user_id, "Admin credited wallet");

    Ok(Json(CreditResponse { user_id, balance }))
}
