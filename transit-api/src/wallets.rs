use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use transit_core::identity::Actor;
use transit_core::ledger::LedgerEntry;
use transit_shared::Money;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub wallet_id: Uuid,
    pub balance: Money,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    pub limit: Option<i64>,
}

/// GET /v1/wallet
pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state
        .wallets
        .wallet_for_user(actor.user_id)
        .await
        .map_err(|e| state.reject(e))?;
    let balance = state
        .wallets
        .get_balance(wallet.id)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(WalletResponse {
        wallet_id: wallet.id,
        balance,
        is_active: wallet.is_active,
    }))
}

/// GET /v1/wallet/entries?limit=50
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let wallet = state
        .wallets
        .wallet_for_user(actor.user_id)
        .await
        .map_err(|e| state.reject(e))?;
    let entries = state
        .wallets
        .list_entries(wallet.id, query.limit.unwrap_or(50))
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(entries))
}
