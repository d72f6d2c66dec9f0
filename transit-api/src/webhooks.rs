use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use transit_core::payment::{PaymentMethod, PaymentNotification, TopupOutcome};
use transit_shared::models::events::{WalletToppedUpEvent, TOPIC_WALLET_TOPPED_UP};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Notification forwarded by the payment gateway adapter once it has
/// verified the gateway's own signature.
#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub user_id: Uuid,
    /// Major units, as the gateway reports them.
    pub amount: f64,
    pub reference_id: String,
    pub method: PaymentMethod,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentWebhookResponse {
    pub outcome: Option<TopupOutcome>,
}

/// POST /v1/webhooks/payments
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<PaymentWebhook>,
) -> Result<(StatusCode, Json<PaymentWebhookResponse>), AppError> {
    if let Some(expected) = &state.auth.webhook_secret {
        let provided = headers.get("x-webhook-secret").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(AppError::AuthenticationError("Invalid webhook secret".to_string()));
        }
    }

    tracing::info!(
        reference_id = %payload.reference_id,
        status = %payload.status,
        "Received payment webhook"
    );

    if payload.status != "SUCCEEDED" {
        return Ok((StatusCode::ACCEPTED, Json(PaymentWebhookResponse { outcome: None })));
    }

    let notification = PaymentNotification::from_gateway(
        payload.user_id,
        payload.amount,
        &payload.reference_id,
        payload.method,
    )
    .map_err(|e| state.reject(e))?;

    let outcome = state
        .wallets
        .apply_payment(&notification)
        .await
        .map_err(|e| state.reject(e))?;

    tracing::info!(
        user_id = %notification.user_id,
        reference_id = %notification.reference_id,
        balance = %outcome.balance(),
        replayed = matches!(outcome, TopupOutcome::AlreadyApplied { .. }),
        "payment webhook processed"
    );

    if let TopupOutcome::Applied { .. } = outcome {
        state.metrics.transfers_applied.inc();
        state.publish(
            TOPIC_WALLET_TOPPED_UP,
            notification.user_id.to_string(),
            WalletToppedUpEvent {
                user_id: notification.user_id,
                amount: notification.amount,
                reference_id: notification.reference_id.clone(),
                method: notification.method.as_str().to_string(),
                timestamp: Utc::now().timestamp(),
            },
        );
    }

    Ok((StatusCode::OK, Json(PaymentWebhookResponse { outcome: Some(outcome) })))
}
