use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use transit_booking::{BookingCoordinator, WalletService};
use transit_core::EngineError;
use transit_store::{DbClient, EventProducer};

use crate::error::AppError;
use crate::metrics::EngineMetrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub webhook_secret: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbClient>,
    pub booking: BookingCoordinator,
    pub wallets: WalletService,
    pub kafka: Option<Arc<EventProducer>>,
    pub metrics: Arc<EngineMetrics>,
    pub auth: AuthConfig,
}

impl AppState {
    /// Counts the failure and wraps it for the response.
    pub fn reject(&self, e: EngineError) -> AppError {
        self.metrics.record_error(e.code());
        AppError::Engine(e)
    }

    /// Fire-and-forget publish after a commit.
    pub fn publish<T>(&self, topic: &'static str, key: String, event: T)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let Some(kafka) = self.kafka.clone() else {
            warn!(topic, "no event producer configured, dropping event");
            return;
        };
        tokio::spawn(async move {
            kafka.emit(topic, &key, &event).await;
        });
    }
}
