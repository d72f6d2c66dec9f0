use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::AppError;
use crate::state::AppState;

/// Engine counters, exported at `/metrics`.
pub struct EngineMetrics {
    pub holds_created: IntCounter,
    pub holds_reclaimed: IntCounter,
    pub tickets_confirmed: IntCounter,
    pub tickets_cancelled: IntCounter,
    pub transfers_applied: IntCounter,
    pub engine_errors: IntCounterVec,
    registry: Registry,
}

impl EngineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let holds_created = IntCounter::new("transit_holds_created_total", "Seat holds created")?;
        let holds_reclaimed =
            IntCounter::new("transit_holds_reclaimed_total", "Expired holds reclaimed by cleanup")?;
        let tickets_confirmed = IntCounter::new("transit_tickets_confirmed_total", "Tickets confirmed")?;
        let tickets_cancelled =
            IntCounter::new("transit_tickets_cancelled_total", "Tickets cancelled or removed")?;
        let transfers_applied =
            IntCounter::new("transit_transfers_applied_total", "Ledger transfers committed via the API")?;
        let engine_errors = IntCounterVec::new(
            Opts::new("transit_engine_errors_total", "Engine errors by code"),
            &["code"],
        )?;

        registry.register(Box::new(holds_created.clone()))?;
        registry.register(Box::new(holds_reclaimed.clone()))?;
        registry.register(Box::new(tickets_confirmed.clone()))?;
        registry.register(Box::new(tickets_cancelled.clone()))?;
        registry.register(Box::new(transfers_applied.clone()))?;
        registry.register(Box::new(engine_errors.clone()))?;

        Ok(Self {
            holds_created,
            holds_reclaimed,
            tickets_confirmed,
            tickets_cancelled,
            transfers_applied,
            engine_errors,
            registry,
        })
    }

    pub fn record_error(&self, code: &str) {
        self.engine_errors.with_label_values(&[code]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.render()?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
