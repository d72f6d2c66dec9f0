use axum::{
    http::Method,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod error;
pub mod holds;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod tickets;
pub mod wallets;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let rider = Router::new()
        .route("/v1/holds", post(holds::create_holds))
        .route("/v1/holds/confirm", post(holds::confirm_holds))
        .route("/v1/tickets", get(tickets::list_tickets))
        .route("/v1/tickets/{id}/cancel", post(tickets::cancel_ticket))
        .route("/v1/wallet", get(wallets::get_wallet))
        .route("/v1/wallet/entries", get(wallets::list_entries))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    // Layers run outside-in: authenticate first, then check the role.
    let admin = Router::new()
        .route("/v1/admin/trips/{id}/audit", get(admin::audit_trip))
        .route("/v1/admin/ledger/audit", get(admin::audit_ledger))
        .route("/v1/admin/wallets/{user_id}/credit", post(admin::credit_wallet))
        .route_layer(from_fn(middleware::admin_middleware))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/v1/webhooks/payments", post(webhooks::handle_payment_webhook))
        .merge(rider)
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
