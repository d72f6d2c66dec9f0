use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use transit_api::{
    app,
    metrics::EngineMetrics,
    state::{AppState, AuthConfig},
};
use transit_booking::{BookingCoordinator, CleanupScheduler, WalletService};
use transit_store::{DbClient, EventProducer, PgHoldSweeper, SystemWalletRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "transit_api=debug,transit_booking=debug,transit_store=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = transit_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting transit API on port {}", config.server.port);

    // Database
    let db = DbClient::new(&config.database)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");
    let rules = db
        .fetch_booking_rules(config.booking.clone())
        .await
        .expect("Failed to load business rules");
    tracing::info!(
        hold_ttl_seconds = rules.hold_ttl_seconds,
        max_seats = rules.max_seats_per_request,
        timeout_ms = rules.request_timeout_ms,
        "Booking rules loaded"
    );
    let db = Arc::new(db);

    // Kafka is optional at runtime; bookings do not depend on it.
    let kafka = match EventProducer::new(&config.kafka.brokers) {
        Ok(producer) => Some(Arc::new(producer)),
        Err(e) => {
            tracing::warn!("Kafka producer unavailable, events disabled: {}", e);
            None
        }
    };

    let metrics = Arc::new(EngineMetrics::new().expect("Failed to register metrics"));
    let system_wallets = Arc::new(SystemWalletRegistry::new(db.pool.clone()));
    let deadline = Duration::from_millis(rules.request_timeout_ms);

    let app_state = AppState {
        db: db.clone(),
        booking: BookingCoordinator::new(db.pool.clone(), system_wallets.clone(), rules),
        wallets: WalletService::new(db.pool.clone(), system_wallets, deadline),
        kafka,
        metrics: metrics.clone(),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            webhook_secret: config.auth.webhook_secret.clone(),
        },
    };

    // Hold cleanup
    let sweeper = Arc::new(PgHoldSweeper::new(db.pool.clone(), config.cleanup.batch_size));
    let reclaimed = metrics.clone();
    let scheduler = CleanupScheduler::new(sweeper, Duration::from_secs(config.cleanup.interval_seconds))
        .on_report(move |report| reclaimed.holds_reclaimed.inc_by(report.holds_reclaimed as u64))
        .start();

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    scheduler.stop().await;
    tracing::info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
