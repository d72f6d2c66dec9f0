use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub booking: BookingRules,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Tunables for the booking engine. Rows in `business_rules` override these
/// at startup, see `DbClient::fetch_booking_rules`.
#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    pub hold_ttl_seconds: u64,
    pub max_seats_per_request: i32,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: 600,
            max_seats_per_request: 6,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_request_timeout_ms() -> u64 { 5000 }

#[derive(Debug, Deserialize, Clone)]
pub struct CleanupConfig {
    pub interval_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { interval_seconds: 60, batch_size: default_batch_size() }
    }
}

fn default_batch_size() -> i64 { 500 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Shared secret the payment gateway adapter sends in `x-webhook-secret`.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, e.g. config/production.toml
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // TRANSIT__BOOKING__HOLD_TTL_SECONDS=300 sets booking.hold_ttl_seconds
            .add_source(config::Environment::with_prefix("TRANSIT").separator("__"))
            .build()?;

        let cfg: Self = s.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the engine cannot run with, before anything starts.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.cleanup.interval_seconds == 0 {
            return Err(config::ConfigError::Message(
                "cleanup.interval_seconds must be at least 1".into(),
            ));
        }
        if self.cleanup.batch_size < 1 {
            return Err(config::ConfigError::Message("cleanup.batch_size must be at least 1".into()));
        }
        if self.booking.hold_ttl_seconds == 0 {
            return Err(config::ConfigError::Message(
                "booking.hold_ttl_seconds must be at least 1".into(),
            ));
        }
        if self.booking.max_seats_per_request < 1 {
            return Err(config::ConfigError::Message(
                "booking.max_seats_per_request must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
