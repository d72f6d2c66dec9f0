use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::{BookingRules, DatabaseConfig};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    rule_key: String,
    rule_value: Value,
}

impl DbClient {
    pub async fn new(cfg: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .connect(&cfg.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlays `business_rules` rows on the configured booking rules.
    /// Rows are stored as `{"value": <number>}`; unknown keys are ignored.
    pub async fn fetch_booking_rules(&self, defaults: BookingRules) -> Result<BookingRules, sqlx::Error> {
        let rows = sqlx::query_as::<_, RuleRow>("SELECT rule_key, rule_value FROM business_rules")
            .fetch_all(&self.pool)
            .await?;

        let mut rules = defaults;
        for row in rows {
            apply_rule(&mut rules, &row.rule_key, &row.rule_value);
        }
        Ok(rules)
    }
}

fn apply_rule(rules: &mut BookingRules, key: &str, raw: &Value) {
    let Some(v) = raw.get("value") else {
        warn!(rule_key = key, "business rule without a value field");
        return;
    };

    match key {
        "hold_ttl_seconds" => {
            if let Some(u) = v.as_u64() {
                rules.hold_ttl_seconds = u;
            }
        }
        "max_seats_per_request" => {
            if let Some(n) = v.as_i64().and_then(|n| i32::try_from(n).ok()) {
                rules.max_seats_per_request = n;
            }
        }
        "request_timeout_ms" => {
            if let Some(u) = v.as_u64() {
                rules.request_timeout_ms = u;
            }
        }
        _ => {}
    }
}
