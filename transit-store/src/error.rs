use tracing::error;
use transit_core::{EngineError, EngineResult};

const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";

fn sqlstate(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    sqlstate(e).as_deref() == Some(UNIQUE_VIOLATION)
}

pub fn is_check_violation(e: &sqlx::Error) -> bool {
    sqlstate(e).as_deref() == Some(CHECK_VIOLATION)
}

/// Converts an `sqlx::Error` into the engine taxonomy, logging it with the
/// operation that failed. Unique violations are handled by the caller, which
/// knows which idempotency key was involved.
pub fn map_db_error(context: &'static str, e: sqlx::Error) -> EngineError {
    if is_check_violation(&e) {
        error!(context, error = %e, "store constraint rejected a write");
        return EngineError::ConsistencyViolation(format!("{}: {}", context, e));
    }
    error!(context, error = %e, "database operation failed");
    EngineError::Database(format!("{}: {}", context, e))
}

pub trait DbResultExt<T> {
    fn db_context(self, context: &'static str) -> EngineResult<T>;
}

impl<T> DbResultExt<T> for Result<T, sqlx::Error> {
    fn db_context(self, context: &'static str) -> EngineResult<T> {
        self.map_err(|e| map_db_error(context, e))
    }
}
