use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::EngineResult;

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub holds_reclaimed: usize,
    pub trips_touched: usize,
}

/// Reclaims seats from holds whose expiry has passed.
///
/// Implementations must run the whole pass in one transaction and skip rows
/// locked by an in-flight confirm, so a failed pass leaves nothing behind and
/// the next pass starts fresh.
#[async_trait]
pub trait ExpiredHoldSweeper: Send + Sync {
    async fn sweep_expired(&self, now: DateTime<Utc>) -> EngineResult<SweepReport>;
}
