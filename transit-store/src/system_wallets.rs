use sqlx::{Pool, Postgres};
use tokio::sync::OnceCell;
use tracing::info;
use transit_core::ledger::{OwnerRef, SystemWallet};
use transit_core::{EngineError, EngineResult};
use uuid::Uuid;

use crate::error::DbResultExt;
use crate::wallet_repo::WalletLedger;

/// Resolves the operator's wallets once per process and caches their ids.
pub struct SystemWalletRegistry {
    pool: Pool<Postgres>,
    liability: OnceCell<Uuid>,
    revenue: OnceCell<Uuid>,
}

impl SystemWalletRegistry {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            liability: OnceCell::new(),
            revenue: OnceCell::new(),
        }
    }

    pub async fn resolve(&self, which: SystemWallet) -> EngineResult<Uuid> {
        let cell = match which {
            SystemWallet::Liability => &self.liability,
            SystemWallet::Revenue => &self.revenue,
        };

        cell.get_or_try_init(|| async move {
            let mut conn = self.pool.acquire().await.db_context("acquire connection")?;
            let wallet = WalletLedger::get_or_create_wallet(&mut conn, OwnerRef::System(which)).await?;
            info!(wallet_id = %wallet.id, wallet = which.name(), "resolved system wallet");
            Ok::<_, EngineError>(wallet.id)
        })
        .await
        .copied()
    }

    pub async fn liability(&self) -> EngineResult<Uuid> {
        self.resolve(SystemWallet::Liability).await
    }

    pub async fn revenue(&self) -> EngineResult<Uuid> {
        self.resolve(SystemWallet::Revenue).await
    }
}
