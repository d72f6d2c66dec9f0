use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use transit_core::ledger::{LedgerEntry, OwnerRef, TransactionType, Transfer, Wallet};
use transit_core::payment::{PaymentNotification, TopupOutcome};
use transit_core::{EngineError, EngineResult};
use transit_shared::Money;
use transit_store::error::DbResultExt;
use transit_store::{SystemWalletRegistry, TransactionExecutor, TransferReceipt, WalletLedger};
use uuid::Uuid;

use crate::deadline::with_deadline;

/// Standalone wallet operations, each in its own transaction. Code that
/// needs to combine a transfer with other writes uses `TransactionExecutor`
/// directly.
#[derive(Clone)]
pub struct WalletService {
    pool: Pool<Postgres>,
    system_wallets: Arc<SystemWalletRegistry>,
    deadline: Duration,
}

impl WalletService {
    pub fn new(pool: Pool<Postgres>, system_wallets: Arc<SystemWalletRegistry>, deadline: Duration) -> Self {
        Self { pool, system_wallets, deadline }
    }

    pub async fn get_or_create_wallet(&self, owner: OwnerRef) -> EngineResult<Wallet> {
        let mut conn = self.pool.acquire().await.db_context("acquire connection")?;
        WalletLedger::get_or_create_wallet(&mut conn, owner).await
    }

    pub async fn wallet_for_user(&self, user_id: Uuid) -> EngineResult<Wallet> {
        self.get_or_create_wallet(OwnerRef::User(user_id)).await
    }

    pub async fn get_balance(&self, wallet_id: Uuid) -> EngineResult<Money> {
        let mut conn = self.pool.acquire().await.db_context("acquire connection")?;
        WalletLedger::get_balance(&mut conn, wallet_id).await
    }

    pub async fn list_entries(&self, wallet_id: Uuid, limit: i64) -> EngineResult<Vec<LedgerEntry>> {
        let mut conn = self.pool.acquire().await.db_context("acquire connection")?;
        WalletLedger::list_entries(&mut conn, wallet_id, limit).await
    }

    pub async fn transfer(&self, transfer: Transfer) -> EngineResult<TransferReceipt> {
        with_deadline(self.deadline, "transfer", async {
            let mut tx = self.pool.begin().await.db_context("begin transfer")?;
            let receipt = TransactionExecutor::execute(&mut tx, &transfer).await?;
            tx.commit().await.db_context("commit transfer")?;
            Ok(receipt)
        })
        .await
    }

    /// Funds a rider wallet from the liability wallet. Returns the new balance.
    pub async fn credit_wallet(
        &self,
        user_id: Uuid,
        amount: Money,
        transaction_type: TransactionType,
        reference_id: &str,
        description: Option<String>,
    ) -> EngineResult<Money> {
        if !matches!(transaction_type, TransactionType::Topup | TransactionType::Adjustment) {
            return Err(EngineError::InvalidTransfer(format!(
                "{} cannot be used to credit a wallet",
                transaction_type
            )));
        }
        let liability = self.system_wallets.liability().await?;
        let rider = self.wallet_for_user(user_id).await?;

        self.transfer(Transfer {
            sender_wallet_id: liability,
            receiver_wallet_id: rider.id,
            amount,
            transaction_type,
            reference_id: reference_id.to_string(),
            description,
        })
        .await?;

        let balance = self.get_balance(rider.id).await?;
        info!(%user_id, %amount, %balance, transaction_type = %transaction_type, "wallet credited");
        Ok(balance)
    }

    /// Charges a rider wallet into revenue. Returns the new balance.
    pub async fn debit_wallet(
        &self,
        user_id: Uuid,
        amount: Money,
        transaction_type: TransactionType,
        reference_id: &str,
        description: Option<String>,
    ) -> EngineResult<Money> {
        if matches!(transaction_type, TransactionType::Topup | TransactionType::Refund) {
            return Err(EngineError::InvalidTransfer(format!(
                "{} cannot be used to debit a wallet",
                transaction_type
            )));
        }
        let revenue = self.system_wallets.revenue().await?;
        let rider = self.wallet_for_user(user_id).await?;

        self.transfer(Transfer {
            sender_wallet_id: rider.id,
            receiver_wallet_id: revenue,
            amount,
            transaction_type,
            reference_id: reference_id.to_string(),
            description,
        })
        .await?;

        let balance = self.get_balance(rider.id).await?;
        info!(%user_id, %amount, %balance, transaction_type = %transaction_type, "wallet debited");
        Ok(balance)
    }

    /// Applies a gateway "payment succeeded" notification as a top-up.
    /// Replayed notifications credit nothing.
    pub async fn apply_payment(&self, payment: &PaymentNotification) -> EngineResult<TopupOutcome> {
        let result = self
            .credit_wallet(
                payment.user_id,
                payment.amount,
                TransactionType::Topup,
                &payment.reference_id,
                Some(format!("Top-up via {}", payment.method.as_str())),
            )
            .await;

        match result {
            Ok(balance) => Ok(TopupOutcome::Applied { balance }),
            Err(e) if e.is_idempotent_replay() => {
                info!(reference_id = %payment.reference_id, "payment notification already applied");
                let rider = self.wallet_for_user(payment.user_id).await?;
                let balance = self.get_balance(rider.id).await?;
                Ok(TopupOutcome::AlreadyApplied { balance })
            }
            Err(e) => Err(e),
        }
    }
}
