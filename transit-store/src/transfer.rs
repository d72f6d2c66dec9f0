use sqlx::{Postgres, Transaction};
use tracing::debug;
use transit_core::ledger::{LedgerEntry, Transfer};
use transit_core::{EngineError, EngineResult};

use crate::wallet_repo::WalletLedger;

/// Both legs of an applied transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

/// Writes transfers as matched debit/credit pairs.
pub struct TransactionExecutor;

impl TransactionExecutor {
    /// Applies `transfer` inside the caller's transaction.
    ///
    /// A reference already used by the sender for this transaction type fails
    /// with `DuplicateIdempotencyKey` before anything is written. Any error
    /// leaves `tx` to be rolled back by the caller.
    pub async fn execute(
        tx: &mut Transaction<'_, Postgres>,
        transfer: &Transfer,
    ) -> EngineResult<TransferReceipt> {
        transfer.validate()?;

        let [(sender, debit_amount), (receiver, credit_amount)] = transfer.legs();

        if WalletLedger::entry_exists(&mut **tx, sender, transfer.transaction_type, &transfer.reference_id).await? {
            return Err(EngineError::DuplicateIdempotencyKey {
                reference_id: transfer.reference_id.clone(),
            });
        }

        let description = transfer.description.as_deref();
        let debit = WalletLedger::record_entry(
            tx,
            sender,
            debit_amount,
            transfer.transaction_type,
            &transfer.reference_id,
            description,
        )
        .await
        .map_err(as_idempotency_error)?;

        let credit = WalletLedger::record_entry(
            tx,
            receiver,
            credit_amount,
            transfer.transaction_type,
            &transfer.reference_id,
            description,
        )
        .await
        .map_err(as_idempotency_error)?;

        debug!(
            reference_id = %transfer.reference_id,
            transaction_type = %transfer.transaction_type,
            amount = %transfer.amount,
            "transfer applied"
        );

        Ok(TransferReceipt { debit, credit })
    }
}

fn as_idempotency_error(e: EngineError) -> EngineError {
    match e {
        EngineError::DuplicateLedgerEntry { reference_id, .. } => {
            EngineError::DuplicateIdempotencyKey { reference_id }
        }
        other => other,
    }
}
