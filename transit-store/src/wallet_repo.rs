use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{debug, warn};
use transit_core::ledger::{LedgerEntry, OwnerRef, TransactionType, Wallet};
use transit_core::{EngineError, EngineResult};
use transit_shared::Money;
use uuid::Uuid;

use crate::error::{is_unique_violation, map_db_error, DbResultExt};

#[derive(sqlx::FromRow)]
struct WalletRow {
    id: Uuid,
    owner_ref: String,
    purpose: String,
    is_system: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<WalletRow> for Wallet {
    fn from(r: WalletRow) -> Self {
        Wallet {
            id: r.id,
            owner_ref: r.owner_ref,
            purpose: r.purpose,
            is_system: r.is_system,
            is_active: r.is_active,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    wallet_id: Uuid,
    amount: i64,
    transaction_type: String,
    reference_id: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = EngineError;

    fn try_from(r: EntryRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            id: r.id,
            wallet_id: r.wallet_id,
            amount: Money::from_minor(r.amount),
            transaction_type: r.transaction_type.parse()?,
            reference_id: r.reference_id,
            description: r.description,
            created_at: r.created_at,
        })
    }
}

const WALLET_COLUMNS: &str = "id, owner_ref, purpose, is_system, is_active, created_at";
const ENTRY_COLUMNS: &str =
    "id, wallet_id, amount, transaction_type, reference_id, description, created_at";

/// Append-only store of wallets and their signed entries. Balances are
/// always derived from the entries, never stored.
pub struct WalletLedger;

impl WalletLedger {
    pub async fn find_wallet(conn: &mut PgConnection, owner: OwnerRef) -> EngineResult<Option<Wallet>> {
        let row = sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM wallets WHERE owner_ref = $1 AND purpose = $2",
            WALLET_COLUMNS
        ))
        .bind(owner.owner_key())
        .bind(owner.purpose())
        .fetch_optional(&mut *conn)
        .await
        .db_context("find wallet")?;

        Ok(row.map(Wallet::from))
    }

    pub async fn get_wallet(conn: &mut PgConnection, wallet_id: Uuid) -> EngineResult<Wallet> {
        sqlx::query_as::<_, WalletRow>(&format!("SELECT {} FROM wallets WHERE id = $1", WALLET_COLUMNS))
            .bind(wallet_id)
            .fetch_optional(&mut *conn)
            .await
            .db_context("get wallet")?
            .map(Wallet::from)
            .ok_or(EngineError::WalletNotFound(wallet_id))
    }

    /// Returns the wallet for `owner`, creating it on first use. A lost
    /// creation race resolves to the winner's row without aborting the
    /// enclosing transaction.
    pub async fn get_or_create_wallet(conn: &mut PgConnection, owner: OwnerRef) -> EngineResult<Wallet> {
        if let Some(wallet) = Self::find_wallet(conn, owner).await? {
            return Ok(wallet);
        }

        let inserted = sqlx::query_as::<_, WalletRow>(&format!(
            "INSERT INTO wallets (id, owner_ref, purpose, is_system) VALUES ($1, $2, $3, $4)
             ON CONFLICT (owner_ref, purpose) DO NOTHING
             RETURNING {}",
            WALLET_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner.owner_key())
        .bind(owner.purpose())
        .bind(owner.is_system())
        .fetch_optional(&mut *conn)
        .await
        .db_context("create wallet")?;

        if let Some(row) = inserted {
            debug!(wallet_id = %row.id, owner = %owner, "created wallet");
            return Ok(row.into());
        }

        Self::find_wallet(conn, owner).await?.ok_or_else(|| {
            EngineError::Database(format!("wallet for {} vanished after conflicting insert", owner))
        })
    }

    /// Sum of the wallet's entries. Unknown wallets have a balance of zero.
    pub async fn get_balance(conn: &mut PgConnection, wallet_id: Uuid) -> EngineResult<Money> {
        let sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ledger_entries WHERE wallet_id = $1",
        )
        .bind(wallet_id)
        .fetch_one(&mut *conn)
        .await
        .db_context("sum wallet entries")?;

        Ok(Money::from_minor(sum))
    }

    /// Takes the row lock that serializes debits against one wallet.
    pub async fn lock_wallet(tx: &mut Transaction<'_, Postgres>, wallet_id: Uuid) -> EngineResult<Wallet> {
        sqlx::query_as::<_, WalletRow>(&format!(
            "SELECT {} FROM wallets WHERE id = $1 FOR UPDATE",
            WALLET_COLUMNS
        ))
        .bind(wallet_id)
        .fetch_optional(&mut **tx)
        .await
        .db_context("lock wallet")?
        .map(Wallet::from)
        .ok_or(EngineError::WalletNotFound(wallet_id))
    }

    pub async fn entry_exists(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        transaction_type: TransactionType,
        reference_id: &str,
    ) -> EngineResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM ledger_entries
                WHERE wallet_id = $1 AND transaction_type = $2 AND reference_id = $3
             )",
        )
        .bind(wallet_id)
        .bind(transaction_type.as_str())
        .bind(reference_id)
        .fetch_one(&mut *conn)
        .await
        .db_context("check ledger entry")
    }

    /// Appends one signed entry inside `tx`.
    ///
    /// Debits against rider wallets lock the wallet row first and re-read the
    /// balance under that lock, so two concurrent debits cannot both pass.
    /// System wallets are never locked and may go negative.
    pub async fn record_entry(
        tx: &mut Transaction<'_, Postgres>,
        wallet_id: Uuid,
        amount: Money,
        transaction_type: TransactionType,
        reference_id: &str,
        description: Option<&str>,
    ) -> EngineResult<LedgerEntry> {
        if amount == Money::ZERO {
            return Err(EngineError::InvalidAmount("ledger entries cannot be zero".to_string()));
        }

        if Self::entry_exists(&mut **tx, wallet_id, transaction_type, reference_id).await? {
            return Err(EngineError::DuplicateLedgerEntry {
                wallet_id,
                reference_id: reference_id.to_string(),
            });
        }

        let wallet = Self::get_wallet(&mut **tx, wallet_id).await?;
        if !wallet.is_active {
            return Err(EngineError::InvalidTransfer(format!("wallet {} is inactive", wallet_id)));
        }

        if amount.is_negative() && !wallet.is_system {
            Self::lock_wallet(tx, wallet_id).await?;
            let balance = Self::get_balance(&mut **tx, wallet_id).await?;
            let required = amount.checked_neg().ok_or_else(|| {
                EngineError::InvalidAmount(format!("amount {} out of range", amount))
            })?;
            if balance < required {
                return Err(EngineError::InsufficientFunds { wallet_id, balance, required });
            }
        }

        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "INSERT INTO ledger_entries (id, wallet_id, amount, transaction_type, reference_id, description)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            ENTRY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(wallet_id)
        .bind(amount.minor())
        .bind(transaction_type.as_str())
        .bind(reference_id)
        .bind(description)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!(%wallet_id, reference_id, "ledger entry raced a concurrent writer");
                EngineError::DuplicateLedgerEntry {
                    wallet_id,
                    reference_id: reference_id.to_string(),
                }
            } else {
                map_db_error("insert ledger entry", e)
            }
        })?;

        row.try_into()
    }

    /// Most recent entries first.
    pub async fn list_entries(
        conn: &mut PgConnection,
        wallet_id: Uuid,
        limit: i64,
    ) -> EngineResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {} FROM ledger_entries WHERE wallet_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2",
            ENTRY_COLUMNS
        ))
        .bind(wallet_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&mut *conn)
        .await
        .db_context("list ledger entries")?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }
}
