use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::domain::{Account, AccountId, Cents, Entry, EntryId, Transfer, TransferId};

use super::queries::{fetch_account, row_to_account, row_to_entry, row_to_transfer};
use super::{MIGRATION_001_INITIAL, StoreError};

/// Row counts and totals across the whole ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub transfer_count: i64,
    /// Sum of all account balances
    pub balance_total: Cents,
    /// Sum of all entry amounts
    pub entry_total: Cents,
}

/// An account whose cached balance disagrees with its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDrift {
    pub account_id: AccountId,
    pub balance: Cents,
    pub entry_sum: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub entry_count: i64,
    pub transfer_count: i64,
    pub drifted_accounts: Vec<BalanceDrift>,
    /// Transfers with a non-positive amount
    pub invalid_amounts: i64,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.drifted_accounts.is_empty() && self.invalid_amounts == 0
    }
}

/// Durable storage for accounts, entries and transfers.
///
/// Reads issued here go straight to the pool. Writes only happen inside
/// [`LedgerStore::run_in_transaction`], through the [`super::LedgerTx`]
/// handle it provides.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Create a store over an existing SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Connect to the database named by `config`.
    /// The file is created only when `create_if_missing` is set.
    pub async fn connect(config: &Config, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.database)
            .create_if_missing(create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to database {}", config.database.display())
            })?;

        tracing::debug!(
            database = %config.database.display(),
            max_connections = config.max_connections,
            "connected to ledger database"
        );
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (create + connect + migrate).
    pub async fn init(config: &Config) -> Result<Self> {
        let store = Self::connect(config, true).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ========================
    // Account lookups
    // ========================

    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        fetch_account(&self.pool, id).await
    }

    /// List accounts ordered by id.
    pub async fn list_accounts(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    // ========================
    // Entry lookups
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// List the entries of one account, oldest first.
    pub async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    // ========================
    // Transfer lookups
    // ========================

    pub async fn get_transfer(&self, id: TransferId) -> Result<Option<Transfer>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_transfer).transpose()
    }

    /// List transfers, oldest first. With an account, only transfers where
    /// it is the source or the destination.
    pub async fn list_transfers(
        &self,
        account_id: Option<AccountId>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>, StoreError> {
        let rows = match account_id {
            Some(account_id) => {
                sqlx::query(
                    r#"
                    SELECT id, from_account_id, to_account_id, amount, created_at
                    FROM transfers
                    WHERE from_account_id = ? OR to_account_id = ?
                    ORDER BY id
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(account_id)
                .bind(account_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, from_account_id, to_account_id, amount, created_at
                    FROM transfers
                    ORDER BY id
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_transfer).collect()
    }

    // ========================
    // Ledger-wide checks
    // ========================

    pub async fn ledger_stats(&self) -> Result<LedgerStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts) AS account_count,
                (SELECT COUNT(*) FROM entries) AS entry_count,
                (SELECT COUNT(*) FROM transfers) AS transfer_count,
                (SELECT COALESCE(SUM(balance), 0) FROM accounts) AS balance_total,
                (SELECT COALESCE(SUM(amount), 0) FROM entries) AS entry_total
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(LedgerStats {
            account_count: row.try_get("account_count")?,
            entry_count: row.try_get("entry_count")?,
            transfer_count: row.try_get("transfer_count")?,
            balance_total: row.try_get("balance_total")?,
            entry_total: row.try_get("entry_total")?,
        })
    }

    /// Verify that every account balance equals the sum of its entries and
    /// that no transfer carries a non-positive amount.
    pub async fn integrity_report(&self) -> Result<IntegrityReport, StoreError> {
        let stats = self.ledger_stats().await?;

        let rows = sqlx::query(
            r#"
            SELECT a.id AS account_id, a.balance AS balance, COALESCE(SUM(e.amount), 0) AS entry_sum
            FROM accounts a
            LEFT JOIN entries e ON e.account_id = a.id
            GROUP BY a.id, a.balance
            HAVING a.balance <> COALESCE(SUM(e.amount), 0)
            ORDER BY a.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let drifted_accounts = rows
            .iter()
            .map(|row| -> Result<BalanceDrift, StoreError> {
                Ok(BalanceDrift {
                    account_id: row.try_get("account_id")?,
                    balance: row.try_get("balance")?,
                    entry_sum: row.try_get("entry_sum")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let invalid_amounts: i64 =
            sqlx::query("SELECT COUNT(*) AS count FROM transfers WHERE amount <= 0")
                .fetch_one(&self.pool)
                .await?
                .try_get("count")?;

        Ok(IntegrityReport {
            account_count: stats.account_count,
            entry_count: stats.entry_count,
            transfer_count: stats.transfer_count,
            drifted_accounts,
            invalid_amounts,
        })
    }
}
