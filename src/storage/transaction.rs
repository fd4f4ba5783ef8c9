use std::future::Future;

use futures::future::BoxFuture;
use sqlx::{Sqlite, Transaction};
use tracing::{debug, warn};

use crate::domain::{Account, AccountId, Cents, Entry, Transfer};

use super::queries::{fetch_account, now_rfc3339, row_to_account, row_to_entry, row_to_transfer};
use super::{LedgerStore, StoreError};

/// Ledger operations bound to one open database transaction.
///
/// Every statement issued through this handle runs on the transaction's
/// connection. Handles only exist inside [`LedgerStore::run_in_transaction`].
pub struct LedgerTx {
    tx: Transaction<'static, Sqlite>,
}

impl LedgerTx {
    pub async fn get_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
        fetch_account(&mut *self.tx, id).await
    }

    /// Insert an account with a zero balance.
    pub async fn create_account(&mut self, owner: &str, currency: &str) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (owner, balance, currency, created_at)
            VALUES (?, 0, ?, ?)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(owner)
        .bind(currency)
        .bind(now_rfc3339())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_account(&row)
    }

    /// Add `delta` (possibly negative) to an account balance and return the
    /// updated row. The increment happens inside the UPDATE statement, so
    /// concurrent increments on the same row never overwrite each other.
    pub async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Cents,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + ?
            WHERE id = ?
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(delta)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(StoreError::NotFound {
                entity: "account",
                id,
            }),
        }
    }

    pub async fn create_entry(
        &mut self,
        account_id: AccountId,
        amount: Cents,
    ) -> Result<Entry, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO entries (account_id, amount, created_at)
            VALUES (?, ?, ?)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(now_rfc3339())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_entry(&row)
    }

    pub async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> Result<Transfer, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(amount)
        .bind(now_rfc3339())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_transfer(&row)
    }

    /// Roll back and hand back the error that caused it. A failed rollback
    /// is reported together with the original error.
    async fn abort(self, error: StoreError) -> StoreError {
        match self.tx.rollback().await {
            Ok(()) => {
                debug!(error = %error, "transaction rolled back");
                error
            }
            Err(rollback) => {
                warn!(error = %error, rollback_error = %rollback, "transaction rollback failed");
                StoreError::RollbackFailed {
                    error: Box::new(error),
                    rollback,
                }
            }
        }
    }
}

impl LedgerStore {
    /// Run `work` inside a single database transaction.
    ///
    /// Commits when `work` succeeds; otherwise rolls back and returns the
    /// error from `work`. Calls do not nest: each one is its own transaction.
    pub async fn run_in_transaction<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut LedgerTx) -> BoxFuture<'c, Result<T, StoreError>> + Send,
    {
        self.run_in_transaction_until(std::future::pending::<()>(), work)
            .await
    }

    /// Like [`LedgerStore::run_in_transaction`], but gives up as soon as
    /// `cancel` resolves: the unfinished work is dropped, the transaction is
    /// rolled back and [`StoreError::Cancelled`] is returned.
    ///
    /// If `cancel` is already resolved when polled, nothing runs.
    pub async fn run_in_transaction_until<T, F, C>(
        &self,
        cancel: C,
        work: F,
    ) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut LedgerTx) -> BoxFuture<'c, Result<T, StoreError>> + Send,
        C: Future<Output = ()> + Send,
    {
        let mut ledger_tx = LedgerTx {
            tx: self.pool().begin().await?,
        };
        debug!("transaction started");

        let outcome = {
            let work = work(&mut ledger_tx);
            tokio::select! {
                biased;
                _ = cancel => None,
                result = work => Some(result),
            }
        };

        match outcome {
            Some(Ok(value)) => {
                ledger_tx.tx.commit().await?;
                debug!("transaction committed");
                Ok(value)
            }
            Some(Err(error)) => Err(ledger_tx.abort(error).await),
            None => Err(ledger_tx.abort(StoreError::Cancelled).await),
        }
    }
}
