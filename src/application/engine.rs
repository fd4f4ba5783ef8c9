use std::future::Future;

use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::domain::{Account, AccountId, Cents, Entry, LockOrder, Transfer, lock_order};
use crate::storage::{LedgerStore, LedgerTx, StoreError};

use super::AppError;

/// Input of one money movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
    /// Tag attached to the tracing span of this transfer. A random one is
    /// generated when absent.
    pub label: Option<String>,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Cents) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Everything written by a committed transfer. `from_account` and
/// `to_account` follow the request direction and hold the post-update rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Moves money between two accounts in one transaction.
///
/// The engine keeps no state between calls; clones share the underlying
/// pool and can run concurrently without external locking.
#[derive(Clone)]
pub struct TransferEngine {
    store: LedgerStore,
}

impl TransferEngine {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Execute a transfer. Either the transfer row, both entries and both
    /// balance updates are committed, or nothing is.
    pub async fn execute(&self, params: TransferParams) -> Result<TransferTxResult, AppError> {
        self.execute_until(params, std::future::pending::<()>())
            .await
    }

    /// Execute a transfer, abandoning it if `cancel` resolves first. An
    /// abandoned transfer is rolled back and reported as cancelled.
    pub async fn execute_until<C>(
        &self,
        params: TransferParams,
        cancel: C,
    ) -> Result<TransferTxResult, AppError>
    where
        C: Future<Output = ()> + Send,
    {
        check_params(&params)?;

        let TransferParams {
            from_account_id,
            to_account_id,
            amount,
            label,
        } = params;
        let label = label.unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = info_span!(
            "transfer",
            tx = %label,
            from = from_account_id,
            to = to_account_id,
            amount
        );

        async move {
            let outcome = self
                .store
                .run_in_transaction_until(cancel, move |tx| {
                    Box::pin(apply_transfer(tx, from_account_id, to_account_id, amount))
                })
                .await;

            match &outcome {
                Ok(result) => info!(
                    transfer_id = result.transfer.id,
                    from_balance = result.from_account.balance,
                    to_balance = result.to_account.balance,
                    "transfer committed"
                ),
                Err(err) => warn!(error = %err, "transfer failed"),
            }

            outcome.map_err(AppError::from)
        }
        .instrument(span)
        .await
    }
}

fn check_params(params: &TransferParams) -> Result<(), AppError> {
    if params.amount <= 0 {
        return Err(AppError::InvalidAmount(format!(
            "amount must be positive, got {}",
            params.amount
        )));
    }
    if params.from_account_id == params.to_account_id {
        return Err(AppError::SameAccount(params.from_account_id));
    }
    Ok(())
}

/// The write sequence of one transfer. Any error aborts the surrounding
/// transaction.
async fn apply_transfer(
    tx: &mut LedgerTx,
    from_account_id: AccountId,
    to_account_id: AccountId,
    amount: Cents,
) -> Result<TransferTxResult, StoreError> {
    debug!("create transfer");
    let transfer = tx
        .create_transfer(from_account_id, to_account_id, amount)
        .await?;

    debug!("create debit entry");
    let from_entry = tx.create_entry(from_account_id, -amount).await?;

    debug!("create credit entry");
    let to_entry = tx.create_entry(to_account_id, amount).await?;

    let (from_account, to_account) = match lock_order(from_account_id, to_account_id) {
        LockOrder::FromFirst => {
            debug!(account_id = from_account_id, "update balance (from, first)");
            let from_account = tx.add_account_balance(from_account_id, -amount).await?;
            debug!(account_id = to_account_id, "update balance (to, second)");
            let to_account = tx.add_account_balance(to_account_id, amount).await?;
            (from_account, to_account)
        }
        LockOrder::ToFirst => {
            debug!(account_id = to_account_id, "update balance (to, first)");
            let to_account = tx.add_account_balance(to_account_id, amount).await?;
            debug!(account_id = from_account_id, "update balance (from, second)");
            let from_account = tx.add_account_balance(from_account_id, -amount).await?;
            (from_account, to_account)
        }
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}
