use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type TransferId = i64;

/// The logical record of one money movement. Backed by exactly two entries:
/// a debit of `amount` on the source and a credit of `amount` on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Always positive
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

/// Which leg of a transfer touches its account's balance row first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOrder {
    /// Debit the source, then credit the destination.
    FromFirst,
    /// Credit the destination, then debit the source.
    ToFirst,
}

/// Order in which the two balance rows of a transfer are updated.
///
/// The row with the smaller account id is always updated first, whatever the
/// direction of the transfer. Every transaction touching the same pair of
/// accounts therefore acquires their row locks in the same order, so
/// opposite-direction transfers queue behind each other instead of waiting
/// on each other in a cycle.
pub fn lock_order(from_account_id: AccountId, to_account_id: AccountId) -> LockOrder {
    if from_account_id < to_account_id {
        LockOrder::FromFirst
    } else {
        LockOrder::ToFirst
    }
}
