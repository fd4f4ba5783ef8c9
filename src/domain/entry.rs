use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type EntryId = i64;

/// One signed balance adjustment on a single account.
/// Negative amounts are debits, positive amounts are credits.
/// Entries are append-only: never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_amounts_are_debits() {
        let entry = |amount| Entry {
            id: 1,
            account_id: 1,
            amount,
            created_at: Utc::now(),
        };
        assert!(entry(-10).is_debit());
        assert!(!entry(10).is_debit());
    }
}
