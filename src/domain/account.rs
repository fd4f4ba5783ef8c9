use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type AccountId = i64;

/// A customer account. `balance` is a denormalized cache of the sum of the
/// account's entries and only changes through the atomic add-balance
/// operation of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: Cents,
    /// Three-letter ISO 4217 code
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn has_currency(&self, currency: &str) -> bool {
        self.currency.eq_ignore_ascii_case(currency.trim())
    }
}
