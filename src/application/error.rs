use thiserror::Error;

use crate::domain::{AccountId, EntryId, TransferId};
use crate::storage::{ConstraintKind, StoreError};

/// Stable classification of an [`AppError`], for mapping failures onto
/// request-level responses without inspecting driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    /// Lock contention outlasted the busy timeout; safe for the caller to resubmit.
    Conflict,
    Constraint(ConstraintKind),
    Cancelled,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Account {account_id} currency mismatch: {account_currency} vs {requested}")]
    CurrencyMismatch {
        account_id: AccountId,
        account_currency: String,
        requested: String,
    },

    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::AccountNotFound(_)
            | AppError::TransferNotFound(_)
            | AppError::EntryNotFound(_) => ErrorKind::NotFound,
            AppError::InvalidAmount(_)
            | AppError::SameAccount(_)
            | AppError::UnsupportedCurrency(_)
            | AppError::CurrencyMismatch { .. }
            | AppError::InvalidOwner(_)
            | AppError::InvalidPage(_) => ErrorKind::InvalidInput,
            AppError::Store(err) => store_kind(err),
            AppError::Database(_) => ErrorKind::Internal,
        }
    }
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::NotFound { .. } => ErrorKind::NotFound,
        StoreError::Constraint { kind, .. } => ErrorKind::Constraint(*kind),
        StoreError::Conflict(_) => ErrorKind::Conflict,
        StoreError::Cancelled => ErrorKind::Cancelled,
        StoreError::RollbackFailed { .. } | StoreError::Decode(_) | StoreError::Database(_) => {
            ErrorKind::Internal
        }
    }
}
