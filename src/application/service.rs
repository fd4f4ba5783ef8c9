use tracing::info;

use crate::config::Config;
use crate::domain::{
    Account, AccountId, Cents, Entry, EntryId, Transfer, TransferId, normalize_currency,
};
use crate::storage::{IntegrityReport, LedgerStats, LedgerStore};

use super::{AppError, TransferEngine, TransferParams, TransferTxResult};

pub const MIN_PAGE_SIZE: i64 = 5;
pub const MAX_PAGE_SIZE: i64 = 10;

/// One page of a listing. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page_id: i64,
    pub page_size: i64,
}

impl Page {
    pub fn new(page_id: i64, page_size: i64) -> Self {
        Self { page_id, page_size }
    }

    /// Validate and convert to `(limit, offset)`.
    fn limit_offset(&self) -> Result<(i64, i64), AppError> {
        if self.page_id < 1 {
            return Err(AppError::InvalidPage(format!(
                "page_id must be at least 1, got {}",
                self.page_id
            )));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(AppError::InvalidPage(format!(
                "page_size must be between {} and {}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }
        let offset = (self.page_id - 1)
            .checked_mul(self.page_size)
            .ok_or_else(|| AppError::InvalidPage(format!("page_id {} too large", self.page_id)))?;
        Ok((self.page_size, offset))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, MAX_PAGE_SIZE)
    }
}

/// A transfer request as received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
    pub currency: String,
}

/// Request-facing service: validates input, resolves accounts and hands
/// transfers to the [`TransferEngine`].
pub struct BankService {
    store: LedgerStore,
    engine: TransferEngine,
}

impl BankService {
    pub fn new(store: LedgerStore) -> Self {
        let engine = TransferEngine::new(store.clone());
        Self { store, engine }
    }

    /// Create (if needed) and migrate the database named by `config`.
    pub async fn init(config: &Config) -> Result<Self, AppError> {
        let store = LedgerStore::init(config).await?;
        Ok(Self::new(store))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let store = LedgerStore::connect(config, false).await?;
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    // ========================
    // Account operations
    // ========================

    /// Open an account. A positive opening balance is booked as an entry in
    /// the same transaction, so the balance always equals the entry sum.
    /// Negative opening balances are rejected.
    pub async fn open_account(
        &self,
        owner: &str,
        currency: &str,
        opening_balance: Cents,
    ) -> Result<Account, AppError> {
        let owner = owner.trim().to_string();
        if owner.is_empty() {
            return Err(AppError::InvalidOwner("owner must not be empty".to_string()));
        }
        if opening_balance < 0 {
            return Err(AppError::InvalidAmount(format!(
                "opening balance must not be negative, got {}",
                opening_balance
            )));
        }
        let currency = normalize_currency(currency)
            .ok_or_else(|| AppError::UnsupportedCurrency(currency.to_string()))?;

        let account = self
            .store
            .run_in_transaction(move |tx| {
                Box::pin(async move {
                    let account = tx.create_account(&owner, currency).await?;
                    if opening_balance == 0 {
                        return Ok(account);
                    }
                    tx.create_entry(account.id, opening_balance).await?;
                    tx.add_account_balance(account.id, opening_balance).await
                })
            })
            .await?;

        info!(
            account_id = account.id,
            owner = %account.owner,
            currency = %account.currency,
            balance = account.balance,
            "account opened"
        );
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.store
            .get_account(id)
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }

    pub async fn list_accounts(&self, page: Page) -> Result<Vec<Account>, AppError> {
        let (limit, offset) = page.limit_offset()?;
        Ok(self.store.list_accounts(limit, offset).await?)
    }

    // ========================
    // Ledger lookups
    // ========================

    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, AppError> {
        self.store
            .get_entry(id)
            .await?
            .ok_or(AppError::EntryNotFound(id))
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, AppError> {
        let (limit, offset) = page.limit_offset()?;
        self.get_account(account_id).await?;
        Ok(self.store.list_entries(account_id, limit, offset).await?)
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, AppError> {
        self.store
            .get_transfer(id)
            .await?
            .ok_or(AppError::TransferNotFound(id))
    }

    pub async fn list_transfers(
        &self,
        account_id: Option<AccountId>,
        page: Page,
    ) -> Result<Vec<Transfer>, AppError> {
        let (limit, offset) = page.limit_offset()?;
        if let Some(account_id) = account_id {
            self.get_account(account_id).await?;
        }
        Ok(self.store.list_transfers(account_id, limit, offset).await?)
    }

    // ========================
    // Transfers
    // ========================

    /// Validate a client transfer request and execute it.
    ///
    /// Both accounts must exist and hold the requested currency; nothing is
    /// written when either check fails.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferTxResult, AppError> {
        if request.amount <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        let currency = normalize_currency(&request.currency)
            .ok_or_else(|| AppError::UnsupportedCurrency(request.currency.clone()))?;

        self.valid_account(request.from_account_id, currency).await?;
        self.valid_account(request.to_account_id, currency).await?;

        self.engine
            .execute(TransferParams::new(
                request.from_account_id,
                request.to_account_id,
                request.amount,
            ))
            .await
    }

    async fn valid_account(&self, id: AccountId, currency: &str) -> Result<Account, AppError> {
        let account = self.get_account(id).await?;
        if !account.has_currency(currency) {
            return Err(AppError::CurrencyMismatch {
                account_id: id,
                account_currency: account.currency,
                requested: currency.to_string(),
            });
        }
        Ok(account)
    }

    // ========================
    // Integrity
    // ========================

    pub async fn stats(&self) -> Result<LedgerStats, AppError> {
        Ok(self.store.ledger_stats().await?)
    }

    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        Ok(self.store.integrity_report().await?)
    }
}
