// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use ledgerbank::application::BankService;
use ledgerbank::domain::{Account, AccountId, Cents, Entry};
use ledgerbank::storage::LedgerStats;
use ledgerbank::Config;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(BankService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = Config::new(temp_dir.path().join("test.db"));
    let service = BankService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Open a USD account with the given opening balance
pub async fn open_usd(service: &BankService, owner: &str, balance: Cents) -> Result<Account> {
    Ok(service.open_account(owner, "USD", balance).await?)
}

/// Test fixture: the two accounts used by most transfer scenarios
pub struct AccountPair {
    pub a: Account,
    pub b: Account,
}

impl AccountPair {
    pub async fn open(service: &BankService, balance_a: Cents, balance_b: Cents) -> Result<Self> {
        let a = open_usd(service, "alice", balance_a).await?;
        let b = open_usd(service, "bob", balance_b).await?;
        Ok(Self { a, b })
    }
}

pub async fn balance_of(service: &BankService, id: AccountId) -> Result<Cents> {
    Ok(service.get_account(id).await?.balance)
}

pub async fn stats(service: &BankService) -> Result<LedgerStats> {
    Ok(service.stats().await?)
}

/// All entries of an account (pages through the listing)
pub async fn all_entries(service: &BankService, id: AccountId) -> Result<Vec<Entry>> {
    use ledgerbank::application::Page;

    let mut entries = Vec::new();
    let mut page_id = 1;
    loop {
        let page = service.list_entries(id, Page::new(page_id, 10)).await?;
        let done = page.len() < 10;
        entries.extend(page);
        if done {
            return Ok(entries);
        }
        page_id += 1;
    }
}
