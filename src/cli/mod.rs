use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::application::{BankService, Page, TransferRequest, TransferTxResult};
use crate::config::{
    Config, DEFAULT_BUSY_TIMEOUT_SECS, DEFAULT_DATABASE, DEFAULT_LOG_FILTER,
    DEFAULT_MAX_CONNECTIONS,
};
use crate::domain::{Account, Entry, Transfer, format_cents, parse_cents};
use crate::logging::init_logging;

/// ledgerbank - double-entry account ledger
#[derive(Parser)]
#[command(name = "ledgerbank")]
#[command(about = "Open accounts and move money between them with atomic, double-entry transfers")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "LEDGERBANK_DATABASE", default_value = DEFAULT_DATABASE, global = true)]
    pub database: PathBuf,

    /// Log filter (e.g. "info", "ledgerbank=debug"); RUST_LOG takes precedence
    #[arg(long, env = "LEDGERBANK_LOG", default_value = DEFAULT_LOG_FILTER, global = true)]
    pub log: String,

    /// Maximum number of pooled database connections
    #[arg(
        long,
        env = "LEDGERBANK_MAX_CONNECTIONS",
        default_value_t = DEFAULT_MAX_CONNECTIONS,
        global = true
    )]
    pub max_connections: u32,

    /// Seconds a writer waits on a locked database before giving up
    #[arg(
        long,
        env = "LEDGERBANK_BUSY_TIMEOUT_SECS",
        default_value_t = DEFAULT_BUSY_TIMEOUT_SECS,
        global = true
    )]
    pub busy_timeout_secs: u64,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: i64,

        /// Destination account ID
        #[arg(long)]
        to: i64,

        /// Currency of the transfer; both accounts must hold it
        #[arg(short, long)]
        currency: String,
    },

    /// List transfers
    Transfers {
        /// Only transfers from or to this account
        #[arg(long)]
        account: Option<i64>,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },

    /// List the entries of an account
    Entries {
        /// Account ID
        account: i64,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },

    /// Show a transfer
    #[command(name = "show")]
    ShowTransfer {
        /// Transfer ID
        id: i64,
    },

    /// Verify that every balance matches its entries
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account
    Open {
        /// Account owner
        #[arg(short, long)]
        owner: String,

        /// Currency code (e.g., USD, EUR)
        #[arg(short, long)]
        currency: String,

        /// Opening balance (e.g., "100.00")
        #[arg(long, default_value = "0")]
        initial: String,
    },

    /// Show an account
    Show {
        /// Account ID
        id: i64,
    },

    /// List accounts
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 10)]
        page_size: i64,
    },
}

impl Cli {
    pub fn config(&self) -> Config {
        Config::new(self.database.clone())
            .with_log_filter(&self.log)
            .with_max_connections(self.max_connections)
            .with_busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();
        init_logging(&config.log_filter);
        let json = self.json;

        match self.command {
            Commands::Init => {
                let service = BankService::init(&config).await?;
                service.store().close().await;
                println!("Database initialized: {}", config.database.display());
            }

            Commands::Account(account_cmd) => {
                let service = BankService::connect(&config).await?;
                run_account_command(&service, account_cmd, json).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                currency,
            } => {
                let service = BankService::connect(&config).await?;
                let amount =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let result = service
                    .transfer(TransferRequest {
                        from_account_id: from,
                        to_account_id: to,
                        amount,
                        currency,
                    })
                    .await?;

                if json {
                    print_json(&result)?;
                } else {
                    print_transfer_result(&result);
                }
            }

            Commands::Transfers {
                account,
                page,
                page_size,
            } => {
                let service = BankService::connect(&config).await?;
                let transfers = service
                    .list_transfers(account, Page::new(page, page_size))
                    .await?;
                if json {
                    print_json(&transfers)?;
                } else {
                    print_transfers(&transfers);
                }
            }

            Commands::Entries {
                account,
                page,
                page_size,
            } => {
                let service = BankService::connect(&config).await?;
                let entries = service
                    .list_entries(account, Page::new(page, page_size))
                    .await?;
                if json {
                    print_json(&entries)?;
                } else {
                    print_entries(&entries);
                }
            }

            Commands::ShowTransfer { id } => {
                let service = BankService::connect(&config).await?;
                let transfer = service.get_transfer(id).await?;
                if json {
                    print_json(&transfer)?;
                } else {
                    print_transfers(std::slice::from_ref(&transfer));
                }
            }

            Commands::Check => {
                let service = BankService::connect(&config).await?;
                run_check_command(&service, json).await?;
            }
        }

        Ok(())
    }
}

async fn run_account_command(
    service: &BankService,
    cmd: AccountCommands,
    json: bool,
) -> Result<()> {
    match cmd {
        AccountCommands::Open {
            owner,
            currency,
            initial,
        } => {
            let opening_balance =
                parse_cents(&initial).context("Invalid initial balance. Use '100.00' or '100'")?;
            let account = service
                .open_account(&owner, &currency, opening_balance)
                .await?;
            if json {
                print_json(&account)?;
            } else {
                println!(
                    "Opened account {} for {} ({} {})",
                    account.id,
                    account.owner,
                    format_cents(account.balance),
                    account.currency
                );
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(id).await?;
            if json {
                print_json(&account)?;
            } else {
                println!("Account: {}", account.id);
                println!("  Owner:    {}", account.owner);
                println!("  Balance:  {} {}", format_cents(account.balance), account.currency);
                println!("  Created:  {}", account.created_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        AccountCommands::List { page, page_size } => {
            let accounts = service.list_accounts(Page::new(page, page_size)).await?;
            if json {
                print_json(&accounts)?;
            } else {
                print_accounts(&accounts);
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &BankService, json: bool) -> Result<()> {
    let report = service.check_integrity().await?;

    if json {
        print_json(&report)?;
    } else {
        println!("Checking ledger integrity...\n");
        println!("Accounts:  {}", report.account_count);
        println!("Entries:   {}", report.entry_count);
        println!("Transfers: {}", report.transfer_count);
        println!();

        if report.is_healthy() {
            println!("Ledger is consistent.");
        } else {
            println!("Issues found:");
            for drift in &report.drifted_accounts {
                println!(
                    "  - account {}: balance {} but entries sum to {}",
                    drift.account_id,
                    format_cents(drift.balance),
                    format_cents(drift.entry_sum)
                );
            }
            if report.invalid_amounts > 0 {
                println!(
                    "  - {} transfers with non-positive amounts",
                    report.invalid_amounts
                );
            }
        }
    }

    if !report.is_healthy() {
        anyhow::bail!("Ledger integrity check failed");
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_transfer_result(result: &TransferTxResult) {
    println!(
        "Transfer {}: {} from account {} to account {}",
        result.transfer.id,
        format_cents(result.transfer.amount),
        result.transfer.from_account_id,
        result.transfer.to_account_id
    );
    println!(
        "  Account {} balance: {} {}",
        result.from_account.id,
        format_cents(result.from_account.balance),
        result.from_account.currency
    );
    println!(
        "  Account {} balance: {} {}",
        result.to_account.id,
        format_cents(result.to_account.balance),
        result.to_account.currency
    );
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("No accounts found.");
        return;
    }
    println!("{:<8} {:<24} {:>14} {:<8}", "ID", "OWNER", "BALANCE", "CURRENCY");
    println!("{}", "-".repeat(57));
    for account in accounts {
        println!(
            "{:<8} {:<24} {:>14} {:<8}",
            account.id,
            account.owner,
            format_cents(account.balance),
            account.currency
        );
    }
}

fn print_transfers(transfers: &[Transfer]) {
    if transfers.is_empty() {
        println!("No transfers found.");
        return;
    }
    println!("{:<8} {:<8} {:<8} {:>14} {:<20}", "ID", "FROM", "TO", "AMOUNT", "CREATED");
    println!("{}", "-".repeat(62));
    for transfer in transfers {
        println!(
            "{:<8} {:<8} {:<8} {:>14} {:<20}",
            transfer.id,
            transfer.from_account_id,
            transfer.to_account_id,
            format_cents(transfer.amount),
            transfer.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No entries found.");
        return;
    }
    println!(
        "{:<8} {:<8} {:<6} {:>14} {:<20}",
        "ID", "ACCOUNT", "SIDE", "AMOUNT", "CREATED"
    );
    println!("{}", "-".repeat(60));
    for entry in entries {
        println!(
            "{:<8} {:<8} {:<6} {:>14} {:<20}",
            entry.id,
            entry.account_id,
            if entry.is_debit() { "debit" } else { "credit" },
            format_cents(entry.amount),
            entry.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transfer_command() {
        let cli = Cli::try_parse_from([
            "ledgerbank",
            "--database",
            "bank.db",
            "transfer",
            "12.50",
            "--from",
            "1",
            "--to",
            "2",
            "--currency",
            "USD",
        ])
        .unwrap();

        assert_eq!(cli.database, PathBuf::from("bank.db"));
        match cli.command {
            Commands::Transfer {
                amount,
                from,
                to,
                currency,
            } => {
                assert_eq!(amount, "12.50");
                assert_eq!(from, 1);
                assert_eq!(to, 2);
                assert_eq!(currency, "USD");
            }
            _ => panic!("expected transfer command"),
        }
    }

    #[test]
    fn test_config_from_flags() {
        let cli = Cli::try_parse_from([
            "ledgerbank",
            "--database",
            "bank.db",
            "--max-connections",
            "4",
            "--busy-timeout-secs",
            "2",
            "check",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.database, PathBuf::from("bank.db"));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.busy_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_connection_flags_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ledgerbank",
            "transfer",
            "5",
            "--from",
            "1",
            "--to",
            "2",
            "--currency",
            "EUR",
            "--database",
            "other.db",
            "--max-connections",
            "3",
            "--busy-timeout-secs",
            "7",
        ])
        .unwrap();

        let config = cli.config();
        assert_eq!(config.database, PathBuf::from("other.db"));
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.busy_timeout, Duration::from_secs(7));
    }
}
