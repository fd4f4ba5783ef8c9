pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod logging;
pub mod storage;

pub use application::{BankService, TransferEngine, TransferParams, TransferTxResult};
pub use config::Config;
pub use domain::*;
pub use storage::LedgerStore;
