//! ledger_core
//!
//! Account balances, transfers, bill settlement and investment positions
//! over a transactional store.

pub mod config;
pub mod db;
pub mod domain;
mod error;
pub mod handlers;
pub mod ledger;
pub mod store;

pub use config::{Config, ConfigError, LogFormat};
pub use domain::{Amount, AmountError, DomainError};
pub use error::{AppError, AppResult, ErrorResponse};
pub use ledger::BalanceLedger;
pub use store::{LedgerStore, MemoryLedgerStore, PgLedgerStore, StoreError, UnitOfWork};
