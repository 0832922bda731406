//! Storage contracts
//!
//! The ledger core talks to storage only through these traits. All mutating
//! work happens inside a `UnitOfWork` obtained from `LedgerStore::begin`:
//! it owns one connection for its lifetime, `commit` makes its effects
//! visible, and dropping it without committing rolls everything back.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Account, AccountStatus, Bill, Position, Trade, Transaction};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back to a domain record
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            reason: reason.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AccountStore: Send {
    async fn find_account(&mut self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Like `find_account`, but the row stays locked against concurrent
    /// writers until the unit of work ends.
    async fn lock_account(&mut self, id: Uuid) -> StoreResult<Option<Account>>;

    /// The user's oldest ACTIVE account, if any
    async fn first_active_account(&mut self, owner_id: Uuid) -> StoreResult<Option<Account>>;

    async fn insert_account(&mut self, account: &Account) -> StoreResult<()>;

    async fn set_account_status(&mut self, id: Uuid, status: AccountStatus) -> StoreResult<u64>;

    /// `balance = balance + delta` for an ACTIVE account whose resulting
    /// balance stays non-negative, evaluated by the store in one statement.
    /// Returns the number of rows affected.
    async fn adjust_balance(&mut self, id: Uuid, delta: Decimal) -> StoreResult<u64>;
}

/// Append-only: there is deliberately no update or delete.
#[async_trait]
pub trait TransactionStore: Send {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> StoreResult<Uuid>;

    /// Rows where the account is the source, newest first
    async fn transactions_for_account(&mut self, account_id: Uuid) -> StoreResult<Vec<Transaction>>;

    async fn transactions_for_transfer(&mut self, transfer_id: Uuid) -> StoreResult<Vec<Transaction>>;

    /// Whether any row references the account in either role
    async fn account_has_transactions(&mut self, account_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait BillStore: Send {
    async fn insert_bill(&mut self, bill: &Bill) -> StoreResult<()>;

    async fn find_bill(&mut self, id: Uuid) -> StoreResult<Option<Bill>>;

    /// Read the bill and hold its row lock until the unit of work ends
    async fn lock_bill(&mut self, id: Uuid) -> StoreResult<Option<Bill>>;

    /// Persist the paid state. Only matches a bill that is not yet paid.
    async fn mark_bill_paid(&mut self, bill: &Bill) -> StoreResult<u64>;

    async fn bills_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<Bill>>;
}

#[async_trait]
pub trait PositionStore: Send {
    async fn find_position(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Option<Position>>;

    /// Read the position under a row lock held until the unit of work ends.
    /// A pair without a row gets an empty one first, so concurrent first
    /// trades queue on the same lock.
    async fn lock_position(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Position>;

    async fn upsert_position(&mut self, position: &Position) -> StoreResult<()>;

    async fn insert_trade(&mut self, trade: &Trade) -> StoreResult<Uuid>;

    /// Trades for a (user, asset) pair, oldest first
    async fn trades_for(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Vec<Trade>>;
}

#[async_trait]
pub trait UserStore: Send {
    async fn user_exists(&mut self, id: Uuid) -> StoreResult<bool>;
}

/// A scoped atomic unit of work over every store
#[async_trait]
pub trait UnitOfWork:
    AccountStore + TransactionStore + BillStore + PositionStore + UserStore + Sized
{
    async fn commit(self) -> StoreResult<()>;

    /// Explicit rollback. Dropping the unit of work has the same effect.
    async fn rollback(self) -> StoreResult<()>;
}

/// Entry point handed to the orchestrators
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: UnitOfWork;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}
