//! Account Operations
//!
//! Opening, cash movements, statements and closing. Cash movements go
//! through `BalanceLedger` and record their transaction atomically.

use uuid::Uuid;

use crate::domain::{Account, AccountStatus, Amount, DomainError, Transaction};
use crate::error::AppResult;
use crate::ledger::BalanceLedger;
use crate::store::{AccountStore, LedgerStore, TransactionStore, UnitOfWork, UserStore};

use super::{CashCommand, CashResult, OpenAccountCommand};

#[derive(Debug, Clone)]
pub struct AccountOperations<S> {
    store: S,
    ledger: BalanceLedger,
}

impl<S: LedgerStore> AccountOperations<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ledger: BalanceLedger::new(),
        }
    }

    /// Open an empty ACTIVE account for an existing user
    pub async fn open(&self, command: OpenAccountCommand) -> AppResult<Account> {
        let mut tx = self.store.begin().await?;

        if !tx.user_exists(command.owner_id).await? {
            return Err(DomainError::UserNotFound(command.owner_id).into());
        }

        let account = Account::open(command.owner_id, command.account_type);
        tx.insert_account(&account).await?;
        tx.commit().await?;

        tracing::info!(account_id = %account.id, owner_id = %account.owner_id, "Account opened");
        Ok(account)
    }

    pub async fn account(&self, account_id: Uuid) -> AppResult<Account> {
        let mut tx = self.store.begin().await?;
        let account = tx.find_account(account_id).await?;
        tx.rollback().await?;

        Ok(account.ok_or(DomainError::AccountNotFound(account_id))?)
    }

    pub async fn deposit(&self, command: CashCommand) -> AppResult<CashResult> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;
        let mut tx = self.store.begin().await?;

        let new_balance = self.ledger.credit(&mut tx, command.account_id, &amount).await?;
        let transaction = Transaction::deposit(command.account_id, &amount, command.description);
        tx.insert_transaction(&transaction).await?;
        tx.commit().await?;

        tracing::info!(account_id = %command.account_id, "Deposit of {} booked", amount);
        Ok(CashResult {
            transaction,
            new_balance,
        })
    }

    pub async fn withdraw(&self, command: CashCommand) -> AppResult<CashResult> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;
        let mut tx = self.store.begin().await?;

        // The guarded update refuses overdrafts, so no separate pre-check
        let new_balance = self.ledger.debit(&mut tx, command.account_id, &amount).await?;
        let transaction = Transaction::withdrawal(command.account_id, &amount, command.description);
        tx.insert_transaction(&transaction).await?;
        tx.commit().await?;

        tracing::info!(account_id = %command.account_id, "Withdrawal of {} booked", amount);
        Ok(CashResult {
            transaction,
            new_balance,
        })
    }

    /// Transactions recorded against the account, newest first
    pub async fn statement(&self, account_id: Uuid) -> AppResult<Vec<Transaction>> {
        let mut tx = self.store.begin().await?;
        if tx.find_account(account_id).await?.is_none() {
            return Err(DomainError::AccountNotFound(account_id).into());
        }
        let transactions = tx.transactions_for_account(account_id).await?;
        tx.rollback().await?;

        Ok(transactions)
    }

    /// Soft-delete an account. Refused once any transaction references it.
    pub async fn close(&self, account_id: Uuid) -> AppResult<Account> {
        let mut tx = self.store.begin().await?;

        let mut account = tx
            .lock_account(account_id)
            .await?
            .ok_or(DomainError::AccountNotFound(account_id))?;

        if tx.account_has_transactions(account_id).await? {
            return Err(DomainError::AccountHasTransactions(account_id).into());
        }

        if account.is_active() {
            tx.set_account_status(account_id, AccountStatus::Inactive).await?;
            account.status = AccountStatus::Inactive;
        }
        tx.commit().await?;

        tracing::info!(account_id = %account_id, "Account closed");
        Ok(account)
    }
}
