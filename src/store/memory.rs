//! In-memory adapter
//!
//! `begin` takes the store-wide lock and works on a private copy of the
//! state; `commit` swaps the copy in, dropping the unit of work discards
//! it. Units of work are therefore fully serialized.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{Account, AccountStatus, Bill, Position, Trade, Transaction};

use super::{
    AccountStore, BillStore, LedgerStore, PositionStore, StoreResult, TransactionStore,
    UnitOfWork, UserStore,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashSet<Uuid>,
    accounts: BTreeMap<Uuid, Account>,
    transactions: Vec<Transaction>,
    bills: HashMap<Uuid, Bill>,
    positions: HashMap<(Uuid, Uuid), Position>,
    trades: Vec<Trade>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user id
    pub async fn add_user(&self, user_id: Uuid) {
        self.state.lock().await.users.insert(user_id);
    }

    /// Seed an account directly, bypassing the ledger
    pub async fn add_account(&self, account: Account) {
        let mut state = self.state.lock().await;
        state.users.insert(account.owner_id);
        state.accounts.insert(account.id, account);
    }

    /// Committed view of an account
    pub async fn account(&self, id: Uuid) -> Option<Account> {
        self.state.lock().await.accounts.get(&id).cloned()
    }

    /// Committed number of transaction rows
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> StoreResult<MemoryUnitOfWork> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryUnitOfWork { guard, working })
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> StoreResult<()> {
        let MemoryUnitOfWork { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryUnitOfWork {
    async fn find_account(&mut self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.working.accounts.get(&id).cloned())
    }

    async fn lock_account(&mut self, id: Uuid) -> StoreResult<Option<Account>> {
        self.find_account(id).await
    }

    async fn first_active_account(&mut self, owner_id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self
            .working
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id && a.is_active())
            .min_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn insert_account(&mut self, account: &Account) -> StoreResult<()> {
        self.working.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn set_account_status(&mut self, id: Uuid, status: AccountStatus) -> StoreResult<u64> {
        Ok(match self.working.accounts.get_mut(&id) {
            Some(account) => {
                account.status = status;
                1
            }
            None => 0,
        })
    }

    async fn adjust_balance(&mut self, id: Uuid, delta: Decimal) -> StoreResult<u64> {
        Ok(match self.working.accounts.get_mut(&id) {
            Some(account) if account.is_active() && account.balance + delta >= Decimal::ZERO => {
                account.balance += delta;
                1
            }
            _ => 0,
        })
    }
}

#[async_trait]
impl TransactionStore for MemoryUnitOfWork {
    async fn insert_transaction(&mut self, transaction: &Transaction) -> StoreResult<Uuid> {
        self.working.transactions.push(transaction.clone());
        Ok(transaction.id)
    }

    async fn transactions_for_account(&mut self, account_id: Uuid) -> StoreResult<Vec<Transaction>> {
        // Insertion order is chronological, so reverse for newest first
        Ok(self
            .working
            .transactions
            .iter()
            .rev()
            .filter(|t| t.source_account_id == account_id)
            .cloned()
            .collect())
    }

    async fn transactions_for_transfer(&mut self, transfer_id: Uuid) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .working
            .transactions
            .iter()
            .filter(|t| t.transfer_id == Some(transfer_id))
            .cloned()
            .collect())
    }

    async fn account_has_transactions(&mut self, account_id: Uuid) -> StoreResult<bool> {
        Ok(self.working.transactions.iter().any(|t| {
            t.source_account_id == account_id || t.destination_account_id == Some(account_id)
        }))
    }
}

#[async_trait]
impl BillStore for MemoryUnitOfWork {
    async fn insert_bill(&mut self, bill: &Bill) -> StoreResult<()> {
        self.working.bills.insert(bill.id, bill.clone());
        Ok(())
    }

    async fn find_bill(&mut self, id: Uuid) -> StoreResult<Option<Bill>> {
        Ok(self.working.bills.get(&id).cloned())
    }

    async fn lock_bill(&mut self, id: Uuid) -> StoreResult<Option<Bill>> {
        self.find_bill(id).await
    }

    async fn mark_bill_paid(&mut self, bill: &Bill) -> StoreResult<u64> {
        Ok(match self.working.bills.get_mut(&bill.id) {
            Some(stored) if stored.paid_at.is_none() => {
                stored.paid_at = bill.paid_at;
                1
            }
            _ => 0,
        })
    }

    async fn bills_for_owner(&mut self, owner_id: Uuid) -> StoreResult<Vec<Bill>> {
        let mut bills: Vec<Bill> = self
            .working
            .bills
            .values()
            .filter(|b| b.owner_id == Some(owner_id))
            .cloned()
            .collect();
        bills.sort_by_key(|b| (b.due_date, b.created_at));
        Ok(bills)
    }
}

#[async_trait]
impl PositionStore for MemoryUnitOfWork {
    async fn find_position(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Option<Position>> {
        Ok(self.working.positions.get(&(user_id, asset_id)).cloned())
    }

    async fn lock_position(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Position> {
        Ok(self
            .working
            .positions
            .entry((user_id, asset_id))
            .or_insert_with(|| Position::empty(user_id, asset_id))
            .clone())
    }

    async fn upsert_position(&mut self, position: &Position) -> StoreResult<()> {
        self.working
            .positions
            .insert((position.user_id, position.asset_id), position.clone());
        Ok(())
    }

    async fn insert_trade(&mut self, trade: &Trade) -> StoreResult<Uuid> {
        self.working.trades.push(trade.clone());
        Ok(trade.id)
    }

    async fn trades_for(&mut self, user_id: Uuid, asset_id: Uuid) -> StoreResult<Vec<Trade>> {
        Ok(self
            .working
            .trades
            .iter()
            .filter(|t| t.user_id == user_id && t.asset_id == asset_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryUnitOfWork {
    async fn user_exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.working.users.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountType;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_dropped_unit_of_work_rolls_back() {
        let store = MemoryLedgerStore::new();
        let account = Account::open(Uuid::new_v4(), AccountType::Checking).with_balance(dec!(10));
        let id = account.id;
        store.add_account(account).await;

        {
            let mut tx = store.begin().await.unwrap();
            assert_eq!(tx.adjust_balance(id, dec!(5)).await.unwrap(), 1);
        }

        assert_eq!(store.account(id).await.unwrap().balance, dec!(10));
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryLedgerStore::new();
        let account = Account::open(Uuid::new_v4(), AccountType::Checking).with_balance(dec!(10));
        let id = account.id;
        store.add_account(account).await;

        let mut tx = store.begin().await.unwrap();
        tx.adjust_balance(id, dec!(-4)).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.account(id).await.unwrap().balance, dec!(6));
    }

    #[tokio::test]
    async fn test_adjust_refuses_negative_and_inactive() {
        let store = MemoryLedgerStore::new();
        let mut inactive = Account::open(Uuid::new_v4(), AccountType::Checking).with_balance(dec!(10));
        inactive.status = AccountStatus::Inactive;
        let active = Account::open(Uuid::new_v4(), AccountType::Checking).with_balance(dec!(10));
        let (inactive_id, active_id) = (inactive.id, active.id);
        store.add_account(inactive).await;
        store.add_account(active).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.adjust_balance(inactive_id, dec!(1)).await.unwrap(), 0);
        assert_eq!(tx.adjust_balance(active_id, dec!(-10.01)).await.unwrap(), 0);
        assert_eq!(tx.adjust_balance(active_id, dec!(-10)).await.unwrap(), 1);
        assert_eq!(tx.adjust_balance(Uuid::new_v4(), dec!(1)).await.unwrap(), 0);
    }
}
