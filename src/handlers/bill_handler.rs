//! Bill Settlement
//!
//! Issues bills (line code + initial status) and settles them from an
//! account. Payment is the only transition a bill ever makes.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Amount, Bill, DomainError, Transaction};
use crate::error::AppResult;
use crate::ledger::BalanceLedger;
use crate::store::{AccountStore, BillStore, LedgerStore, TransactionStore, UnitOfWork, UserStore};

use super::{CreateBillCommand, PayBillCommand, PayBillResult};

#[derive(Debug, Clone)]
pub struct BillSettlement<S> {
    store: S,
    ledger: BalanceLedger,
}

impl<S: LedgerStore> BillSettlement<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ledger: BalanceLedger::new(),
        }
    }

    /// Validate, encode and persist a new bill
    pub async fn create(&self, command: CreateBillCommand) -> AppResult<Bill> {
        let bill = Bill::issue(command.into())?;

        let mut tx = self.store.begin().await?;

        if let Some(owner_id) = bill.owner_id {
            if !tx.user_exists(owner_id).await? {
                return Err(DomainError::UserNotFound(owner_id).into());
            }
        }

        tx.insert_bill(&bill).await?;
        tx.commit().await?;

        tracing::info!(
            bill_id = %bill.id,
            status = %bill.status(),
            "Bill issued: {} ({}) due {}",
            bill.title,
            bill.amount,
            bill.due_date
        );

        Ok(bill)
    }

    pub async fn find(&self, bill_id: Uuid) -> AppResult<Bill> {
        let mut tx = self.store.begin().await?;
        let bill = tx.find_bill(bill_id).await?;
        tx.rollback().await?;

        Ok(bill.ok_or(DomainError::BillNotFound(bill_id))?)
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<Bill>> {
        let mut tx = self.store.begin().await?;
        let bills = tx.bills_for_owner(owner_id).await?;
        tx.rollback().await?;

        Ok(bills)
    }

    /// Settle a bill from the paying account
    pub async fn pay(&self, command: PayBillCommand) -> AppResult<PayBillResult> {
        let bill_id = command.bill_id;
        let result = self.execute_payment(command).await;

        match &result {
            Ok(paid) => tracing::info!(
                bill_id = %bill_id,
                transaction_id = %paid.transaction.id,
                "Bill paid from {} ({}), new balance {}",
                paid.transaction.source_account_id,
                paid.transaction.amount,
                paid.new_balance
            ),
            Err(e) if e.is_client_error() => {
                tracing::warn!(bill_id = %bill_id, "Bill payment rejected: {}", e)
            }
            Err(e) => tracing::error!(bill_id = %bill_id, "Bill payment failed: {:?}", e),
        }

        result
    }

    async fn execute_payment(&self, command: PayBillCommand) -> AppResult<PayBillResult> {
        let mut tx = self.store.begin().await?;

        let mut bill = tx
            .lock_bill(command.bill_id)
            .await?
            .ok_or(DomainError::BillNotFound(command.bill_id))?;
        if bill.is_paid() {
            return Err(DomainError::AlreadyPaid(bill.id).into());
        }
        let amount = Amount::new(bill.amount).map_err(DomainError::from)?;

        let account_id = command.paying_account_id;
        let account = tx
            .lock_account(account_id)
            .await?
            .ok_or(DomainError::AccountNotFound(account_id))?;
        if !account.is_active() {
            return Err(DomainError::InactiveAccount(account_id).into());
        }
        if !account.can_cover(&amount) {
            return Err(DomainError::insufficient_funds(amount.value(), account.balance).into());
        }

        let new_balance = self.ledger.debit(&mut tx, account_id, &amount).await?;

        let description = command
            .description
            .or_else(|| Some(format!("Payment of bill {}", bill.title)));
        let transaction = Transaction::payment(account_id, &amount, description);
        tx.insert_transaction(&transaction).await?;

        bill.mark_paid(Utc::now())?;
        // Another settlement got there first despite the row lock
        if tx.mark_bill_paid(&bill).await? == 0 {
            return Err(DomainError::AlreadyPaid(bill.id).into());
        }

        tx.commit().await?;

        Ok(PayBillResult {
            bill,
            transaction,
            new_balance,
        })
    }
}
