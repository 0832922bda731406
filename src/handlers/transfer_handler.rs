//! Transfer Coordinator
//!
//! Moves funds between two accounts as one atomic unit: two balance
//! adjustments and two linked transaction rows, or nothing at all.

use uuid::Uuid;

use crate::domain::{Account, Amount, DomainError, Transaction, Transfer};
use crate::error::AppResult;
use crate::ledger::BalanceLedger;
use crate::store::{AccountStore, LedgerStore, TransactionStore, UnitOfWork, UserStore};

use super::{TransferCommand, TransferDestination, TransferResult};

/// Coordinator for instant account-to-account transfers
#[derive(Debug, Clone)]
pub struct TransferCoordinator<S> {
    store: S,
    ledger: BalanceLedger,
}

impl<S: LedgerStore> TransferCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ledger: BalanceLedger::new(),
        }
    }

    /// Execute the transfer command
    pub async fn transfer(&self, command: TransferCommand) -> AppResult<TransferResult> {
        let source_account_id = command.source_account_id;
        let result = self.execute(command).await;

        match &result {
            Ok(done) => tracing::info!(
                transfer_id = %done.transfer_id,
                "Transfer completed: {} -> {} ({})",
                done.source_account_id,
                done.destination_account_id,
                done.amount
            ),
            Err(e) if e.is_client_error() => {
                tracing::warn!(source_account_id = %source_account_id, "Transfer rejected: {}", e)
            }
            Err(e) => {
                tracing::error!(source_account_id = %source_account_id, "Transfer failed: {:?}", e)
            }
        }

        result
    }

    async fn execute(&self, command: TransferCommand) -> AppResult<TransferResult> {
        let amount = Amount::new(command.amount).map_err(DomainError::from)?;

        // Any early return drops `tx`, which rolls back
        let mut tx = self.store.begin().await?;

        let source_id = command.source_account_id;
        let destination_id = match command.destination {
            TransferDestination::Account(id) => id,
            TransferDestination::User(user_id) => resolve_user_account(&mut tx, user_id).await?.id,
        };

        if source_id == destination_id {
            return Err(DomainError::SameAccount.into());
        }

        // Lock both rows in a fixed order so opposing transfers cannot deadlock
        let (source, destination) = if source_id < destination_id {
            let source = tx.lock_account(source_id).await?;
            let destination = tx.lock_account(destination_id).await?;
            (source, destination)
        } else {
            let destination = tx.lock_account(destination_id).await?;
            let source = tx.lock_account(source_id).await?;
            (source, destination)
        };

        let source = source.ok_or(DomainError::AccountNotFound(source_id))?;
        if !source.is_active() {
            return Err(DomainError::InactiveAccount(source_id).into());
        }
        if !source.can_cover(&amount) {
            return Err(DomainError::insufficient_funds(amount.value(), source.balance).into());
        }

        let destination = destination.ok_or(DomainError::AccountNotFound(destination_id))?;
        if !destination.is_active() {
            return Err(DomainError::InactiveAccount(destination_id).into());
        }

        let new_source_balance = self.ledger.debit(&mut tx, source_id, &amount).await?;
        self.ledger.credit(&mut tx, destination_id, &amount).await?;

        let transfer_id = Uuid::new_v4();
        let (outgoing, incoming) = Transaction::transfer_pair(
            transfer_id,
            source_id,
            destination_id,
            &amount,
            command.description,
        );
        let transaction_id = tx.insert_transaction(&outgoing).await?;
        tx.insert_transaction(&incoming).await?;

        tx.commit().await?;

        Ok(TransferResult {
            transaction_id,
            transfer_id,
            source_account_id: source_id,
            destination_account_id: destination_id,
            amount: amount.value(),
            new_source_balance,
        })
    }

    /// Load a transfer as one aggregate of its two postings
    pub async fn find_transfer(&self, transfer_id: Uuid) -> AppResult<Transfer> {
        let mut tx = self.store.begin().await?;
        let rows = tx.transactions_for_transfer(transfer_id).await?;
        tx.rollback().await?;

        Ok(Transfer::from_rows(transfer_id, &rows)?)
    }
}

/// user_id → first ACTIVE account
async fn resolve_user_account<T>(tx: &mut T, user_id: Uuid) -> AppResult<Account>
where
    T: AccountStore + UserStore,
{
    if !tx.user_exists(user_id).await? {
        return Err(DomainError::UserNotFound(user_id).into());
    }

    let account = tx
        .first_active_account(user_id)
        .await?
        .ok_or(DomainError::NoActiveAccount(user_id))?;

    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transfer_command() {
        let cmd = TransferCommand::to_account(Uuid::new_v4(), Uuid::new_v4(), dec!(100.00))
            .with_description("Rent split");

        assert_eq!(cmd.amount, dec!(100.00));
        assert_eq!(cmd.description.as_deref(), Some("Rent split"));
        assert!(matches!(cmd.destination, TransferDestination::Account(_)));
    }

    #[test]
    fn test_transfer_destination_serde() {
        let user = Uuid::nil();
        let json = serde_json::to_value(TransferDestination::User(user)).unwrap();
        assert_eq!(json["kind"], "user");
    }
}
