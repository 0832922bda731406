//! Balance Ledger
//!
//! The single choke point for balance mutation. Every change is one
//! conditional UPDATE executed by the store inside the caller's unit of
//! work; no read-modify-write happens in application memory.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{Amount, DomainError};
use crate::error::AppResult;
use crate::store::AccountStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceLedger;

impl BalanceLedger {
    pub fn new() -> Self {
        Self
    }

    /// Apply a signed delta to an ACTIVE account and return its new balance.
    ///
    /// Fails when the account is missing, inactive, or would go negative.
    /// The caller must abandon its unit of work on error.
    pub async fn adjust<S>(&self, store: &mut S, account_id: Uuid, delta: Decimal) -> AppResult<Decimal>
    where
        S: AccountStore + ?Sized,
    {
        if delta.is_zero() {
            return Err(DomainError::validation("balance delta must be non-zero").into());
        }

        let rows_affected = store.adjust_balance(account_id, delta).await?;

        match rows_affected {
            1 => {
                let account = store.find_account(account_id).await?.ok_or_else(|| {
                    DomainError::InternalInvariant(format!(
                        "account {} vanished after balance update",
                        account_id
                    ))
                })?;

                tracing::debug!(
                    account_id = %account_id,
                    delta = %delta,
                    balance = %account.balance,
                    "Balance adjusted"
                );

                Ok(account.balance)
            }
            0 => Err(self.rejection(store, account_id, delta).await?.into()),
            n => Err(DomainError::InternalInvariant(format!(
                "balance update for {} touched {} rows",
                account_id, n
            ))
            .into()),
        }
    }

    pub async fn debit<S>(&self, store: &mut S, account_id: Uuid, amount: &Amount) -> AppResult<Decimal>
    where
        S: AccountStore + ?Sized,
    {
        self.adjust(store, account_id, amount.as_debit()).await
    }

    pub async fn credit<S>(&self, store: &mut S, account_id: Uuid, amount: &Amount) -> AppResult<Decimal>
    where
        S: AccountStore + ?Sized,
    {
        self.adjust(store, account_id, amount.as_credit()).await
    }

    /// Work out why the conditional update matched nothing
    async fn rejection<S>(&self, store: &mut S, account_id: Uuid, delta: Decimal) -> AppResult<DomainError>
    where
        S: AccountStore + ?Sized,
    {
        let err = match store.find_account(account_id).await? {
            None => DomainError::AccountNotFound(account_id),
            Some(account) if !account.is_active() => DomainError::InactiveAccount(account_id),
            Some(account) => DomainError::insufficient_funds(-delta, account.balance),
        };

        tracing::warn!(account_id = %account_id, delta = %delta, "Balance adjustment rejected: {}", err);
        Ok(err)
    }
}
