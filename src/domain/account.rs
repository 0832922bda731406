//! Account record
//!
//! Balances are never mutated here; every change goes through
//! `BalanceLedger`, which pushes the arithmetic into the store.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::amount::Amount;

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
        }
    }
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "INACTIVE" => Ok(AccountStatus::Inactive),
            other => Err(format!("unknown account status '{}'", other)),
        }
    }
}

/// Account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Checking,
    Savings,
    Investment,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "CHECKING",
            AccountType::Savings => "SAVINGS",
            AccountType::Investment => "INVESTMENT",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHECKING" => Ok(AccountType::Checking),
            "SAVINGS" => Ok(AccountType::Savings),
            "INVESTMENT" => Ok(AccountType::Investment),
            other => Err(format!("unknown account type '{}'", other)),
        }
    }
}

/// A money account owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub balance: Decimal,
    pub status: AccountStatus,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new, empty, active account
    pub fn open(owner_id: Uuid, account_type: AccountType) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            balance: Decimal::new(0, 2),
            status: AccountStatus::Active,
            account_type,
            created_at: Utc::now(),
        }
    }

    /// Seed an account with an opening balance
    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Check if the balance covers a withdrawal of `amount`
    pub fn can_cover(&self, amount: &Amount) -> bool {
        self.balance >= amount.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_account() {
        let owner = Uuid::new_v4();
        let account = Account::open(owner, AccountType::Checking);

        assert_eq!(account.owner_id, owner);
        assert!(account.is_active());
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[test]
    fn test_can_cover() {
        let account = Account::open(Uuid::new_v4(), AccountType::Checking).with_balance(dec!(50));

        assert!(account.can_cover(&Amount::new(dec!(50)).unwrap()));
        assert!(!account.can_cover(&Amount::new(dec!(50.01)).unwrap()));
    }

    #[test]
    fn test_status_round_trips_through_text() {
        assert_eq!("INACTIVE".parse::<AccountStatus>(), Ok(AccountStatus::Inactive));
        assert_eq!(AccountStatus::Active.to_string(), "ACTIVE");
        assert!("FROZEN".parse::<AccountStatus>().is_err());
    }
}
