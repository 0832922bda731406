//! Command definitions
//!
//! Commands represent intentions to change the ledger. Results are plain
//! records handed back to the presentation layer.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountType, Bill, NewBill, Position, Trade, TradeType, Transaction};

// =========================================================================
// Transfers
// =========================================================================

/// Where a transfer lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TransferDestination {
    Account(Uuid),
    /// Resolved to the user's first ACTIVE account
    User(Uuid),
}

/// Command to move funds between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub source_account_id: Uuid,
    pub destination: TransferDestination,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl TransferCommand {
    pub fn to_account(source_account_id: Uuid, destination_account_id: Uuid, amount: Decimal) -> Self {
        Self {
            source_account_id,
            destination: TransferDestination::Account(destination_account_id),
            amount,
            description: None,
        }
    }

    pub fn to_user(source_account_id: Uuid, destination_user_id: Uuid, amount: Decimal) -> Self {
        Self {
            source_account_id,
            destination: TransferDestination::User(destination_user_id),
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Result of a successful transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Id of the outgoing (debit) transaction row
    pub transaction_id: Uuid,
    pub transfer_id: Uuid,
    pub source_account_id: Uuid,
    pub destination_account_id: Uuid,
    pub amount: Decimal,
    pub new_source_balance: Decimal,
}

// =========================================================================
// Bills
// =========================================================================

/// Command to issue a bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBillCommand {
    pub title: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub bank_code: String,
    pub wallet_code: String,
    pub our_number: String,
    pub owner_id: Option<Uuid>,
}

impl CreateBillCommand {
    pub fn new(
        title: impl Into<String>,
        amount: Decimal,
        due_date: NaiveDate,
        bank_code: impl Into<String>,
        wallet_code: impl Into<String>,
        our_number: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            amount,
            due_date,
            bank_code: bank_code.into(),
            wallet_code: wallet_code.into(),
            our_number: our_number.into(),
            owner_id: None,
        }
    }

    pub fn owned_by(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }
}

impl From<CreateBillCommand> for NewBill {
    fn from(cmd: CreateBillCommand) -> Self {
        NewBill {
            title: cmd.title,
            amount: cmd.amount,
            due_date: cmd.due_date,
            bank_code: cmd.bank_code,
            wallet_code: cmd.wallet_code,
            our_number: cmd.our_number,
            owner_id: cmd.owner_id,
        }
    }
}

/// Command to settle a bill from an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayBillCommand {
    pub bill_id: Uuid,
    pub paying_account_id: Uuid,
    pub description: Option<String>,
}

impl PayBillCommand {
    pub fn new(bill_id: Uuid, paying_account_id: Uuid) -> Self {
        Self {
            bill_id,
            paying_account_id,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayBillResult {
    pub bill: Bill,
    pub transaction: Transaction,
    pub new_balance: Decimal,
}

// =========================================================================
// Positions
// =========================================================================

/// Command to record a buy or sell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCommand {
    pub user_id: Uuid,
    pub asset_id: Uuid,
    pub trade_type: TradeType,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl TradeCommand {
    pub fn buy(user_id: Uuid, asset_id: Uuid, price: Decimal, quantity: Decimal) -> Self {
        Self {
            user_id,
            asset_id,
            trade_type: TradeType::Buy,
            price,
            quantity,
        }
    }

    pub fn sell(user_id: Uuid, asset_id: Uuid, price: Decimal, quantity: Decimal) -> Self {
        Self {
            user_id,
            asset_id,
            trade_type: TradeType::Sell,
            price,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub trade: Trade,
    pub position: Position,
}

// =========================================================================
// Accounts
// =========================================================================

/// Command to open an account for an existing user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccountCommand {
    pub owner_id: Uuid,
    pub account_type: AccountType,
}

/// Command for a deposit or a withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashCommand {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
}

impl CashCommand {
    pub fn new(account_id: Uuid, amount: Decimal) -> Self {
        Self {
            account_id,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashResult {
    pub transaction: Transaction,
    pub new_balance: Decimal,
}
