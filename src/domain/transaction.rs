//! Transaction records and transfer postings
//!
//! Transactions are immutable once inserted. A transfer is stored as two
//! rows that share a `transfer_id`, one per leg, and is read back as a
//! single `Transfer` aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::amount::Amount;
use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Payment,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Transfer => "TRANSFER",
        }
    }

    fn default_description(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::Payment => "Bill payment",
            TransactionType::Transfer => "Transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "PAYMENT" => Ok(TransactionType::Payment),
            "TRANSFER" => Ok(TransactionType::Transfer),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

/// Which side of a transfer a row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostingLeg {
    Debit,
    Credit,
}

impl PostingLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingLeg::Debit => "DEBIT",
            PostingLeg::Credit => "CREDIT",
        }
    }
}

impl FromStr for PostingLeg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBIT" => Ok(PostingLeg::Debit),
            "CREDIT" => Ok(PostingLeg::Credit),
            other => Err(format!("unknown posting leg '{}'", other)),
        }
    }
}

/// An immutable ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub source_account_id: Uuid,
    pub destination_account_id: Option<Uuid>,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: String,
    /// Shared by both rows of a transfer
    pub transfer_id: Option<Uuid>,
    pub leg: Option<PostingLeg>,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    fn record(
        transaction_type: TransactionType,
        source_account_id: Uuid,
        destination_account_id: Option<Uuid>,
        amount: &Amount,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| transaction_type.default_description().to_string());

        Self {
            id: Uuid::new_v4(),
            source_account_id,
            destination_account_id,
            amount: amount.value(),
            transaction_type,
            description,
            transfer_id: None,
            leg: None,
            transaction_date: now,
            created_at: now,
        }
    }

    pub fn deposit(account_id: Uuid, amount: &Amount, description: Option<String>) -> Self {
        Self::record(TransactionType::Deposit, account_id, None, amount, description)
    }

    pub fn withdrawal(account_id: Uuid, amount: &Amount, description: Option<String>) -> Self {
        Self::record(TransactionType::Withdrawal, account_id, None, amount, description)
    }

    pub fn payment(account_id: Uuid, amount: &Amount, description: Option<String>) -> Self {
        Self::record(TransactionType::Payment, account_id, None, amount, description)
    }

    /// Build both rows of a transfer: the outgoing TRANSFER (debit leg) and
    /// the mirrored incoming DEPOSIT (credit leg) with account roles swapped.
    pub fn transfer_pair(
        transfer_id: Uuid,
        source_account_id: Uuid,
        destination_account_id: Uuid,
        amount: &Amount,
        description: Option<String>,
    ) -> (Self, Self) {
        let mut outgoing = Self::record(
            TransactionType::Transfer,
            source_account_id,
            Some(destination_account_id),
            amount,
            description,
        );
        outgoing.transfer_id = Some(transfer_id);
        outgoing.leg = Some(PostingLeg::Debit);

        let mut incoming = outgoing.clone();
        incoming.id = Uuid::new_v4();
        incoming.transaction_type = TransactionType::Deposit;
        incoming.source_account_id = destination_account_id;
        incoming.destination_account_id = Some(source_account_id);
        incoming.leg = Some(PostingLeg::Credit);

        (outgoing, incoming)
    }
}

/// One leg of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub counterparty_account_id: Uuid,
    pub amount: Decimal,
    pub leg: PostingLeg,
}

impl Posting {
    /// Signed effect of this posting on its account's balance
    pub fn signed_amount(&self) -> Decimal {
        match self.leg {
            PostingLeg::Debit => -self.amount,
            PostingLeg::Credit => self.amount,
        }
    }
}

/// A transfer read back as one aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub debit: Posting,
    pub credit: Posting,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Assemble a transfer from its stored rows.
    ///
    /// Exactly one debit and one credit row must exist, for the same amount,
    /// with mirrored account roles. Anything else means the stored history
    /// is inconsistent.
    pub fn from_rows(transfer_id: Uuid, rows: &[Transaction]) -> Result<Self, DomainError> {
        let leg_of = |leg: PostingLeg| {
            let mut matching = rows.iter().filter(|t| t.leg == Some(leg));
            match (matching.next(), matching.next()) {
                (Some(row), None) => Ok(row),
                _ => Err(DomainError::InternalInvariant(format!(
                    "transfer {} does not have exactly one {} leg",
                    transfer_id,
                    leg.as_str()
                ))),
            }
        };

        if rows.is_empty() {
            return Err(DomainError::TransferNotFound(transfer_id));
        }

        let debit_row = leg_of(PostingLeg::Debit)?;
        let credit_row = leg_of(PostingLeg::Credit)?;

        let mirrored = debit_row.destination_account_id == Some(credit_row.source_account_id)
            && credit_row.destination_account_id == Some(debit_row.source_account_id);
        if debit_row.amount != credit_row.amount || !mirrored {
            return Err(DomainError::InternalInvariant(format!(
                "transfer {} legs do not mirror each other",
                transfer_id
            )));
        }

        let posting = |row: &Transaction, leg: PostingLeg| Posting {
            transaction_id: row.id,
            account_id: row.source_account_id,
            counterparty_account_id: row.destination_account_id.unwrap_or_default(),
            amount: row.amount,
            leg,
        };

        Ok(Self {
            id: transfer_id,
            debit: posting(debit_row, PostingLeg::Debit),
            credit: posting(credit_row, PostingLeg::Credit),
            description: debit_row.description.clone(),
            created_at: debit_row.created_at,
        })
    }
}
