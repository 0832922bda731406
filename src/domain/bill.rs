//! Bill (boleto) record
//!
//! A bill's status is a projection of `(due_date, paid_at, today)` and is
//! computed where it is read, never stored as independent state.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::amount::Amount;
use super::error::DomainError;
use super::line_code::{self, LineCode, LineCodeFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Open,
    Overdue,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Open => "OPEN",
            BillStatus::Overdue => "OVERDUE",
            BillStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(BillStatus::Open),
            "OVERDUE" => Ok(BillStatus::Overdue),
            "PAID" => Ok(BillStatus::Paid),
            other => Err(format!("unknown bill status '{}'", other)),
        }
    }
}

/// Status of a bill on a given day.
///
/// Paid bills stay paid. Unpaid bills are overdue from their due date on.
pub fn derive_status(due_date: NaiveDate, paid: bool, today: NaiveDate) -> BillStatus {
    if paid {
        BillStatus::Paid
    } else if due_date <= today {
        BillStatus::Overdue
    } else {
        BillStatus::Open
    }
}

/// Input for issuing a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBill {
    pub title: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub bank_code: String,
    pub wallet_code: String,
    pub our_number: String,
    pub owner_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub title: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub bank_code: String,
    pub wallet_code: String,
    pub our_number: String,
    pub line_code: LineCode,
    pub owner_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Validate the input and compute the settlement line.
    pub fn issue(input: NewBill) -> Result<Self, DomainError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title must not be empty"));
        }

        let amount = Amount::new(input.amount)?;

        let line_code = line_code::encode(&LineCodeFields {
            bank_code: &input.bank_code,
            wallet_code: &input.wallet_code,
            our_number: &input.our_number,
            due_date: input.due_date,
            amount: amount.value(),
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            amount: amount.value(),
            due_date: input.due_date,
            bank_code: input.bank_code.trim().to_string(),
            wallet_code: input.wallet_code.trim().to_string(),
            our_number: input.our_number.trim().to_string(),
            line_code,
            owner_id: input.owner_id,
            paid_at: None,
            created_at: Utc::now(),
        })
    }

    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }

    pub fn status_on(&self, today: NaiveDate) -> BillStatus {
        derive_status(self.due_date, self.is_paid(), today)
    }

    /// Status as of the current UTC day
    pub fn status(&self) -> BillStatus {
        self.status_on(Utc::now().date_naive())
    }

    /// The one permitted mutation: OPEN/OVERDUE to PAID.
    pub fn mark_paid(&mut self, paid_at: DateTime<Utc>) -> Result<(), DomainError> {
        if self.is_paid() {
            return Err(DomainError::AlreadyPaid(self.id));
        }
        self.paid_at = Some(paid_at);
        Ok(())
    }
}
