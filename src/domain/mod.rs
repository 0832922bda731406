//! Domain module
//!
//! Core domain types and business logic.

pub mod account;
pub mod amount;
pub mod bill;
pub mod error;
pub mod line_code;
pub mod position;
pub mod transaction;

pub use account::{Account, AccountStatus, AccountType};
pub use amount::{Amount, AmountError};
pub use bill::{derive_status, Bill, BillStatus, NewBill};
pub use error::DomainError;
pub use line_code::{LineCode, LineCodeError, LineCodeFields};
pub use position::{Position, Trade, TradeType};
pub use transaction::{Posting, PostingLeg, Transaction, TransactionType, Transfer};
