//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::amount::AmountError;
use super::line_code::LineCodeError;

/// Business rule violations and invariant failures raised by the ledger core.
///
/// Every variant except `InternalInvariant` is a typed failure the caller is
/// expected to handle. The core never retries on its own.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Malformed input, rejected before any storage access
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A value exceeds the range its encoding can carry
    #[error("Value out of range: {0}")]
    Overflow(String),

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// No ACTIVE account could be resolved for a user
    #[error("No active account for user: {0}")]
    NoActiveAccount(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Bill not found: {0}")]
    BillNotFound(Uuid),

    #[error("Transfer not found: {0}")]
    TransferNotFound(Uuid),

    #[error("No position in asset {asset_id} for user {user_id}")]
    PositionNotFound { user_id: Uuid, asset_id: Uuid },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Insufficient quantity: requested {requested}, held {held}")]
    InsufficientQuantity { requested: Decimal, held: Decimal },

    #[error("Bill already paid: {0}")]
    AlreadyPaid(Uuid),

    #[error("Account is not active: {0}")]
    InactiveAccount(Uuid),

    #[error("Cannot transfer to the same account")]
    SameAccount,

    /// Closing an account that already has ledger history
    #[error("Account {0} has transactions and cannot be closed")]
    AccountHasTransactions(Uuid),

    /// A logic bug surfaced at runtime. Never corrected silently.
    #[error("Internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl DomainError {
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds { required, available }
    }

    pub fn insufficient_quantity(requested: Decimal, held: Decimal) -> Self {
        Self::InsufficientQuantity { requested, held }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound(_)
                | Self::NoActiveAccount(_)
                | Self::UserNotFound(_)
                | Self::BillNotFound(_)
                | Self::TransferNotFound(_)
                | Self::PositionNotFound { .. }
        )
    }

    /// Business-rule conflicts: the request was well formed but the current
    /// ledger state forbids it
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. }
                | Self::InsufficientQuantity { .. }
                | Self::AlreadyPaid(_)
                | Self::InactiveAccount(_)
                | Self::SameAccount
                | Self::AccountHasTransactions(_)
        )
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::InternalInvariant(_))
    }
}

impl From<AmountError> for DomainError {
    fn from(err: AmountError) -> Self {
        match err {
            AmountError::Overflow => Self::Overflow(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<LineCodeError> for DomainError {
    fn from(err: LineCodeError) -> Self {
        match err {
            LineCodeError::InvalidField { .. } => Self::Validation(err.to_string()),
            LineCodeError::AmountOverflow(_) => Self::Overflow(err.to_string()),
            LineCodeError::InvalidLength(_) => Self::InternalInvariant(err.to_string()),
        }
    }
}
