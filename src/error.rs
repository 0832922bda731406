//! Error handling module
//!
//! Centralized error type returned by every orchestrator, with stable error
//! codes for the presentation layer.

use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl AppError {
    /// The domain error behind this failure, if any
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            AppError::Domain(err) => Some(err),
            _ => None,
        }
    }

    /// Machine-readable code, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Domain(err) => match err {
                DomainError::Validation(_) => "validation_error",
                DomainError::Overflow(_) => "overflow",
                DomainError::AccountNotFound(_) => "account_not_found",
                DomainError::NoActiveAccount(_) => "no_active_account",
                DomainError::UserNotFound(_) => "user_not_found",
                DomainError::BillNotFound(_) => "bill_not_found",
                DomainError::TransferNotFound(_) => "transfer_not_found",
                DomainError::PositionNotFound { .. } => "position_not_found",
                DomainError::InsufficientFunds { .. } => "insufficient_funds",
                DomainError::InsufficientQuantity { .. } => "insufficient_quantity",
                DomainError::AlreadyPaid(_) => "already_paid",
                DomainError::InactiveAccount(_) => "inactive_account",
                DomainError::SameAccount => "same_account",
                DomainError::AccountHasTransactions(_) => "account_has_transactions",
                DomainError::InternalInvariant(_) => "internal_invariant",
            },
            AppError::Store(_) => "storage_error",
            AppError::Config(_) => "config_error",
        }
    }

    /// Whether the caller can fix the request. Everything else is on us.
    pub fn is_client_error(&self) -> bool {
        self.domain().map_or(false, DomainError::is_client_error)
    }
}

/// Error body handed to the presentation layer
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        // Server-side faults are logged in full but not echoed back
        let details = if err.is_client_error() {
            Some(err.to_string())
        } else {
            tracing::error!("Ledger fault: {:?}", err);
            None
        };

        let error = if err.is_client_error() {
            "Request rejected".to_string()
        } else {
            "Internal error".to_string()
        };

        Self {
            error,
            error_code: err.error_code().to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_codes() {
        let err = AppError::from(DomainError::AlreadyPaid(Uuid::nil()));
        assert_eq!(err.error_code(), "already_paid");
        assert!(err.is_client_error());

        let err = AppError::from(DomainError::InternalInvariant("bad".to_string()));
        assert_eq!(err.error_code(), "internal_invariant");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_error_response_hides_server_faults() {
        let err = AppError::from(StoreError::corrupt("accounts", "unknown status"));
        let body = ErrorResponse::from(&err);
        assert_eq!(body.error_code, "storage_error");
        assert!(body.details.is_none());

        let err = AppError::from(DomainError::SameAccount);
        let body = ErrorResponse::from(&err);
        assert_eq!(body.error_code, "same_account");
        assert!(body.details.unwrap().contains("same account"));
    }

    #[test]
    fn test_error_response_serializes() {
        let err = AppError::from(DomainError::SameAccount);
        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(json["error_code"], "same_account");
    }
}
