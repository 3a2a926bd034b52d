//! # Error Module
//!
//! The domain error taxonomy for the card/exchange core. Every failing
//! operation surfaces one of these variants with no partial side
//! effects; handlers map them onto the standard API envelope.
//!
//! | Variant | API code | HTTP status |
//! |---------|----------|-------------|
//! | `InvalidInput` | `INVALID_INPUT` | 400 |
//! | `InsufficientFunds` | `INSUFFICIENT_FUNDS` | 422 |
//! | `RateUnavailable` | `RATE_UNAVAILABLE` | 503 |
//! | `QuoteExpired` | `QUOTE_EXPIRED` | 409 |
//! | `SettlementFailed` | `SETTLEMENT_FAILED` | 422 |
//! | `AddressDerivation` | `ADDRESS_DERIVATION` | 400 |
//! | `InvalidTransition` | `INVALID_TRANSITION` | 409 |
//! | `NotFound` | `NOT_FOUND` | 404 |
//! | `Database` | `DATABASE_ERROR` | 500 |

use actix_web::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{CurrencyKind, OrderStatus};
use crate::db::DatabaseError;

/// Errors produced by the card, ledger, exchange and dedup services.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed parameters; nothing was changed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A debit would push the balance below zero; nothing was changed.
    #[error("Insufficient funds: balance {balance}, requested debit {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    /// The rate oracle was unreachable or timed out; no order was
    /// created.
    #[error("Rate unavailable for {from}/{to}: {reason}")]
    RateUnavailable {
        from: CurrencyKind,
        to: CurrencyKind,
        reason: String,
    },

    /// A stale quote was submitted.
    #[error("Quote expired at {0}")]
    QuoteExpired(DateTime<Utc>),

    /// The settlement debit failed; the order was moved to FAILED.
    #[error("Settlement failed for order {order_id}: {reason}")]
    SettlementFailed { order_id: Uuid, reason: String },

    /// Address derivation is not supported for this currency.
    #[error("Cannot derive a receive address for currency: {0}")]
    AddressDerivation(CurrencyKind),

    /// An order transition outside the closed state table.
    #[error("Illegal order transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence failed. Surfaced loudly, never swallowed.
    #[error("Database error: {0}")]
    Database(String),
}

impl CoreError {
    /// Stable machine-readable code for the API envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "INVALID_INPUT",
            CoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            CoreError::RateUnavailable { .. } => "RATE_UNAVAILABLE",
            CoreError::QuoteExpired(_) => "QUOTE_EXPIRED",
            CoreError::SettlementFailed { .. } => "SETTLEMENT_FAILED",
            CoreError::AddressDerivation(_) => "ADDRESS_DERIVATION",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// The HTTP status this error maps to at the API boundary.
    pub fn http_status(&self) -> StatusCode {
        match self {
            CoreError::InvalidInput(_) | CoreError::AddressDerivation(_) => {
                StatusCode::BAD_REQUEST
            }
            CoreError::InsufficientFunds { .. } | CoreError::SettlementFailed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::RateUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::QuoteExpired(_) | CoreError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DatabaseError> for CoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => CoreError::NotFound(what),
            other => CoreError::Database(other.to_string()),
        }
    }
}

impl From<tokio_postgres::Error> for CoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        CoreError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_codes_are_stable() {
        let err = CoreError::InsufficientFunds {
            balance: dec!(70.00),
            requested: dec!(100.00),
        };
        assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(err.http_status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_not_found_maps_from_database_error() {
        let err: CoreError = DatabaseError::NotFound("card 42".to_string()).into();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
    }
}
