//! Error types for p2px-core.

use thiserror::Error;

use crate::order::OrderStatus;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid fiat amount: {0}")]
    InvalidFiatAmount(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Illegal transition {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
