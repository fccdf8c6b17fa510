//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("ABI decode error: {0}")]
    Decode(String),

    #[error("Rate unavailable: {0}")]
    RateUnavailable(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] p2px_core::CoreError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
