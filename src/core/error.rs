//! Errors raised at the rate update boundary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateError {
    #[error("No currency mapping for quote: {0}")]
    UnmappedCurrency(String),

    #[error("Invalid rate '{rate}' for quote: {name}")]
    InvalidQuote { name: String, rate: String },

    #[error("Store error: {0}")]
    Store(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
