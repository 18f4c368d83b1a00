//! # Error Types
//!
//! Errors produced while parsing or combining shared value types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Address is not 20 hex-encoded bytes.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Coin string could not be parsed.
    #[error("Invalid coins: {0}")]
    InvalidCoins(String),

    /// Decimal string could not be parsed.
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    /// Subtraction would produce a negative amount.
    #[error("Insufficient coins: have {have}, need {need}")]
    InsufficientCoins { have: String, need: String },

    /// Message failed stateless validation.
    #[error("Invalid message: {0}")]
    InvalidMsg(String),

    /// Wire encoding or decoding failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Amount arithmetic overflowed.
    #[error("Amount overflow in denom {0}")]
    Overflow(String),
}
