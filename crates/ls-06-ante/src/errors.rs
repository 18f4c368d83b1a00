//! Ante error types and their ABCI codes.

use ls_01_store::StoreError;
use ls_04_orchestrator::{ModuleError, SDK_CODESPACE};
use shared_types::{Address, TypesError};
use thiserror::Error;

pub type AnteResult<T> = Result<T, AnteError>;

/// Why a transaction was rejected before its messages ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnteError {
    #[error("Tx decode error: {0}")]
    TxDecode(String),

    #[error("Invalid transaction: {0}")]
    InvalidRequest(String),

    #[error("Transaction expired: timeout height {timeout_height}, current height {height}")]
    Expired { timeout_height: u64, height: u64 },

    #[error("Memo too large: {len} characters, maximum {max}")]
    MemoTooLarge { len: u64, max: u64 },

    #[error("Insufficient fee: {0}")]
    InsufficientFee(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Unknown address: {0}")]
    UnknownAddress(Address),

    #[error("Invalid public key: {0}")]
    InvalidPubKey(String),

    #[error("Too many signatures: {count}, limit {limit}")]
    TooManySignatures { count: u64, limit: u64 },

    #[error("No signatures supplied")]
    NoSignatures,

    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("Bad sequence for {address}: expected {expected}, got {got}")]
    BadSequence {
        address: Address,
        expected: u64,
        got: u64,
    },

    #[error("Out of gas: limit {limit}, consumed {consumed}")]
    OutOfGas { limit: u64, consumed: u64 },

    #[error("Redundant relay: every packet in the transaction was already received")]
    RedundantRelay,

    #[error(transparent)]
    Module(ModuleError),
}

impl AnteError {
    pub fn codespace(&self) -> &'static str {
        match self {
            AnteError::Module(e) => e.codespace(),
            _ => SDK_CODESPACE,
        }
    }

    /// Stable ABCI code within `codespace()`.
    pub fn code(&self) -> u32 {
        match self {
            AnteError::TxDecode(_) => 2,
            AnteError::InvalidSignature(_) => 4,
            AnteError::InsufficientFunds(_) => 5,
            AnteError::InvalidPubKey(_) => 8,
            AnteError::UnknownAddress(_) => 9,
            AnteError::OutOfGas { .. } => 11,
            AnteError::MemoTooLarge { .. } => 12,
            AnteError::InsufficientFee(_) => 13,
            AnteError::TooManySignatures { .. } => 15,
            AnteError::NoSignatures => 16,
            AnteError::InvalidRequest(_) => 18,
            AnteError::RedundantRelay => 19,
            AnteError::Expired { .. } => 30,
            AnteError::BadSequence { .. } => 32,
            AnteError::Module(e) => e.code(),
        }
    }
}

impl From<StoreError> for AnteError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OutOfGas {
                limit, consumed, ..
            } => AnteError::OutOfGas { limit, consumed },
            other => AnteError::Module(ModuleError::Store(other)),
        }
    }
}

impl From<ModuleError> for AnteError {
    fn from(e: ModuleError) -> Self {
        match e {
            ModuleError::Store(store) => store.into(),
            ModuleError::InsufficientFunds(msg) => AnteError::InsufficientFunds(msg),
            ModuleError::Types(TypesError::InsufficientCoins { have, need }) => {
                AnteError::InsufficientFunds(format!("have {have}, need {need}"))
            }
            other => AnteError::Module(other),
        }
    }
}

impl From<TypesError> for AnteError {
    fn from(e: TypesError) -> Self {
        AnteError::InvalidRequest(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_gas_keeps_its_code_through_module_errors() {
        let store = StoreError::OutOfGas {
            descriptor: "txSize".into(),
            limit: 10,
            consumed: 12,
        };
        let err: AnteError = ModuleError::Store(store).into();
        assert_eq!(err, AnteError::OutOfGas { limit: 10, consumed: 12 });
        assert_eq!(err.code(), 11);
        assert_eq!(err.codespace(), "sdk");
    }

    #[test]
    fn test_module_errors_keep_codespace() {
        let err: AnteError = ModuleError::custom("bank", 8, "disabled").into();
        assert_eq!(err.codespace(), "bank");
        assert_eq!(err.code(), 8);
        let funds: AnteError = ModuleError::InsufficientFunds("broke".into()).into();
        assert_eq!(funds.code(), 5);
    }
}
