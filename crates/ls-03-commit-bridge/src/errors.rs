use ls_01_store::StoreError;
use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Failure reported by an external engine transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Engine transport failed: {0}")]
    Transport(String),

    #[error("Engine rejected request: {0}")]
    Rejected(String),

    #[error("Malformed engine message: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Store commit failed: {0}")]
    Store(#[from] StoreError),

    #[error("External engine failed at height {height}: {source}")]
    Engine {
        height: u64,
        #[source]
        source: EngineError,
    },

    #[error("Encoding commit notification failed: {0}")]
    Encoding(String),
}
