use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Duplicate store key: {0}")]
    DuplicateKey(String),

    #[error("Unknown store key: {0}")]
    UnknownKey(String),

    #[error("Store key {0} was not minted by this registry")]
    UnauthorizedKey(String),

    #[error("Out of gas in {descriptor}: limit {limit}, consumed {consumed}")]
    OutOfGas {
        descriptor: String,
        limit: u64,
        consumed: u64,
    },

    #[error("State divergence at version {version}: committed {committed}, computed {computed}")]
    StateDivergence {
        version: u64,
        committed: String,
        computed: String,
    },

    #[error("Version not found: {0}")]
    VersionNotFound(u64),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Commit store backend error: {0}")]
    Backend(String),
}
