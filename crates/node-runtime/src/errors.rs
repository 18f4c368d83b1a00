//! Application root errors.

use crate::container::config::ConfigError;
use crate::genesis::GenesisError;
use ls_01_store::StoreError;
use ls_02_capability::CapabilityError;
use ls_03_commit_bridge::BridgeError;
use ls_04_orchestrator::{ManagerError, ModuleError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Genesis error: {0}")]
    Genesis(#[from] GenesisError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A fatal error stopped block processing; operator action is required.
    #[error("Application halted: {0}")]
    Halted(String),

    #[error("Halt height {height} reached")]
    HaltHeightReached { height: u64 },

    #[error("Chain already initialized at height {height}")]
    AlreadyInitialized { height: u64 },

    #[error("Chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch { expected: String, got: String },

    #[error("Unexpected block height: expected {expected}, got {got}")]
    UnexpectedHeight { expected: u64, got: u64 },

    #[error("No block in progress")]
    NoBlockInProgress,

    #[error("Validator set from genesis does not match the one declared by consensus")]
    ValidatorSetMismatch,
}
