//! # Outbound Ports
//!
//! Durable storage the `MultiStore` commits into.
//!
//! Production: `FileCommitStore` (one file per version under the node home)
//! Testing: `InMemoryCommitStore`, shared by `Arc` to simulate a restart

use crate::domain::errors::StoreResult;
use shared_types::Hash;

/// A committed version as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedVersion {
    pub hash: Hash,
    /// Encoded `Snapshot`.
    pub data: Vec<u8>,
}

pub trait CommitStore: Send + Sync {
    /// Highest saved version, 0 when nothing was committed.
    fn latest_version(&self) -> StoreResult<u64>;

    fn load(&self, version: u64) -> StoreResult<Option<CommittedVersion>>;

    /// Persist a version. Must be durable when this returns.
    fn save(&self, version: u64, committed: CommittedVersion) -> StoreResult<()>;

    /// Metadata kept outside the hashed state.
    fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    fn set_meta(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;
}
