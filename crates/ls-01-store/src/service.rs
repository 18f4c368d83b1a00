//! # MultiStore
//!
//! Versioned application state. Holds the last committed snapshot in memory
//! and persists every commit through the `CommitStore` port before reporting
//! it, so anything observing a `CommitInfo` can rely on the version being
//! durable.

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::keys::StoreKeyRegistry;
use crate::domain::state::{Snapshot, StateView};
use crate::ports::{CommitStore, CommittedVersion};
use shared_types::Hash;
use std::sync::Arc;
use tracing::{debug, info, warn};

const META_LAST_ACKNOWLEDGED: &str = "last_acknowledged_height";
const META_BLOCK_TIME_PREFIX: &str = "block_time";

/// Result of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub version: u64,
    pub hash: Hash,
    /// False when this version was already committed with the same hash
    /// (a replayed block after a restart).
    pub newly_written: bool,
}

pub struct MultiStore {
    registry: Arc<StoreKeyRegistry>,
    backend: Arc<dyn CommitStore>,
    committed: Arc<Snapshot>,
    version: u64,
    last_hash: Hash,
}

impl MultiStore {
    /// An empty store at version 0. Call `load_latest` to resume.
    pub fn new(registry: Arc<StoreKeyRegistry>, backend: Arc<dyn CommitStore>) -> Self {
        let committed = Arc::new(Snapshot::default());
        let last_hash = committed.root_hash();
        Self {
            registry,
            backend,
            committed,
            version: 0,
            last_hash,
        }
    }

    pub fn registry(&self) -> &Arc<StoreKeyRegistry> {
        &self.registry
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_commit_hash(&self) -> Hash {
        self.last_hash
    }

    /// Load the highest committed version. Returns it (0 for an empty store).
    pub fn load_latest(&mut self) -> StoreResult<u64> {
        let latest = self.backend.latest_version()?;
        self.load_version(latest)?;
        Ok(latest)
    }

    /// Load a specific committed version. Version 0 is the empty state.
    pub fn load_version(&mut self, version: u64) -> StoreResult<()> {
        if version == 0 {
            self.committed = Arc::new(Snapshot::default());
            self.version = 0;
            self.last_hash = self.committed.root_hash();
            return Ok(());
        }
        let stored = self
            .backend
            .load(version)?
            .ok_or(StoreError::VersionNotFound(version))?;
        let snapshot: Snapshot =
            bincode::deserialize(&stored.data).map_err(|e| StoreError::Codec(e.to_string()))?;
        let computed = snapshot.root_hash();
        if computed != stored.hash {
            return Err(StoreError::StateDivergence {
                version,
                committed: hex::encode(stored.hash),
                computed: hex::encode(computed),
            });
        }
        self.committed = Arc::new(snapshot);
        self.version = version;
        self.last_hash = stored.hash;
        info!(version, hash = %hex::encode(self.last_hash), "[store] loaded version");
        Ok(())
    }

    /// Fresh working state over the last commit, with empty transient partitions.
    pub fn working_state(&self) -> StateView {
        StateView::new(Arc::clone(&self.committed))
    }

    /// Commit `state` as the next version.
    ///
    /// If that version already exists in the backend (a block replayed after
    /// loading an older version), the recomputed hash must match: equal hashes
    /// yield `newly_written = false`, different hashes are a divergence.
    pub fn commit(&mut self, state: &StateView) -> StoreResult<CommitInfo> {
        let version = self.version + 1;
        let snapshot = state.flatten();
        let hash = snapshot.root_hash();

        let newly_written = match self.backend.load(version)? {
            Some(existing) if existing.hash == hash => {
                warn!(version, "[store] version already committed with identical hash");
                false
            }
            Some(existing) => {
                return Err(StoreError::StateDivergence {
                    version,
                    committed: hex::encode(existing.hash),
                    computed: hex::encode(hash),
                });
            }
            None => {
                let data =
                    bincode::serialize(&snapshot).map_err(|e| StoreError::Codec(e.to_string()))?;
                self.backend.save(version, CommittedVersion { hash, data })?;
                true
            }
        };

        self.committed = Arc::new(snapshot);
        self.version = version;
        self.last_hash = hash;
        debug!(version, hash = %hex::encode(hash), newly_written, "[store] committed");
        Ok(CommitInfo {
            version,
            hash,
            newly_written,
        })
    }

    fn meta_u64(&self, key: &str) -> StoreResult<Option<u64>> {
        match self.backend.get_meta(key)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| StoreError::Codec(format!("meta {key} must be 8 bytes")))?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Height the external engine last acknowledged, 0 if none.
    pub fn last_acknowledged(&self) -> StoreResult<u64> {
        Ok(self.meta_u64(META_LAST_ACKNOWLEDGED)?.unwrap_or(0))
    }

    pub fn set_last_acknowledged(&self, height: u64) -> StoreResult<()> {
        self.backend
            .set_meta(META_LAST_ACKNOWLEDGED, height.to_be_bytes().to_vec())
    }

    /// Header time of the block committed as `version`, if recorded.
    pub fn block_time(&self, version: u64) -> StoreResult<Option<u64>> {
        self.meta_u64(&format!("{META_BLOCK_TIME_PREFIX}_{version:020}"))
    }

    /// Record the header time of `version`. Written before the version is
    /// committed so a restart can rebuild the last header.
    pub fn set_block_time(&self, version: u64, time: u64) -> StoreResult<()> {
        self.backend.set_meta(
            &format!("{META_BLOCK_TIME_PREFIX}_{version:020}"),
            time.to_be_bytes().to_vec(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryCommitStore;

    fn store(backend: Arc<InMemoryCommitStore>) -> MultiStore {
        let registry = Arc::new(StoreKeyRegistry::new(&["bank"], &[]).unwrap());
        MultiStore::new(registry, backend)
    }

    #[test]
    fn test_commit_advances_version() {
        let mut ms = store(Arc::new(InMemoryCommitStore::new()));
        let mut state = ms.working_state();
        state.set("bank", b"a".to_vec(), b"1".to_vec());
        let info = ms.commit(&state).unwrap();
        assert_eq!(info.version, 1);
        assert!(info.newly_written);
        assert_eq!(ms.working_state().get("bank", b"a"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_restart_loads_latest() {
        let backend = Arc::new(InMemoryCommitStore::new());
        let hash = {
            let mut ms = store(Arc::clone(&backend));
            let mut state = ms.working_state();
            state.set("bank", b"a".to_vec(), b"1".to_vec());
            ms.commit(&state).unwrap();
            let empty_block = ms.working_state();
            ms.commit(&empty_block).unwrap().hash
        };
        let mut ms = store(backend);
        assert_eq!(ms.load_latest().unwrap(), 2);
        assert_eq!(ms.last_commit_hash(), hash);
        assert_eq!(ms.working_state().get("bank", b"a"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_replayed_version_is_not_newly_written() {
        let backend = Arc::new(InMemoryCommitStore::new());
        let mut ms = store(Arc::clone(&backend));
        let mut state = ms.working_state();
        state.set("bank", b"a".to_vec(), b"1".to_vec());
        ms.commit(&state).unwrap();

        ms.load_version(0).unwrap();
        let mut replay = ms.working_state();
        replay.set("bank", b"a".to_vec(), b"1".to_vec());
        let info = ms.commit(&replay).unwrap();
        assert_eq!(info.version, 1);
        assert!(!info.newly_written);
        assert_eq!(backend.version_count(), 1);
    }

    #[test]
    fn test_divergent_replay_is_rejected() {
        let mut ms = store(Arc::new(InMemoryCommitStore::new()));
        let mut state = ms.working_state();
        state.set("bank", b"a".to_vec(), b"1".to_vec());
        ms.commit(&state).unwrap();

        ms.load_version(0).unwrap();
        let mut replay = ms.working_state();
        replay.set("bank", b"a".to_vec(), b"2".to_vec());
        assert!(matches!(
            ms.commit(&replay),
            Err(StoreError::StateDivergence { version: 1, .. })
        ));
    }

    #[test]
    fn test_last_acknowledged_metadata() {
        let ms = store(Arc::new(InMemoryCommitStore::new()));
        assert_eq!(ms.last_acknowledged().unwrap(), 0);
        ms.set_last_acknowledged(12).unwrap();
        assert_eq!(ms.last_acknowledged().unwrap(), 12);
    }

    #[test]
    fn test_block_time_survives_restart() {
        let backend = Arc::new(InMemoryCommitStore::new());
        {
            let mut ms = store(Arc::clone(&backend));
            ms.set_block_time(1, 1_700_000_005).unwrap();
            let state = ms.working_state();
            ms.commit(&state).unwrap();
        }
        let mut ms = store(backend);
        ms.load_latest().unwrap();
        assert_eq!(ms.block_time(1).unwrap(), Some(1_700_000_005));
        assert_eq!(ms.block_time(2).unwrap(), None);
    }

    #[test]
    fn test_missing_version() {
        let mut ms = store(Arc::new(InMemoryCommitStore::new()));
        assert_eq!(ms.load_version(5), Err(StoreError::VersionNotFound(5)));
    }
}
