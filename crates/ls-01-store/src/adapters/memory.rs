use crate::domain::errors::StoreResult;
use crate::ports::{CommitStore, CommittedVersion};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Default)]
struct Inner {
    versions: BTreeMap<u64, CommittedVersion>,
    meta: BTreeMap<String, Vec<u8>>,
}

/// In-memory implementation of `CommitStore` for tests and ephemeral nodes.
#[derive(Default)]
pub struct InMemoryCommitStore {
    inner: RwLock<Inner>,
}

impl InMemoryCommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version_count(&self) -> usize {
        self.inner.read().versions.len()
    }
}

impl CommitStore for InMemoryCommitStore {
    fn latest_version(&self) -> StoreResult<u64> {
        Ok(self
            .inner
            .read()
            .versions
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0))
    }

    fn load(&self, version: u64) -> StoreResult<Option<CommittedVersion>> {
        Ok(self.inner.read().versions.get(&version).cloned())
    }

    fn save(&self, version: u64, committed: CommittedVersion) -> StoreResult<()> {
        self.inner.write().versions.insert(version, committed);
        Ok(())
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.read().meta.get(key).cloned())
    }

    fn set_meta(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.inner.write().meta.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_version_tracks_saves() {
        let store = InMemoryCommitStore::new();
        assert_eq!(store.latest_version().unwrap(), 0);
        let committed = CommittedVersion {
            hash: [1; 32],
            data: vec![],
        };
        store.save(1, committed.clone()).unwrap();
        store.save(2, committed.clone()).unwrap();
        assert_eq!(store.latest_version().unwrap(), 2);
        assert_eq!(store.load(1).unwrap(), Some(committed));
        assert_eq!(store.load(3).unwrap(), None);
    }

    #[test]
    fn test_meta_roundtrip() {
        let store = InMemoryCommitStore::new();
        assert_eq!(store.get_meta("acked").unwrap(), None);
        store.set_meta("acked", vec![7]).unwrap();
        assert_eq!(store.get_meta("acked").unwrap(), Some(vec![7]));
    }
}
