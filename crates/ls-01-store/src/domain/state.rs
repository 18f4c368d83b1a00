//! Committed snapshots and copy-on-write working views.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::Hash;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

pub type Partition = BTreeMap<Vec<u8>, Vec<u8>>;

/// Immutable committed state: partition name to ordered key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub partitions: BTreeMap<String, Partition>,
}

impl Snapshot {
    /// SHA-256 root over every partition in name order. Each partition
    /// contributes its name and a digest of its length-prefixed pairs; empty
    /// partitions are skipped so creating an empty partition does not change
    /// the root.
    pub fn root_hash(&self) -> Hash {
        let mut root = Sha256::new();
        for (name, partition) in &self.partitions {
            if partition.is_empty() {
                continue;
            }
            let mut inner = Sha256::new();
            for (k, v) in partition {
                inner.update((k.len() as u64).to_be_bytes());
                inner.update(k);
                inner.update((v.len() as u64).to_be_bytes());
                inner.update(v);
            }
            root.update((name.len() as u64).to_be_bytes());
            root.update(name.as_bytes());
            root.update(inner.finalize());
        }
        root.finalize().into()
    }
}

/// Uncommitted state layered over a committed snapshot.
///
/// Cloning a view is how execution branches: the clone shares the snapshot and
/// copies the pending writes, so discarding it leaves the parent untouched.
#[derive(Debug, Clone, Default)]
pub struct StateView {
    base: Arc<Snapshot>,
    writes: BTreeMap<String, BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
    transient: BTreeMap<String, Partition>,
}

impl StateView {
    pub fn new(base: Arc<Snapshot>) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
            transient: BTreeMap::new(),
        }
    }

    pub fn get(&self, partition: &str, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(pending) = self.writes.get(partition).and_then(|w| w.get(key)) {
            return pending.clone();
        }
        self.base
            .partitions
            .get(partition)
            .and_then(|p| p.get(key))
            .cloned()
    }

    pub fn set(&mut self, partition: &str, key: Vec<u8>, value: Vec<u8>) {
        self.writes
            .entry(partition.to_string())
            .or_default()
            .insert(key, Some(value));
    }

    pub fn delete(&mut self, partition: &str, key: &[u8]) {
        self.writes
            .entry(partition.to_string())
            .or_default()
            .insert(key.to_vec(), None);
    }

    /// All live pairs whose key starts with `prefix`, in key order.
    pub fn prefix_scan(&self, partition: &str, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let range = (Bound::Included(prefix.to_vec()), Bound::Unbounded);
        if let Some(base) = self.base.partitions.get(partition) {
            for (k, v) in base.range::<Vec<u8>, _>(range.clone()) {
                if !k.starts_with(prefix) {
                    break;
                }
                merged.insert(k.clone(), v.clone());
            }
        }
        if let Some(writes) = self.writes.get(partition) {
            for (k, v) in writes.range::<Vec<u8>, _>(range) {
                if !k.starts_with(prefix) {
                    break;
                }
                match v {
                    Some(v) => merged.insert(k.clone(), v.clone()),
                    None => merged.remove(k),
                };
            }
        }
        merged.into_iter().collect()
    }

    pub fn transient_get(&self, partition: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.transient.get(partition).and_then(|p| p.get(key)).cloned()
    }

    pub fn transient_set(&mut self, partition: &str, key: Vec<u8>, value: Vec<u8>) {
        self.transient
            .entry(partition.to_string())
            .or_default()
            .insert(key, value);
    }

    pub fn transient_delete(&mut self, partition: &str, key: &[u8]) {
        if let Some(p) = self.transient.get_mut(partition) {
            p.remove(key);
        }
    }

    pub fn transient_prefix_scan(&self, partition: &str, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.transient
            .get(partition)
            .map(|p| {
                p.range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), Bound::Unbounded))
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Clear every transient partition. Called at the start of each block.
    pub fn reset_transient(&mut self) {
        self.transient.clear();
    }

    pub fn has_pending_writes(&self) -> bool {
        self.writes.values().any(|w| !w.is_empty())
    }

    /// Apply pending writes to a copy of the base snapshot. Transient data is
    /// not part of the result.
    pub fn flatten(&self) -> Snapshot {
        let mut snapshot = (*self.base).clone();
        for (name, writes) in &self.writes {
            let partition = snapshot.partitions.entry(name.clone()).or_default();
            for (k, v) in writes {
                match v {
                    Some(v) => {
                        partition.insert(k.clone(), v.clone());
                    }
                    None => {
                        partition.remove(k);
                    }
                }
            }
        }
        snapshot.partitions.retain(|_, p| !p.is_empty());
        snapshot
    }
}
