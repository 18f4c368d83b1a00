//! File-backed `CommitStore`.
//!
//! Layout under the root directory:
//!
//! ```text
//! versions/<version:020>.bin   bincode (hash, snapshot bytes)
//! meta/<key>                   raw metadata bytes
//! ```
//!
//! Writes go to a temporary file that is synced and renamed into place, then
//! the containing directory is synced so the rename itself is durable. A
//! crash never leaves a partially written version behind, and a version is
//! on disk before `save` returns, which is before the engine is told about it.

use crate::domain::errors::{StoreError, StoreResult};
use crate::ports::{CommitStore, CommittedVersion};
use parking_lot::Mutex;
use shared_types::Hash;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct FileCommitStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Flush directory entries (creations and renames) to disk.
fn sync_dir(dir: &Path) -> StoreResult<()> {
    fs::File::open(dir).and_then(|d| d.sync_all()).map_err(io_err)
}

impl FileCommitStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("versions")).map_err(io_err)?;
        fs::create_dir_all(root.join("meta")).map_err(io_err)?;
        sync_dir(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn version_path(&self, version: u64) -> PathBuf {
        self.root.join("versions").join(format!("{version:020}.bin"))
    }

    fn meta_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(StoreError::Backend(format!("invalid metadata key {key:?}")));
        }
        Ok(self.root.join("meta").join(key))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let _guard = self.write_lock.lock();
        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Backend(format!("{} has no parent directory", path.display())))?;
        sync_dir(dir)
    }
}

impl CommitStore for FileCommitStore {
    fn latest_version(&self) -> StoreResult<u64> {
        let mut latest = 0;
        for entry in fs::read_dir(self.root.join("versions")).map_err(io_err)? {
            let name = entry.map_err(io_err)?.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".bin") {
                if let Ok(version) = stem.parse::<u64>() {
                    latest = latest.max(version);
                }
            }
        }
        Ok(latest)
    }

    fn load(&self, version: u64) -> StoreResult<Option<CommittedVersion>> {
        let path = self.version_path(version);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(io_err)?;
        let (hash, data): (Hash, Vec<u8>) =
            bincode::deserialize(&bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(Some(CommittedVersion { hash, data }))
    }

    fn save(&self, version: u64, committed: CommittedVersion) -> StoreResult<()> {
        let bytes = bincode::serialize(&(committed.hash, committed.data))
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        self.write_atomic(&self.version_path(version), &bytes)
    }

    fn get_meta(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.meta_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        fs::read(path).map(Some).map_err(io_err)
    }

    fn set_meta(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.meta_path(key)?;
        self.write_atomic(&path, &value)
    }
}
