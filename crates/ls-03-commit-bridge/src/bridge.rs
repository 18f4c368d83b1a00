use crate::errors::{BridgeError, BridgeResult};
use crate::ports::ExternalEngine;
use lockstep_telemetry::ENGINE_NOTIFICATIONS;
use ls_01_store::{CommitInfo, MultiStore, StateView};
use serde::Serialize;
use shared_types::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    block_height: u64,
    app_hash: String,
}

/// JSON notification sent to the engine after a commit.
pub fn commit_block_payload(height: u64, app_hash: &Hash) -> BridgeResult<String> {
    serde_json::to_string(&CommitBlock {
        kind: "COMMIT_BLOCK",
        block_height: height,
        app_hash: hex::encode(app_hash),
    })
    .map_err(|e| BridgeError::Encoding(e.to_string()))
}

/// Last height the engine acknowledged, shared with every component that
/// talks to the engine during a block.
#[derive(Debug, Clone, Default)]
pub struct AcknowledgedHeight(Arc<AtomicU64>);

impl AcknowledgedHeight {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, height: u64) {
        self.0.store(height, Ordering::Release);
    }

    /// Whether calls for `height` are new to the engine. Replayed heights
    /// are not.
    pub fn is_new(&self, height: u64) -> bool {
        height > self.get()
    }
}

pub struct CommitBridge {
    engine: Arc<dyn ExternalEngine>,
    acknowledged: AcknowledgedHeight,
}

impl CommitBridge {
    pub fn new(engine: Arc<dyn ExternalEngine>) -> Self {
        Self {
            engine,
            acknowledged: AcknowledgedHeight::default(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ExternalEngine> {
        &self.engine
    }

    /// Handle kept current with the store's acknowledged height.
    pub fn acknowledged(&self) -> AcknowledgedHeight {
        self.acknowledged.clone()
    }

    /// Reload the acknowledged height after the store was opened or rolled
    /// back. The value lives outside versioned state, so a rollback keeps it.
    pub fn sync(&self, store: &MultiStore) -> BridgeResult<u64> {
        let height = store.last_acknowledged()?;
        self.acknowledged.set(height);
        Ok(height)
    }

    /// Commit `state` to the store, then notify the engine exactly once.
    pub fn commit(&self, store: &mut MultiStore, state: &StateView) -> BridgeResult<CommitInfo> {
        let info = store.commit(state)?;
        let acknowledged = store.last_acknowledged()?;
        let is_new_height = info.version > acknowledged;
        if !info.newly_written && is_new_height {
            // Stored before a crash but never acknowledged.
            warn!(height = info.version, "[commit-bridge] completing unacknowledged commit");
        }
        self.notify(store, info.version, &info.hash, is_new_height)?;
        Ok(info)
    }

    /// Deliver a notification left pending by a crash between the store
    /// commit and the acknowledgment. Returns the height notified, if any.
    pub fn recover(&self, store: &MultiStore) -> BridgeResult<Option<u64>> {
        let version = store.version();
        let acknowledged = self.sync(store)?;
        if version <= acknowledged {
            return Ok(None);
        }
        info!(
            height = version,
            acknowledged, "[commit-bridge] sending pending commit notification"
        );
        self.notify(store, version, &store.last_commit_hash(), true)?;
        Ok(Some(version))
    }

    fn notify(
        &self,
        store: &MultiStore,
        height: u64,
        app_hash: &Hash,
        is_new_height: bool,
    ) -> BridgeResult<()> {
        let payload = commit_block_payload(height, app_hash)?;
        let kind = if is_new_height { "new" } else { "replay" };
        ENGINE_NOTIFICATIONS.with_label_values(&[kind]).inc();

        if let Err(source) = self.engine.call(is_new_height, &payload) {
            error!(height, %source, "[commit-bridge] external engine failed; halting");
            return Err(BridgeError::Engine { height, source });
        }
        if is_new_height {
            store.set_last_acknowledged(height)?;
            self.acknowledged.set(height);
        }
        info!(height, is_new_height, "[commit-bridge] engine acknowledged commit");
        Ok(())
    }
}
