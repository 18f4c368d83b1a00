//! # Commit Bridge (ls-03)
//!
//! Keeps the committed height of the multistore and the checkpoint of the
//! external execution engine advancing together.
//!
//! ## Protocol
//!
//! ```text
//! Commit()
//!   1. MultiStore::commit          -> version H durable in the CommitStore
//!   2. engine.call(is_new, COMMIT_BLOCK{H})   exactly once
//!   3. persist last_acknowledged = H          (only for new heights)
//! ```
//!
//! `is_new_height` is true only when `H` is above the last acknowledged
//! height, so a block replayed after a restart is reported as a replay and the
//! engine keeps its checkpoint. The same test applies to every block-phase
//! call made while executing a height (`AcknowledgedHeight`), so the engine
//! answers a replayed block with the replies it gave the first time. A crash between steps 1 and 3 is repaired by
//! `CommitBridge::recover` on startup.
//!
//! Any engine failure is fatal for the block.

pub mod adapters;
pub mod bridge;
pub mod errors;
pub mod ports;

pub use adapters::in_process::{EngineCall, InProcessEngine};
pub use bridge::{commit_block_payload, AcknowledgedHeight, CommitBridge};
pub use errors::{BridgeError, BridgeResult, EngineError};
pub use ports::ExternalEngine;
