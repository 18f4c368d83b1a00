//! # Store (ls-01)
//!
//! Storage layer of the application state machine.
//!
//! ## Role in System
//!
//! - **Store-Key Registry**: mints one `StoreKey` per persistent partition and
//!   one `TransientStoreKey` per per-block scratch partition. Keys are compared
//!   by identity, so a component can only reach a partition through the key
//!   instance the registry handed it.
//! - **MultiStore**: versioned, content-hashed state. Every commit produces a
//!   new version and a SHA-256 over all persistent partitions.
//! - **Context**: execution context threaded through every module call: block
//!   header, mode, gas meter, event sink and the working state.
//!
//! ## Branching
//!
//! ```text
//! committed snapshot (Arc) ──► StateView (block overlay)
//!                                 │ branch()
//!                                 ▼
//!                              StateView (tx overlay) ──write_branch──► parent
//!                                                      └─discard──────► dropped
//! ```
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - keys, state views, gas, execution context
//! - `ports/` - `CommitStore` persistence port
//! - `adapters/` - in-memory and file-backed commit stores
//! - `service.rs` - `MultiStore`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{FileCommitStore, InMemoryCommitStore};
pub use domain::context::{Context, ExecMode, KvStore};
pub use domain::errors::{StoreError, StoreResult};
pub use domain::gas::{GasConfig, GasMeter, KV_GAS, TRANSIENT_GAS};
pub use domain::keys::{StoreKey, StoreKeyRegistry, TransientStoreKey};
pub use domain::state::{Partition, Snapshot, StateView};
pub use ports::{CommitStore, CommittedVersion};
pub use service::{CommitInfo, MultiStore};
