//! # Module Wiring
//!
//! Static layout of the application: which store partitions exist, which
//! module accounts may mint, burn or stake, and the order each lifecycle
//! phase visits the modules in.
//!
//! ```text
//! stores.rs     persistent and transient partitions, module accounts
//! ordering.rs   InitGenesis / BeginBlock / EndBlock orders and the
//!               constraints the module manager checks them against
//! ```
//!
//! Changing anything here changes consensus behaviour and the persisted
//! state layout.

pub mod ordering;
pub mod stores;

pub use ordering::{module_ordering, ORDERING_CONSTRAINTS};
pub use stores::{module_account_permissions, PERSISTENT_STORES, TRANSIENT_STORES};
