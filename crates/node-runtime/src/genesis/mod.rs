//! # Genesis Module
//!
//! The genesis document and how it becomes an InitChain request.
//!
//! ## Initialization Sequence
//!
//! 1. Load the document from `LS_GENESIS_FILE`, or build a devnet one
//! 2. Hand `app_state` to InitChain as JSON bytes
//! 3. The module manager runs every module's genesis in the mandated order
//! 4. genutil delivers the gentxs last and returns the initial validator set

pub mod builder;

pub use builder::{GenesisBuilder, GenesisDoc, GenesisError};
