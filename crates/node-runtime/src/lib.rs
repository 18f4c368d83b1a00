//! # Node Runtime Library
//!
//! The Lockstep application root. `LockstepApp` owns the multistore and every
//! keeper and drives the ABCI lifecycle; the `lockstep-node` binary runs it as
//! a single-validator devnet.
//!
//! ## Layout
//!
//! - `container/` - configuration and keeper construction
//! - `wiring/` - store layout, module accounts, module ordering
//! - `genesis/` - genesis document creation and loading
//! - `handlers/` - transaction runner and query dispatch
//! - `app` - the application itself

#![allow(clippy::too_many_lines)]
#![allow(clippy::type_complexity)]

pub mod app;
pub mod container;
pub mod errors;
pub mod genesis;
pub mod handlers;
pub mod wiring;

pub use app::{ExportedApp, LockstepApp};
pub use container::{AppConfig, AppKeepers, ConfigError};
pub use errors::{AppError, AppResult};
pub use genesis::{GenesisBuilder, GenesisDoc, GenesisError};
