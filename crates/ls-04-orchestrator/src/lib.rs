//! # Module Manager (ls-04)
//!
//! Drives the application modules through the block lifecycle in a fixed,
//! declared order.
//!
//! ## Phases
//!
//! ```text
//! InitGenesis   every module, once, in ModuleOrdering::init_genesis
//! BeginBlock    modules with a begin blocker, in ModuleOrdering::begin_block
//! EndBlock      modules with an end blocker, in ModuleOrdering::end_block
//! ```
//!
//! The orderings are checked when the manager is built: every module must be
//! placed in each phase it takes part in, no name may be unknown or repeated,
//! and every `OrderingConstraint` must hold. A wrong order therefore fails at
//! startup instead of silently changing economic outcomes.
//!
//! The first module error in a phase stops the phase. Errors are returned as
//! `ManagerError::ModuleFailed` so the caller can halt.
//!
//! ## Crate Structure
//!
//! - `module.rs` - `AppModule` contract implemented by every keeper module
//! - `ordering.rs` - per-phase orderings and relative-order constraints
//! - `manager.rs` - `ModuleManager`
//! - `router.rs` - message and query routers
//! - `invariants.rs` - invariant registry

pub mod errors;
pub mod invariants;
pub mod manager;
pub mod module;
pub mod ordering;
pub mod router;

pub use errors::{ManagerError, ManagerResult, ModuleError, ModuleResult, SDK_CODESPACE};
pub use invariants::{invariant, Invariant, InvariantRegistry, InvariantViolation};
pub use manager::ModuleManager;
pub use module::AppModule;
pub use ordering::{ModuleOrdering, OrderingConstraint, Phase};
pub use router::{MsgRouter, QueryRouter};
