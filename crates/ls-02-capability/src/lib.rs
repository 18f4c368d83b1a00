//! # Capability (ls-02)
//!
//! Object capabilities binding a module scope to a named resource such as a
//! port (`ports/transfer`) or a channel (`capabilities/ports/transfer/channels/channel-0`).
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | Unforgeable | `Capability` has a private index and no public constructor |
//! | Isolation | `authenticate_capability` checks the caller's own `(scope, name)` entry |
//! | Explicit sharing | A second module owns a capability only after `claim_capability` |
//! | Fixed scopes | `scope_to_module` is rejected for duplicates and after `seal()` |
//!
//! The ownership table lives in the capability store partition, so it is
//! committed, branched per transaction and reloaded with the rest of the state.

pub mod errors;
pub mod keeper;

pub use errors::{CapabilityError, CapabilityResult};
pub use keeper::{Capability, CapabilityKeeper, CapabilityOwner, ScopedCapabilityKeeper};
