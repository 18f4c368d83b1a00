//! # Lockstep Test Suite
//!
//! Cross-crate scenarios run against a complete `LockstepApp`.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs        # TestChain: drives the app like a consensus engine
//! └── integration/
//!     ├── genesis.rs       # InitChain, stake and balance reconciliation
//!     ├── invariants.rs    # supply invariant at genesis and EndBlock
//!     ├── commit_bridge.rs # exactly-once engine notification across restarts
//!     ├── ante.rs          # fee-dependent rejection, replay determinism
//!     └── ordering.rs      # BeginBlock order: distribution before slashing
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ls-tests
//! cargo test -p ls-tests integration::commit_bridge
//! cargo bench -p ls-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
