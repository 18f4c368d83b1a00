//! Cross-crate scenarios. Each file is one area of the state machine.

pub mod ante;
pub mod commit_bridge;
pub mod genesis;
pub mod invariants;
pub mod ordering;
