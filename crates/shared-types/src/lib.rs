//! # Shared Types
//!
//! Domain entities and wire types shared across the Lockstep workspace.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `PubKey`, module account addresses
//! - **Value**: `Coin`, `Coins`, `Decimal`
//! - **Chain**: `BlockHeader`, `VoteInfo`, `ValidatorUpdate`, `Event`
//! - **Transactions**: `Tx`, `Fee`, `SignDoc`, `Msg`
//! - **ABCI**: request/response types for the consensus-facing entry points

pub mod abci;
pub mod coins;
pub mod decimal;
pub mod entities;
pub mod errors;
pub mod msgs;
pub mod names;
pub mod tx;

pub use abci::*;
pub use coins::{Coin, Coins};
pub use decimal::Decimal;
pub use entities::*;
pub use errors::TypesError;
pub use msgs::*;
pub use tx::*;

/// Genesis state: module name to that module's JSON genesis payload.
pub type GenesisState = std::collections::BTreeMap<String, serde_json::Value>;
