//! # Module Keeper Set (ls-05)
//!
//! The application modules. Each module has a keeper holding its wiring
//! (store keys, parameter subspace, `Arc`s to the keepers it depends on) and
//! an `AppModule` wrapper registered with the module manager. All state lives
//! in the multistore.
//!
//! ## Dependencies
//!
//! ```text
//! params
//! auth <- bank <- supply <- staking <- {mint, distribution, slashing, gov}
//! slashing <- evidence
//! capability <- ibc <- {transfer, vmbridge}
//! ```
//!
//! Keepers are built leaves first. Cross-references that would form a cycle
//! (staking hooks, the governance router, the ibc port router, the crisis
//! invariants and the genesis transaction deliverer) are installed once after
//! construction.

pub mod auth;
pub mod bank;
pub mod codec;
pub mod crisis;
pub mod distribution;
pub mod evidence;
pub mod genutil;
pub mod gov;
pub mod ibc;
pub mod mint;
pub mod params;
pub mod slashing;
pub mod staking;
pub mod supply;
pub mod transfer;
pub mod upgrade;
pub mod vmbridge;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthKeeper, AuthModule, ModuleAccountPermissions, Permission};
pub use bank::{BankKeeper, BankModule};
pub use crisis::{CrisisKeeper, CrisisModule};
pub use distribution::{DistributionKeeper, DistributionModule};
pub use evidence::{EvidenceKeeper, EvidenceModule};
pub use genutil::{GenesisTxDeliverer, GenutilModule};
pub use gov::{GovKeeper, GovModule, GovRouter, ProposalHandler, TextProposalHandler};
pub use ibc::{IbcCoreModule, IbcKeeper, IbcModule};
pub use mint::{MintKeeper, MintModule};
pub use params::{ParamSet, ParamsKeeper, ParamsModule, Subspace};
pub use slashing::{SlashingKeeper, SlashingModule};
pub use staking::{StakingHooks, StakingKeeper, StakingModule};
pub use supply::{SupplyKeeper, SupplyModule};
pub use transfer::{TransferKeeper, TransferModule};
pub use upgrade::{UpgradeHandler, UpgradeKeeper, UpgradeModule};
pub use vmbridge::{VmBridgeKeeper, VmBridgeModule};
