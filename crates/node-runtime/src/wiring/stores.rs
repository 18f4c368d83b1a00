//! Store partitions and module-account permissions.

use ls_05_keepers::{ModuleAccountPermissions, Permission};
use shared_types::names;

/// One persistent partition per module that keeps state, plus the main store.
pub const PERSISTENT_STORES: &[&str] = &[
    names::MAIN_STORE,
    names::AUTH,
    names::BANK,
    names::STAKING,
    names::SUPPLY,
    names::MINT,
    names::DISTRIBUTION,
    names::SLASHING,
    names::GOV,
    names::PARAMS,
    names::IBC,
    names::UPGRADE,
    names::EVIDENCE,
    names::TRANSFER,
    names::VM_BRIDGE,
    names::CAPABILITY,
];

/// Partitions cleared at the start of every block.
pub const TRANSIENT_STORES: &[&str] = &[names::TRANSIENT_PARAMS];

/// Module accounts and what each may do with the supply.
///
/// Only these accounts can receive tokens from modules; the bank keeper
/// refuses plain sends to them.
pub fn module_account_permissions() -> ModuleAccountPermissions {
    ModuleAccountPermissions::new([
        (names::FEE_COLLECTOR, vec![]),
        (names::DISTRIBUTION, vec![]),
        (names::MINT, vec![Permission::Minter]),
        (names::BONDED_POOL, vec![Permission::Burner, Permission::Staking]),
        (names::NOT_BONDED_POOL, vec![Permission::Burner, Permission::Staking]),
        (names::GOV, vec![Permission::Burner]),
        (names::TRANSFER, vec![Permission::Minter, Permission::Burner]),
    ])
}
