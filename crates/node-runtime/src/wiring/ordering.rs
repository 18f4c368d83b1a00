//! Mandated lifecycle orders.
//!
//! The orders below are economic rules, not a matter of taste: running
//! slashing before distribution hands a reward to a validator that is about
//! to lose its stake, and running anything after staking in EndBlock changes
//! the validator set the consensus engine has already been told about. Each
//! rule is declared as an `OrderingConstraint` so the module manager rejects
//! an ordering that breaks it at startup.

use ls_04_orchestrator::{ModuleOrdering, OrderingConstraint, Phase};
use shared_types::names;

pub fn module_ordering() -> ModuleOrdering {
    ModuleOrdering {
        init_genesis: vec![
            names::DISTRIBUTION,
            names::STAKING,
            names::AUTH,
            names::BANK,
            names::SLASHING,
            names::GOV,
            names::MINT,
            names::SUPPLY,
            names::CRISIS,
            names::PARAMS,
            names::UPGRADE,
            names::EVIDENCE,
            names::IBC,
            names::TRANSFER,
            names::VM_BRIDGE,
            names::GENUTIL,
        ],
        begin_block: vec![
            names::UPGRADE,
            names::MINT,
            names::DISTRIBUTION,
            names::SLASHING,
            names::STAKING,
            names::VM_BRIDGE,
        ],
        end_block: vec![names::VM_BRIDGE, names::CRISIS, names::GOV, names::STAKING],
    }
}

use Phase::{BeginBlock, EndBlock, InitGenesis};

pub const ORDERING_CONSTRAINTS: &[OrderingConstraint] = &[
    // InitGenesis
    OrderingConstraint::new(
        InitGenesis,
        names::DISTRIBUTION,
        names::STAKING,
        "reward records must exist before staking creates validators",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::STAKING,
        names::AUTH,
        "genesis stake must be loaded before accounts",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::STAKING,
        names::BANK,
        "genesis stake must be loaded before balances",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::BANK,
        names::SUPPLY,
        "total supply is derived from genesis balances",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::SUPPLY,
        names::CRISIS,
        "genesis invariants read the total supply",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::IBC,
        names::TRANSFER,
        "the transfer port is bound through ibc",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::IBC,
        names::VM_BRIDGE,
        "the vm bridge port is bound through ibc",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::BANK,
        names::GENUTIL,
        "gentx signers must already be funded",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::STAKING,
        names::GENUTIL,
        "gentxs create validators through staking",
    ),
    OrderingConstraint::new(
        InitGenesis,
        names::VM_BRIDGE,
        names::GENUTIL,
        "genutil activates the validator set after every other module",
    ),
    // BeginBlock
    OrderingConstraint::new(
        BeginBlock,
        names::UPGRADE,
        names::MINT,
        "a scheduled upgrade halts before any economic logic runs",
    ),
    OrderingConstraint::new(
        BeginBlock,
        names::MINT,
        names::DISTRIBUTION,
        "distribution allocates the pool after this block's provision",
    ),
    OrderingConstraint::new(
        BeginBlock,
        names::DISTRIBUTION,
        names::SLASHING,
        "slashed validators must not receive the reward they are about to lose",
    ),
    OrderingConstraint::new(
        BeginBlock,
        names::SLASHING,
        names::STAKING,
        "the unbonding queue matures after this block's slashes",
    ),
    OrderingConstraint::new(
        BeginBlock,
        names::STAKING,
        names::VM_BRIDGE,
        "the engine sees a fully settled block context",
    ),
    // EndBlock
    OrderingConstraint::new(
        EndBlock,
        names::VM_BRIDGE,
        names::CRISIS,
        "engine effects are applied before invariants are checked",
    ),
    OrderingConstraint::new(
        EndBlock,
        names::CRISIS,
        names::GOV,
        "invariants are checked before proposals execute",
    ),
    OrderingConstraint::new(
        EndBlock,
        names::GOV,
        names::STAKING,
        "the validator set delta must be the last word of the block",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_constraint_holds() {
        let ordering = module_ordering();
        for constraint in ORDERING_CONSTRAINTS {
            assert!(
                constraint.check(&ordering).is_ok(),
                "{} before {} in {}",
                constraint.before,
                constraint.after,
                constraint.phase
            );
        }
    }

    #[test]
    fn test_terminal_modules() {
        let ordering = module_ordering();
        assert_eq!(ordering.init_genesis.last(), Some(&names::GENUTIL));
        assert_eq!(ordering.begin_block.first(), Some(&names::UPGRADE));
        assert_eq!(ordering.begin_block.last(), Some(&names::VM_BRIDGE));
        assert_eq!(ordering.end_block.first(), Some(&names::VM_BRIDGE));
        assert_eq!(ordering.end_block.last(), Some(&names::STAKING));
    }

    #[test]
    fn test_swapping_distribution_and_slashing_is_rejected() {
        let mut ordering = module_ordering();
        let d = ordering.position(BeginBlock, names::DISTRIBUTION).unwrap();
        let s = ordering.position(BeginBlock, names::SLASHING).unwrap();
        ordering.begin_block.swap(d, s);

        let broken: Vec<_> = ORDERING_CONSTRAINTS
            .iter()
            .filter(|c| c.check(&ordering).is_err())
            .collect();
        assert!(broken
            .iter()
            .any(|c| c.before == names::DISTRIBUTION && c.after == names::SLASHING));
    }
}
