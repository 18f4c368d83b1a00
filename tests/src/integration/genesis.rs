//! # Genesis Scenarios
//!
//! InitChain over a genesis with funded accounts and gentx validators:
//! staked tokens leave the operator's spendable balance for the bonded pool,
//! and nothing is created or destroyed on the way.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use node_runtime::{AppError, LockstepApp};
    use ls_01_store::InMemoryCommitStore;
    use ls_03_commit_bridge::InProcessEngine;
    use shared_types::{names, Coins, ValidatorUpdate};
    use std::sync::Arc;

    const FUNDED: u128 = 5_000_000_000;
    const STAKE: u128 = 1_000_000_000;

    #[test]
    fn test_bonded_stake_and_spendable_balance_match_genesis() {
        let operator = key(1);
        let holder = key(2);
        let doc = genesis()
            .fund(operator.address(), Coins::single(DENOM, FUNDED))
            .fund(holder.address(), Coins::single(DENOM, 700))
            .validator(&operator, "validator-1", STAKE)
            .unwrap()
            .module_state(names::MINT, no_inflation())
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, config()).unwrap();
        chain.empty_block().unwrap();

        let keepers = chain.app.keepers();
        let mut ctx = chain.ctx();
        let validator = keepers
            .staking
            .validator(&mut ctx, &operator.address())
            .unwrap()
            .expect("validator created by gentx");
        assert_eq!(validator.tokens, STAKE);
        assert!(validator.is_bonded());
        assert!(!validator.jailed);

        let delegation = keepers
            .staking
            .delegation(&mut ctx, &operator.address(), &operator.address())
            .unwrap()
            .expect("self delegation");
        assert_eq!(delegation.shares, STAKE);

        assert_eq!(chain.balance(&operator.address()), FUNDED - STAKE);
        assert_eq!(chain.balance(&holder.address()), 700);

        let bonded = keepers
            .supply
            .module_balance(&mut ctx, names::BONDED_POOL)
            .unwrap();
        assert_eq!(bonded.amount_of(DENOM), STAKE);

        // Staking moved tokens between accounts; the supply is what was funded.
        let supply = keepers.supply.supply(&mut ctx).unwrap();
        assert_eq!(supply.amount_of(DENOM), FUNDED + 700);
        assert!(chain.app.invariants().assert_all(&mut ctx).is_ok());
    }

    #[test]
    fn test_init_chain_reports_gentx_validator_set() {
        let v1 = key(1);
        let v2 = key(2);
        let doc = genesis()
            .fund(v1.address(), Coins::single(DENOM, FUNDED))
            .fund(v2.address(), Coins::single(DENOM, FUNDED))
            .validator(&v1, "v1", 3_000_000)
            .unwrap()
            .validator(&v2, "v2", 5_000_000)
            .unwrap()
            .build()
            .unwrap();

        let mut app = LockstepApp::new(
            config(),
            Arc::new(InProcessEngine::new()),
            Arc::new(InMemoryCommitStore::new()),
            false,
        )
        .unwrap();
        let response = app.init_chain(&doc.init_chain_request().unwrap()).unwrap();

        let mut powers: Vec<(shared_types::PubKey, u64)> = response
            .validators
            .iter()
            .map(|u| (u.pub_key, u.power))
            .collect();
        powers.sort_by_key(|(_, power)| *power);
        assert_eq!(powers, vec![(v1.pub_key(), 3), (v2.pub_key(), 5)]);
    }

    #[test]
    fn test_consensus_validator_set_must_match_genesis() {
        let operator = key(1);
        let doc = genesis()
            .fund(operator.address(), Coins::single(DENOM, FUNDED))
            .validator(&operator, "v1", STAKE)
            .unwrap()
            .build()
            .unwrap();
        let mut request = doc.init_chain_request().unwrap();
        request.validators = vec![ValidatorUpdate {
            pub_key: key(9).pub_key(),
            power: 1_000,
        }];

        let mut app = LockstepApp::new(
            config(),
            Arc::new(InProcessEngine::new()),
            Arc::new(InMemoryCommitStore::new()),
            false,
        )
        .unwrap();
        let err = app.init_chain(&request).unwrap_err();
        assert!(matches!(err, AppError::ValidatorSetMismatch));
        assert!(app.is_halted());
    }

    #[test]
    fn test_chain_without_gentx_starts_with_empty_set() {
        let holder = key(2);
        let doc = genesis()
            .fund(holder.address(), Coins::single(DENOM, 10))
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, config()).unwrap();
        chain.empty_block().unwrap();

        let mut ctx = chain.ctx();
        let validators = chain.app.keepers().staking.validators(&mut ctx).unwrap();
        assert!(validators.is_empty());
        assert_eq!(chain.balance(&holder.address()), 10);
    }

    #[test]
    fn test_genesis_for_other_chain_rejected() {
        let doc = node_runtime::GenesisBuilder::new("someone-else")
            .genesis_time(GENESIS_TIME)
            .build()
            .unwrap();
        let err = TestChain::start(&doc, config()).err().expect("chain id mismatch");
        assert!(matches!(err, AppError::ChainIdMismatch { .. }));
    }

    #[test]
    fn test_export_carries_height_and_module_state() {
        let operator = key(1);
        let doc = genesis()
            .fund(operator.address(), Coins::single(DENOM, FUNDED))
            .validator(&operator, "v1", STAKE)
            .unwrap()
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, config()).unwrap();
        chain.empty_block().unwrap();
        chain.empty_block().unwrap();

        let exported = chain.app.export_genesis().unwrap();
        assert_eq!(exported.height, 2);
        assert_eq!(exported.genesis.chain_id, CHAIN_ID);
        assert!(exported.genesis.app_state.contains_key(names::STAKING));
        assert!(exported.genesis.app_state.contains_key(names::DISTRIBUTION));
    }

    #[test]
    fn test_export_after_restart_keeps_last_block_time() {
        let operator = key(1);
        let doc = genesis()
            .fund(operator.address(), Coins::single(DENOM, FUNDED))
            .validator(&operator, "v1", STAKE)
            .unwrap()
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, config()).unwrap();
        chain.empty_block().unwrap();
        chain.empty_block().unwrap();
        let before = chain.app.export_genesis().unwrap();

        let mut chain = chain.restart().unwrap();
        let after = chain.app.export_genesis().unwrap();
        assert_eq!(before.genesis.genesis_time, header(2).time);
        assert_eq!(after.genesis.genesis_time, before.genesis.genesis_time);
        assert_eq!(after.genesis.app_state, before.genesis.app_state);
        assert_eq!(chain.ctx().block_time(), header(2).time);

        chain.app.load_height(1).unwrap();
        assert_eq!(chain.app.export_genesis().unwrap().genesis.genesis_time, header(1).time);
    }
}
