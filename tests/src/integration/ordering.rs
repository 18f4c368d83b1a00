//! # BeginBlock Ordering Scenario
//!
//! Distribution allocates the previous block's fees before slashing runs, so
//! a validator slashed in this block first receives its share and then
//! forfeits it with the rest of its outstanding rewards.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ls_05_keepers::slashing::{SlashingGenesis, SlashingParams};
    use shared_types::{names, Coins, Decimal};
    use std::sync::Arc;

    const POWER_A: u64 = 100;
    const POWER_B: u64 = 10;
    const POWER_REDUCTION: u128 = 1_000_000;

    fn strict_slashing() -> serde_json::Value {
        let genesis = SlashingGenesis {
            params: SlashingParams {
                signed_blocks_window: 2,
                min_signed_per_window: Decimal::from_ratio(1, 2),
                slash_fraction_downtime: Decimal::ONE,
                ..SlashingParams::default()
            },
            signing_infos: Vec::new(),
        };
        serde_json::to_value(genesis).unwrap()
    }

    #[test]
    fn test_downtime_slash_forfeits_rewards_allocated_first() {
        let a = key(1);
        let b = key(2);
        let doc = genesis()
            .fund(a.address(), Coins::single(DENOM, 1_000_000_000))
            .fund(b.address(), Coins::single(DENOM, 1_000_000_000))
            .validator(&a, "a", u128::from(POWER_A) * POWER_REDUCTION)
            .unwrap()
            .validator(&b, "b", u128::from(POWER_B) * POWER_REDUCTION)
            .unwrap()
            .module_state(names::SLASHING, strict_slashing())
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, config()).unwrap();

        // B never signs.
        let voters = || votes(&[(&a, POWER_A), (&b, POWER_B)], &[b.address()]);
        chain.block(&[], voters()).unwrap();
        chain.block(&[], voters()).unwrap();

        let distribution = Arc::clone(&chain.app.keepers().distribution);
        let staking = Arc::clone(&chain.app.keepers().staking);
        let outstanding = |chain: &TestChain, who: &shared_types::Address| {
            let mut ctx = chain.ctx();
            distribution
                .outstanding(&mut ctx, who)
                .unwrap()
                .amount_of(DENOM)
        };
        // Unsigned votes still earn a share of the fees.
        assert!(outstanding(&chain, &b.address()) > 0);

        let mut jailed_at = None;
        for _ in 0..3 {
            let a_before = outstanding(&chain, &a.address());
            let pool_before = {
                let mut ctx = chain.ctx();
                distribution.community_pool(&mut ctx).unwrap().amount_of(DENOM)
            };
            let result = chain.block(&[], voters()).unwrap();

            let mut ctx = chain.ctx();
            let validator = staking
                .validator(&mut ctx, &b.address())
                .unwrap()
                .expect("validator b");
            if validator.jailed {
                jailed_at = Some(result.height);
                assert_eq!(validator.tokens, 0);
                assert_eq!(outstanding(&chain, &b.address()), 0);
                assert!(outstanding(&chain, &a.address()) > a_before);
                let pool = distribution.community_pool(&mut ctx).unwrap();
                assert!(pool.amount_of(DENOM) > pool_before);
                break;
            }
        }
        assert!(jailed_at.is_some(), "validator b was never jailed");

        let mut ctx = chain.ctx();
        assert_eq!(distribution.can_withdraw_violation(&mut ctx).unwrap(), None);
        assert!(chain.app.invariants().assert_all(&mut ctx).is_ok());
    }

    #[test]
    fn test_signing_validator_is_never_jailed() {
        let a = key(1);
        let doc = genesis()
            .fund(a.address(), Coins::single(DENOM, 1_000_000_000))
            .validator(&a, "a", u128::from(POWER_A) * POWER_REDUCTION)
            .unwrap()
            .module_state(names::SLASHING, strict_slashing())
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, config()).unwrap();
        for _ in 0..5 {
            chain.block(&[], votes(&[(&a, POWER_A)], &[])).unwrap();
        }

        let mut ctx = chain.ctx();
        let validator = chain
            .app
            .keepers()
            .staking
            .validator(&mut ctx, &a.address())
            .unwrap()
            .unwrap();
        assert!(!validator.jailed);
        assert_eq!(validator.tokens, u128::from(POWER_A) * POWER_REDUCTION);
    }
}
