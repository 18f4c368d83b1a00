//! # Invariant Scenarios
//!
//! The supply invariant holds across ordinary blocks, and a divergence is
//! fatal both at genesis and at a periodic EndBlock check.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ls_01_store::ExecMode;
    use ls_05_keepers::supply::SupplyGenesis;
    use node_runtime::AppError;
    use shared_types::{names, Coins, RequestEndBlock, VoteInfo};

    fn periodic_config(period: u64) -> node_runtime::AppConfig {
        let mut config = config();
        config.chain.inv_check_period = period;
        config
    }

    #[test]
    fn test_invariants_hold_across_blocks_with_transfers() {
        let operator = key(1);
        let sender = key(2);
        let recipient = key(3);
        let doc = genesis()
            .fund(operator.address(), Coins::single(DENOM, 1_000_000_000))
            .fund(sender.address(), Coins::single(DENOM, 50_000))
            .validator(&operator, "v1", 100_000_000)
            .unwrap()
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, periodic_config(1)).unwrap();
        chain.empty_block().unwrap();

        let (account_number, _) = chain.account(&sender.address());
        let tx = signed_tx(
            &sender,
            send(&sender, recipient.address(), 1_234),
            100,
            account_number,
            0,
        );
        let voters = votes(&[(&operator, 100)], &[]);
        let result = chain.block(&[tx], voters.clone()).unwrap();
        assert!(result.txs[0].is_ok(), "send failed: {}", result.txs[0].log);

        for _ in 0..3 {
            chain.block(&[], voters.clone()).unwrap();
        }
        assert!(!chain.app.is_halted());
        assert_eq!(chain.balance(&recipient.address()), 1_234);

        let mut ctx = chain.ctx();
        assert!(chain.app.invariants().assert_all(&mut ctx).is_ok());
        assert!(!chain.app.invariants().is_empty());
    }

    #[test]
    fn test_end_block_check_catches_supply_divergence() {
        let holder = key(2);
        let doc = genesis()
            .fund(holder.address(), Coins::single(DENOM, 1_000))
            .module_state(names::MINT, no_inflation())
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, periodic_config(1)).unwrap();
        chain.empty_block().unwrap();

        let mut ctx = chain.ctx();
        ctx.set_mode(ExecMode::Deliver);
        let keepers = chain.app.keepers();
        keepers
            .supply
            .set_supply(&mut ctx, &Coins::single(DENOM, 999))
            .unwrap();

        let height = ctx.height();
        let result = chain
            .app
            .manager()
            .end_block(&mut ctx, &RequestEndBlock { height });
        assert!(result.is_err());

        let violation = chain.app.invariants().assert_all(&mut ctx).unwrap_err();
        assert_eq!(violation.module, "supply");
        assert_eq!(violation.route, "total-supply");
    }

    #[test]
    fn test_off_period_end_block_skips_check() {
        let holder = key(2);
        let doc = genesis()
            .fund(holder.address(), Coins::single(DENOM, 1_000))
            .module_state(names::MINT, no_inflation())
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, periodic_config(1_000)).unwrap();
        chain.empty_block().unwrap();

        let mut ctx = chain.ctx();
        ctx.set_mode(ExecMode::Deliver);
        chain
            .app
            .keepers()
            .supply
            .set_supply(&mut ctx, &Coins::single(DENOM, 999))
            .unwrap();
        let height = ctx.height();
        assert!(chain
            .app
            .manager()
            .end_block(&mut ctx, &RequestEndBlock { height })
            .is_ok());
    }

    #[test]
    fn test_genesis_with_wrong_supply_halts() {
        let holder = key(2);
        let supply = SupplyGenesis {
            supply: Coins::single(DENOM, 1),
        };
        let doc = genesis()
            .fund(holder.address(), Coins::single(DENOM, 1_000))
            .module_state(names::SUPPLY, serde_json::to_value(&supply).unwrap())
            .build()
            .unwrap();

        let err = TestChain::start(&doc, config()).err().expect("genesis must fail");
        assert!(!matches!(err, AppError::ChainIdMismatch { .. }));
    }

    #[test]
    fn test_halted_chain_refuses_blocks() {
        let holder = key(2);
        let supply = SupplyGenesis {
            supply: Coins::single(DENOM, 1),
        };
        let doc = genesis()
            .fund(holder.address(), Coins::single(DENOM, 1_000))
            .module_state(names::SUPPLY, serde_json::to_value(&supply).unwrap())
            .build()
            .unwrap();

        let mut app = node_runtime::LockstepApp::new(
            config(),
            std::sync::Arc::new(ls_03_commit_bridge::InProcessEngine::new()),
            std::sync::Arc::new(ls_01_store::InMemoryCommitStore::new()),
            false,
        )
        .unwrap();
        assert!(app.init_chain(&doc.init_chain_request().unwrap()).is_err());
        assert!(app.is_halted());

        let err = app
            .begin_block(&shared_types::RequestBeginBlock {
                header: header(1),
                last_commit_votes: Vec::<VoteInfo>::new(),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Halted(_)));
    }
}
