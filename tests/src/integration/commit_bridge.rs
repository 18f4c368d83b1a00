//! # Commit Bridge Scenarios
//!
//! The engine hears about each committed height as new exactly once, even
//! when the process dies between the store write and the acknowledgement,
//! and replayed heights are reported as not new.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use node_runtime::AppError;
    use serde_json::json;
    use shared_types::{Coins, RequestBeginBlock, RequestEndBlock};

    fn doc() -> node_runtime::GenesisDoc {
        let operator = key(1);
        genesis()
            .fund(operator.address(), Coins::single(DENOM, 1_000_000_000))
            .validator(&operator, "v1", 100_000_000)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_each_height_notified_once_as_new() {
        let mut chain = TestChain::start(&doc(), config()).unwrap();
        for _ in 0..3 {
            chain.empty_block().unwrap();
        }
        assert_eq!(
            chain.engine.commit_notifications(),
            vec![(true, 1), (true, 2), (true, 3)]
        );
        assert_eq!(chain.engine.checkpoint_height(), 3);
    }

    #[test]
    fn test_crash_before_ack_renotifies_on_restart() {
        let mut chain = TestChain::start(&doc(), config()).unwrap();
        chain.empty_block().unwrap();

        chain
            .app
            .begin_block(&RequestBeginBlock {
                header: header(2),
                last_commit_votes: Vec::new(),
            })
            .unwrap();
        chain.app.end_block(&RequestEndBlock { height: 2 }).unwrap();
        chain.engine.fail_next("connection reset");
        let err = chain.app.commit().unwrap_err();
        assert!(matches!(err, AppError::Bridge(_)));
        assert!(chain.app.is_halted());

        // The store wrote height 2; the engine never saw it.
        assert_eq!(chain.app.last_block_height(), 2);
        assert_eq!(chain.engine.checkpoint_height(), 1);

        let mut chain = chain.restart().unwrap();
        assert!(!chain.app.is_halted());
        assert_eq!(chain.engine.commit_notifications(), vec![(true, 1), (true, 2)]);
        assert_eq!(chain.engine.checkpoint_height(), 2);

        let block = chain.empty_block().unwrap();
        assert_eq!(block.height, 3);
        assert_eq!(chain.engine.checkpoint_height(), 3);
    }

    #[test]
    fn test_restart_after_ack_sends_nothing() {
        let mut chain = TestChain::start(&doc(), config()).unwrap();
        chain.empty_block().unwrap();
        chain.empty_block().unwrap();

        let chain = chain.restart().unwrap();
        assert_eq!(chain.engine.commit_notifications(), vec![(true, 1), (true, 2)]);
        assert_eq!(chain.app.last_block_height(), 2);
    }

    #[test]
    fn test_replayed_height_reported_not_new() {
        let mut chain = TestChain::start(&doc(), config()).unwrap();
        chain.empty_block().unwrap();
        let original = chain.empty_block().unwrap();

        let mut chain = chain.restart().unwrap();
        chain.app.load_height(1).unwrap();
        let replayed = chain.empty_block().unwrap();

        assert_eq!(replayed.height, 2);
        assert_eq!(replayed.app_hash, original.app_hash);
        let notifications = chain.engine.commit_notifications();
        assert_eq!(notifications.last(), Some(&(false, 2)));
        assert_eq!(
            notifications.iter().filter(|n| **n == (true, 2)).count(),
            1
        );
        assert_eq!(chain.engine.checkpoint_height(), 2);

        chain.empty_block().unwrap();
        assert_eq!(chain.engine.commit_notifications().last(), Some(&(true, 3)));
        assert_eq!(chain.engine.checkpoint_height(), 3);
    }

    #[test]
    fn test_replayed_block_with_engine_actions_keeps_app_hash() {
        let mut chain = TestChain::start(&doc(), config()).unwrap();
        chain.empty_block().unwrap();
        chain
            .engine
            .queue_action(json!({"type": "setStorage", "key": "swing.k", "value": "v2"}));
        let original = chain.empty_block().unwrap();

        let mut chain = chain.restart().unwrap();
        chain.app.load_height(1).unwrap();
        // Would be applied by a fresh END_BLOCK; the replay must not see it.
        chain
            .engine
            .queue_action(json!({"type": "setStorage", "key": "swing.k", "value": "other"}));
        let replayed = chain.empty_block().unwrap();

        assert_eq!(replayed.app_hash, original.app_hash);
        assert!(!chain.app.is_halted());
        let block_calls: Vec<bool> = chain
            .engine
            .calls()
            .iter()
            .filter(|c| c.kind() == "END_BLOCK" && c.payload["blockHeight"] == 2)
            .map(|c| c.is_new_height)
            .collect();
        assert_eq!(block_calls, vec![true, false]);

        let vm = std::sync::Arc::clone(&chain.app.keepers().vmbridge);
        let mut ctx = chain.ctx();
        assert_eq!(vm.storage(&mut ctx, "swing.k").unwrap(), Some("v2".to_string()));

        // The next new height drains what was queued during the replay.
        chain.empty_block().unwrap();
        let mut ctx = chain.ctx();
        assert_eq!(vm.storage(&mut ctx, "swing.k").unwrap(), Some("other".to_string()));
    }

    #[test]
    fn test_halted_app_refuses_work() {
        let mut chain = TestChain::start(&doc(), config()).unwrap();
        chain.empty_block().unwrap();
        chain
            .app
            .begin_block(&RequestBeginBlock {
                header: header(2),
                last_commit_votes: Vec::new(),
            })
            .unwrap();
        chain.app.end_block(&RequestEndBlock { height: 2 }).unwrap();
        chain.engine.fail_next("engine gone");
        assert!(chain.app.commit().is_err());

        let begin = chain.app.begin_block(&RequestBeginBlock {
            header: header(3),
            last_commit_votes: Vec::new(),
        });
        assert!(matches!(begin, Err(AppError::Halted(_))));
        assert!(matches!(chain.app.deliver_tx(b"tx"), Err(AppError::Halted(_))));
        assert!(matches!(chain.app.check_tx(b"tx"), Err(AppError::Halted(_))));
        assert!(chain.app.halt_reason().is_some());
    }
}
