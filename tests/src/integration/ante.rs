//! # Fee Scenarios
//!
//! Whether a transaction can pay its fee depends on what earlier
//! transactions in the same block spent. The outcome must be the same on
//! every node and on every replay.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use shared_types::Coins;

    const INSUFFICIENT_FUNDS: u32 = 5;
    const BAD_SEQUENCE: u32 = 32;

    struct Setup {
        chain: TestChain,
        payer: shared_crypto::Ed25519KeyPair,
        recipient: shared_types::Address,
        txs: Vec<Vec<u8>>,
    }

    /// Payer holds 1_500. The first tx spends 400 on fees and 1_000 on a
    /// send, leaving 100: too little for the second tx's 400 fee.
    fn setup() -> Setup {
        let payer = key(3);
        let recipient = key(4).address();
        let doc = genesis()
            .fund(payer.address(), Coins::single(DENOM, 1_500))
            .module_state(shared_types::names::MINT, no_inflation())
            .build()
            .unwrap();
        let mut chain = TestChain::start(&doc, config()).unwrap();
        chain.empty_block().unwrap();

        let (account_number, sequence) = chain.account(&payer.address());
        assert_eq!(sequence, 0);
        let txs = vec![
            signed_tx(&payer, send(&payer, recipient, 1_000), 400, account_number, 0),
            signed_tx(&payer, send(&payer, recipient, 10), 400, account_number, 1),
        ];
        Setup {
            chain,
            payer,
            recipient,
            txs,
        }
    }

    #[test]
    fn test_second_fee_rejected_after_first_tx_spends_balance() {
        let Setup {
            mut chain,
            payer,
            recipient,
            txs,
        } = setup();

        let block = chain.block(&txs, Vec::new()).unwrap();
        assert!(block.txs[0].is_ok(), "first tx: {}", block.txs[0].log);
        assert_eq!(block.txs[1].code, INSUFFICIENT_FUNDS);

        assert_eq!(chain.balance(&payer.address()), 100);
        assert_eq!(chain.balance(&recipient), 1_000);
        // The rejected tx did not consume a sequence number.
        assert_eq!(chain.account(&payer.address()).1, 1);
    }

    #[test]
    fn test_replay_reproduces_codes_and_app_hash() {
        let Setup { mut chain, txs, .. } = setup();
        let original = chain.block(&txs, Vec::new()).unwrap();

        chain.app.load_height(1).unwrap();
        let replayed = chain.block(&txs, Vec::new()).unwrap();

        let codes = |b: &BlockResult| b.txs.iter().map(|r| r.code).collect::<Vec<_>>();
        assert_eq!(codes(&original), codes(&replayed));
        assert_eq!(original.app_hash, replayed.app_hash);
        assert_eq!(chain.engine.commit_notifications().last(), Some(&(false, 2)));
    }

    #[test]
    fn test_mempool_charges_fees_across_pending_txs() {
        let Setup {
            mut chain,
            payer,
            recipient,
            ..
        } = setup();
        let (account_number, _) = chain.account(&payer.address());

        // CheckTx runs the ante chain only: each admission deducts its fee
        // from the mempool state, the sends themselves are not applied.
        let codes: Vec<u32> = (0..4)
            .map(|sequence| {
                let tx = signed_tx(&payer, send(&payer, recipient, 1), 400, account_number, sequence);
                chain.app.check_tx(&tx).unwrap().code
            })
            .collect();
        assert_eq!(codes, vec![0, 0, 0, INSUFFICIENT_FUNDS]);

        // Nothing reached the committed state.
        assert_eq!(chain.balance(&payer.address()), 1_500);
    }

    #[test]
    fn test_committed_tx_cannot_reenter_mempool() {
        let Setup {
            mut chain,
            payer,
            recipient,
            ..
        } = setup();
        let (account_number, _) = chain.account(&payer.address());
        let tx = signed_tx(&payer, send(&payer, recipient, 10), 10, account_number, 0);
        let block = chain.block(&[tx.clone()], Vec::new()).unwrap();
        assert!(block.txs[0].is_ok(), "send: {}", block.txs[0].log);

        // Fee is still affordable; only the sequence is stale.
        let again = chain.app.check_tx(&tx).unwrap();
        assert_eq!(again.code, BAD_SEQUENCE);
    }
}
