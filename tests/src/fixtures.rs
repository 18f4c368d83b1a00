//! # Test Chain Fixture
//!
//! Drives a `LockstepApp` the way a consensus engine would, with a commit
//! store and an execution engine that outlive the app so a test can restart
//! the process and keep its state.

use std::sync::Arc;

use ls_01_store::{Context, InMemoryCommitStore};
use ls_03_commit_bridge::InProcessEngine;
use node_runtime::{AppConfig, AppResult, GenesisBuilder, GenesisDoc, LockstepApp};
use shared_crypto::{sign_tx, Ed25519KeyPair, SignerInfo};
use shared_types::{
    Address, BlockHeader, Coins, Fee, Hash, Msg, MsgSend, RequestBeginBlock, RequestEndBlock,
    ResponseDeliverTx, Tx, VoteInfo,
};

pub const CHAIN_ID: &str = "lockstep-test";
pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const BLOCK_SECONDS: u64 = 5;
pub const DENOM: &str = "ubld";

pub fn key(seed: u8) -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed([seed; 32])
}

pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.chain.chain_id = CHAIN_ID.to_string();
    config
}

pub fn genesis() -> GenesisBuilder {
    GenesisBuilder::new(CHAIN_ID).genesis_time(GENESIS_TIME)
}

pub fn header(height: u64) -> BlockHeader {
    BlockHeader {
        chain_id: CHAIN_ID.to_string(),
        height,
        time: GENESIS_TIME + height * BLOCK_SECONDS,
        proposer: Address::default(),
    }
}

/// Every validator in `keys` signed the previous block, except `missing`.
pub fn votes(keys: &[(&Ed25519KeyPair, u64)], missing: &[Address]) -> Vec<VoteInfo> {
    keys.iter()
        .map(|(key, power)| VoteInfo {
            validator: key.address(),
            power: *power,
            signed_last_block: !missing.contains(&key.address()),
        })
        .collect()
}

pub struct TestChain {
    pub app: LockstepApp,
    pub engine: Arc<InProcessEngine>,
    pub store: Arc<InMemoryCommitStore>,
    pub config: AppConfig,
}

impl TestChain {
    /// Fresh store and engine, InitChain from `doc`.
    pub fn start(doc: &GenesisDoc, config: AppConfig) -> AppResult<Self> {
        let engine = Arc::new(InProcessEngine::new());
        let store = Arc::new(InMemoryCommitStore::new());
        let mut app = LockstepApp::new(config.clone(), engine.clone(), store.clone(), false)?;
        app.init_chain(&doc.init_chain_request()?)?;
        Ok(Self {
            app,
            engine,
            store,
            config,
        })
    }

    /// Drop the app and build a new one over the same store and engine.
    pub fn restart(self) -> AppResult<Self> {
        let Self {
            app,
            engine,
            store,
            config,
        } = self;
        drop(app);
        let app = LockstepApp::new(config.clone(), engine.clone(), store.clone(), true)?;
        Ok(Self {
            app,
            engine,
            store,
            config,
        })
    }

    pub fn next_height(&self) -> u64 {
        self.app.last_block_height() + 1
    }

    /// Run a whole block at the next height and commit it.
    pub fn block(&mut self, txs: &[Vec<u8>], votes: Vec<VoteInfo>) -> AppResult<BlockResult> {
        let height = self.next_height();
        self.app.begin_block(&RequestBeginBlock {
            header: header(height),
            last_commit_votes: votes,
        })?;
        let mut results = Vec::with_capacity(txs.len());
        for tx in txs {
            results.push(self.app.deliver_tx(tx)?);
        }
        self.app.end_block(&RequestEndBlock { height })?;
        let commit = self.app.commit()?;
        Ok(BlockResult {
            height: commit.height,
            app_hash: commit.data,
            txs: results,
        })
    }

    pub fn empty_block(&mut self) -> AppResult<BlockResult> {
        self.block(&[], Vec::new())
    }

    pub fn ctx(&self) -> Context {
        self.app.committed_context()
    }

    pub fn balance(&self, address: &Address) -> u128 {
        let mut ctx = self.ctx();
        self.app
            .keepers()
            .bank
            .balance(&mut ctx, address)
            .map(|c| c.amount_of(DENOM))
            .unwrap_or(0)
    }

    /// `(account_number, sequence)` at the last commit.
    pub fn account(&self, address: &Address) -> (u64, u64) {
        let mut ctx = self.ctx();
        self.app
            .keepers()
            .auth
            .account(&mut ctx, address)
            .ok()
            .flatten()
            .map(|a| (a.account_number, a.sequence))
            .unwrap_or((0, 0))
    }
}

pub struct BlockResult {
    pub height: u64,
    pub app_hash: Hash,
    pub txs: Vec<ResponseDeliverTx>,
}

/// A signed single-message transaction.
pub fn signed_tx(
    key: &Ed25519KeyPair,
    msg: Msg,
    fee: u128,
    account_number: u64,
    sequence: u64,
) -> Vec<u8> {
    let mut tx = Tx {
        msgs: vec![msg],
        fee: Fee {
            amount: if fee == 0 {
                Coins::new()
            } else {
                Coins::single(DENOM, fee)
            },
            gas_limit: 200_000,
        },
        memo: String::new(),
        timeout_height: 0,
        signatures: Vec::new(),
    };
    sign_tx(
        &mut tx,
        CHAIN_ID,
        &[SignerInfo {
            key,
            account_number,
            sequence,
        }],
    )
    .expect("signing");
    tx.encode().expect("encoding")
}

pub fn send(from: &Ed25519KeyPair, to: Address, amount: u128) -> Msg {
    Msg::Send(MsgSend {
        from: from.address(),
        to,
        amount: Coins::single(DENOM, amount),
    })
}

/// Mint genesis that never inflates, so balances only move through txs.
pub fn no_inflation() -> serde_json::Value {
    use ls_05_keepers::mint::{MintGenesis, MintParams, Minter};
    use shared_types::Decimal;

    let genesis = MintGenesis {
        minter: Minter {
            inflation: Decimal::ZERO,
            annual_provisions: Decimal::ZERO,
        },
        params: MintParams {
            inflation_rate_change: Decimal::ZERO,
            inflation_max: Decimal::ZERO,
            inflation_min: Decimal::ZERO,
            ..MintParams::default()
        },
    };
    serde_json::to_value(genesis).expect("mint genesis")
}
