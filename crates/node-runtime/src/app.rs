//! # Lockstep Application
//!
//! The application root: owns the multistore, the keepers, the module
//! manager, the ante handler and the commit bridge, and exposes the ABCI
//! lifecycle to the consensus engine.
//!
//! ## Block Lifecycle
//!
//! ```text
//! InitChain ─► BeginBlock ─► DeliverTx* ─► EndBlock ─► Commit ─► BeginBlock ...
//!                  │              │            │          │
//!             manager order   ante + router  manager   store commit, then
//!                                             order    engine notification
//! ```
//!
//! Three contexts are kept apart:
//!
//! - the block context, created at BeginBlock (or InitChain for block 1)
//!   and committed at Commit
//! - the mempool context, reset to the committed state at every Commit,
//!   which accumulates the ante effects of transactions accepted by CheckTx
//! - query contexts, created per query over the committed state
//!
//! ## Failure Semantics
//!
//! A module error during InitChain, BeginBlock or EndBlock, a fatal message
//! error, or a commit bridge failure halts the application. Every later
//! lifecycle call returns `AppError::Halted`; the node must be restarted by
//! an operator.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use lockstep_telemetry::{time_histogram, BLOCKS_COMMITTED, COMMITTED_HEIGHT, COMMIT_DURATION, TXS_DELIVERED};
use ls_01_store::{
    CommitStore, Context, ExecMode, GasMeter, MultiStore, StoreKey, StoreKeyRegistry,
    TransientStoreKey,
};
use ls_03_commit_bridge::{CommitBridge, ExternalEngine};
use ls_04_orchestrator::{InvariantRegistry, ModuleManager, MsgRouter, QueryRouter};
use ls_05_keepers::{GenesisTxDeliverer, GenutilModule, ModuleAccountPermissions};
use ls_06_ante::AnteHandler;
use shared_types::{
    tx_hash, Address, BlockHeader, GenesisState, Hash, RequestBeginBlock, RequestEndBlock,
    RequestInitChain, RequestQuery, ResponseBeginBlock, ResponseCheckTx, ResponseCommit,
    ResponseDeliverTx, ResponseEndBlock, ResponseInitChain, ResponseQuery,
};

use crate::container::{AppConfig, AppKeepers};
use crate::errors::{AppError, AppResult};
use crate::genesis::{GenesisDoc, GenesisError};
use crate::handlers::{handle_query, RunTxMode, TxRunner};
use crate::wiring::{module_ordering, ORDERING_CONSTRAINTS, PERSISTENT_STORES, TRANSIENT_STORES};

/// State exported at a committed height.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedApp {
    pub height: u64,
    pub genesis: GenesisDoc,
}

pub struct LockstepApp {
    config: AppConfig,
    registry: Arc<StoreKeyRegistry>,
    keepers: AppKeepers,
    manager: ModuleManager,
    queries: QueryRouter,
    invariants: Arc<InvariantRegistry>,
    runner: Arc<TxRunner>,
    bridge: CommitBridge,
    store: MultiStore,
    /// Header of the last committed block.
    last_header: BlockHeader,
    /// Block in progress, from BeginBlock (InitChain for block 1) to Commit.
    deliver_state: Option<Context>,
    /// Mempool view: committed state plus the ante effects of accepted txs.
    check_state: Context,
    halted: Option<String>,
}

impl LockstepApp {
    /// Build and wire the application.
    ///
    /// With `load_latest` the highest committed version is loaded from
    /// `commit_store` and any commit the engine has not acknowledged yet is
    /// re-notified before the app serves a block.
    pub fn new(
        config: AppConfig,
        engine: Arc<dyn ExternalEngine>,
        commit_store: Arc<dyn CommitStore>,
        load_latest: bool,
    ) -> AppResult<Self> {
        config.validate()?;
        info!(chain_id = %config.chain.chain_id, "[app] assembling application");

        let registry = Arc::new(StoreKeyRegistry::new(PERSISTENT_STORES, TRANSIENT_STORES)?);
        let bridge = CommitBridge::new(Arc::clone(&engine));
        let keepers = AppKeepers::new(&registry, &config.chain, engine, bridge.acknowledged())?;

        let genutil = Arc::new(GenutilModule::new(Arc::clone(&keepers.staking)));
        let manager = ModuleManager::new(
            keepers.modules(Arc::clone(&genutil)),
            module_ordering(),
            ORDERING_CONSTRAINTS,
        )?;

        let mut msgs = MsgRouter::new();
        let mut queries = QueryRouter::new();
        manager.register_routes(&mut msgs, &mut queries)?;

        let mut invariants = InvariantRegistry::new();
        manager.register_invariants(&mut invariants);
        let invariants = Arc::new(invariants);
        keepers.crisis.set_invariants(Arc::clone(&invariants))?;

        let ante = Arc::new(AnteHandler::new(
            Arc::clone(&keepers.auth),
            Arc::clone(&keepers.supply),
            Arc::clone(&keepers.ibc),
            config.mempool.min_gas_prices.clone(),
        ));
        let runner = Arc::new(TxRunner::new(ante, Arc::new(msgs)));
        let deliverer: Arc<dyn GenesisTxDeliverer> = runner.clone();
        genutil.set_deliverer(deliverer)?;

        let mut store = MultiStore::new(Arc::clone(&registry), commit_store);
        if load_latest {
            let version = store.load_latest()?;
            if let Some(height) = bridge.recover(&store)? {
                warn!(height, "[app] re-notified engine of unacknowledged commit");
            }
            info!(version, "[app] loaded latest version");
        } else {
            bridge.sync(&store)?;
        }

        let last_header = Self::committed_header(&store, &config.chain.chain_id)?;
        let check_state = Self::committed_context_at(&store, &registry, &last_header, ExecMode::Check);

        info!(
            modules = manager.module_names().len(),
            invariants = invariants.len(),
            version = store.version(),
            "[app] application ready"
        );
        Ok(Self {
            config,
            registry,
            keepers,
            manager,
            queries,
            invariants,
            runner,
            bridge,
            store,
            last_header,
            deliver_state: None,
            check_state,
            halted: None,
        })
    }

    // =========================================================================
    // ABCI lifecycle
    // =========================================================================

    /// Run every module's genesis in the mandated order.
    ///
    /// The resulting state is not committed here: it becomes the starting
    /// state of block 1.
    pub fn init_chain(&mut self, req: &RequestInitChain) -> AppResult<ResponseInitChain> {
        self.ensure_live()?;
        if self.store.version() > 0 {
            return Err(AppError::AlreadyInitialized {
                height: self.store.version(),
            });
        }
        self.check_chain_id(&req.chain_id)?;

        let genesis: GenesisState = serde_json::from_slice(&req.app_state_bytes)
            .map_err(|e| GenesisError::Parse(e.to_string()))?;
        let header = BlockHeader {
            chain_id: req.chain_id.clone(),
            height: 0,
            time: req.time,
            proposer: Address::default(),
        };
        let mut ctx = Context::new(
            header.clone(),
            ExecMode::Genesis,
            self.store.working_state(),
            Arc::clone(&self.registry),
        );

        let validators = match self.manager.init_genesis(&mut ctx, &genesis) {
            Ok(validators) => validators,
            Err(e) => return Err(self.halt(e.into())),
        };
        if !req.validators.is_empty() {
            let mut declared = req.validators.clone();
            declared.sort();
            let mut computed = validators.clone();
            computed.sort();
            if declared != computed {
                return Err(self.halt(AppError::ValidatorSetMismatch));
            }
        }

        let app_hash = ctx.state().flatten().root_hash();
        let mut check_state = ctx.branch();
        check_state.set_mode(ExecMode::Check);
        self.check_state = check_state;
        self.last_header = header;
        self.deliver_state = Some(ctx);

        info!(
            chain_id = %req.chain_id,
            validators = validators.len(),
            app_hash = %hex::encode(app_hash),
            "[app] chain initialized"
        );
        Ok(ResponseInitChain { validators, app_hash })
    }

    pub fn begin_block(&mut self, req: &RequestBeginBlock) -> AppResult<ResponseBeginBlock> {
        self.ensure_live()?;
        self.check_chain_id(&req.header.chain_id)?;
        let expected = self.store.version() + 1;
        if req.header.height != expected {
            return Err(AppError::UnexpectedHeight {
                expected,
                got: req.header.height,
            });
        }

        // Block 1 continues from the genesis state; later blocks start from
        // the last commit.
        let carried = if self.store.version() == 0 {
            self.deliver_state.take()
        } else {
            if self.deliver_state.take().is_some() {
                warn!(height = expected, "[app] discarding uncommitted block state");
            }
            None
        };
        let mut ctx = carried.unwrap_or_else(|| {
            Context::new(
                req.header.clone(),
                ExecMode::Deliver,
                self.store.working_state(),
                Arc::clone(&self.registry),
            )
        });
        ctx.set_header(req.header.clone());
        ctx.set_mode(ExecMode::Deliver);
        ctx.set_gas_meter(GasMeter::infinite());
        ctx.reset_transient();

        let response = match self.manager.begin_block(&mut ctx, req) {
            Ok(response) => response,
            Err(e) => return Err(self.halt(e.into())),
        };
        self.deliver_state = Some(ctx);
        debug!(height = req.header.height, events = response.events.len(), "[app] begin block");
        Ok(response)
    }

    pub fn deliver_tx(&mut self, tx_bytes: &[u8]) -> AppResult<ResponseDeliverTx> {
        self.ensure_live()?;
        let ctx = self.deliver_state.as_mut().ok_or(AppError::NoBlockInProgress)?;
        let result = self.runner.run(ctx, tx_bytes, RunTxMode::Deliver);
        let response = match result {
            Ok(response) => response,
            Err(e) => return Err(self.halt(e.into())),
        };

        let outcome = if response.is_ok() { "ok" } else { "failed" };
        TXS_DELIVERED.with_label_values(&[outcome]).inc();
        debug!(
            tx_hash = %hex::encode(tx_hash(tx_bytes)),
            code = response.code,
            gas_used = response.gas_used,
            "[app] tx delivered"
        );
        Ok(response)
    }

    /// Mempool admission: ante only, against the mempool context.
    pub fn check_tx(&mut self, tx_bytes: &[u8]) -> AppResult<ResponseCheckTx> {
        self.ensure_live()?;
        Ok(self.runner.run(&mut self.check_state, tx_bytes, RunTxMode::Check)?)
    }

    /// Run a transaction, messages included, on a throwaway branch of the
    /// mempool context. Signatures are not checked; the response reports the
    /// gas the transaction would use.
    pub fn simulate(&self, tx_bytes: &[u8]) -> AppResult<ResponseDeliverTx> {
        self.ensure_live()?;
        let mut ctx = self.check_state.branch();
        Ok(self.runner.run(&mut ctx, tx_bytes, RunTxMode::Simulate)?)
    }

    pub fn end_block(&mut self, req: &RequestEndBlock) -> AppResult<ResponseEndBlock> {
        self.ensure_live()?;
        let ctx = self.deliver_state.as_mut().ok_or(AppError::NoBlockInProgress)?;
        if req.height != ctx.height() {
            return Err(AppError::UnexpectedHeight {
                expected: ctx.height(),
                got: req.height,
            });
        }
        let result = self.manager.end_block(ctx, req);
        match result {
            Ok(response) => {
                debug!(
                    height = req.height,
                    validator_updates = response.validator_updates.len(),
                    "[app] end block"
                );
                Ok(response)
            }
            Err(e) => Err(self.halt(e.into())),
        }
    }

    /// Commit the block, then notify the external engine.
    pub fn commit(&mut self) -> AppResult<ResponseCommit> {
        self.ensure_live()?;
        let ctx = self.deliver_state.take().ok_or(AppError::NoBlockInProgress)?;
        let header = ctx.header().clone();
        if let Err(e) = self.store.set_block_time(header.height, header.time) {
            return Err(self.halt(e.into()));
        }

        let info = {
            let _timer = time_histogram!(COMMIT_DURATION);
            match self.bridge.commit(&mut self.store, ctx.state()) {
                Ok(info) => info,
                Err(e) => return Err(self.halt(e.into())),
            }
        };
        BLOCKS_COMMITTED.inc();
        COMMITTED_HEIGHT.set(info.version as f64);

        self.check_state =
            Self::committed_context_at(&self.store, &self.registry, &header, ExecMode::Check);
        self.last_header = header;
        info!(
            height = info.version,
            app_hash = %hex::encode(info.hash),
            newly_written = info.newly_written,
            "[app] block committed"
        );

        let halt_height = self.config.chain.halt_height;
        if halt_height != 0 && info.version >= halt_height {
            let reason = format!("halt height {halt_height} reached");
            warn!(height = info.version, "[app] {reason}");
            self.halted = Some(reason);
            return Err(AppError::HaltHeightReached {
                height: info.version,
            });
        }
        Ok(ResponseCommit {
            data: info.hash,
            height: info.version,
        })
    }

    /// Answer a query against the last committed state.
    pub fn query(&self, req: &RequestQuery) -> ResponseQuery {
        let mut ctx = self.committed_context();
        handle_query(&self.queries, &mut ctx, req)
    }

    // =========================================================================
    // State management
    // =========================================================================

    /// Roll the application back to a committed height, dropping any block
    /// in progress. Blocks above `height` can then be replayed.
    pub fn load_height(&mut self, height: u64) -> AppResult<()> {
        self.ensure_live()?;
        self.store.load_version(height)?;
        self.bridge.sync(&self.store)?;
        self.deliver_state = None;
        self.last_header = Self::committed_header(&self.store, &self.config.chain.chain_id)?;
        self.check_state =
            Self::committed_context_at(&self.store, &self.registry, &self.last_header, ExecMode::Check);
        info!(height, "[app] loaded height");
        Ok(())
    }

    /// Every module's state at the last committed height.
    pub fn export_genesis(&self) -> AppResult<ExportedApp> {
        let mut ctx = self.committed_context();
        let app_state = self.manager.export_genesis(&mut ctx)?;
        Ok(ExportedApp {
            height: self.store.version(),
            genesis: GenesisDoc {
                chain_id: self.config.chain.chain_id.clone(),
                genesis_time: self.last_header.time,
                app_state,
            },
        })
    }

    /// Read-only context over the last committed state.
    pub fn committed_context(&self) -> Context {
        Self::committed_context_at(&self.store, &self.registry, &self.last_header, ExecMode::Query)
    }

    /// Header of the loaded version, with the block time recorded at its
    /// commit. Proposer is not kept.
    fn committed_header(store: &MultiStore, chain_id: &str) -> AppResult<BlockHeader> {
        let height = store.version();
        Ok(BlockHeader {
            chain_id: chain_id.to_string(),
            height,
            time: store.block_time(height)?.unwrap_or_default(),
            ..Default::default()
        })
    }

    fn committed_context_at(
        store: &MultiStore,
        registry: &Arc<StoreKeyRegistry>,
        header: &BlockHeader,
        mode: ExecMode,
    ) -> Context {
        let mut header = header.clone();
        header.height = store.version();
        Context::new(header, mode, store.working_state(), Arc::clone(registry))
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn get_key(&self, name: &str) -> Option<StoreKey> {
        self.registry.key(name)
    }

    pub fn get_tkey(&self, name: &str) -> Option<TransientStoreKey> {
        self.registry.transient_key(name)
    }

    /// Addresses of every module account. These cannot receive plain sends.
    pub fn module_account_addrs(&self) -> BTreeSet<Address> {
        self.keepers.permissions.addresses()
    }

    pub fn module_account_permissions(&self) -> &Arc<ModuleAccountPermissions> {
        &self.keepers.permissions
    }

    pub fn keepers(&self) -> &AppKeepers {
        &self.keepers
    }

    pub fn manager(&self) -> &ModuleManager {
        &self.manager
    }

    pub fn invariants(&self) -> &Arc<InvariantRegistry> {
        &self.invariants
    }

    pub fn ante(&self) -> &AnteHandler {
        self.runner.ante()
    }

    pub fn engine(&self) -> &Arc<dyn ExternalEngine> {
        self.bridge.engine()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn chain_id(&self) -> &str {
        &self.config.chain.chain_id
    }

    pub fn last_block_height(&self) -> u64 {
        self.store.version()
    }

    pub fn last_commit_hash(&self) -> Hash {
        self.store.last_commit_hash()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_live(&self) -> AppResult<()> {
        match &self.halted {
            Some(reason) => Err(AppError::Halted(reason.clone())),
            None => Ok(()),
        }
    }

    fn check_chain_id(&self, chain_id: &str) -> AppResult<()> {
        if chain_id != self.config.chain.chain_id {
            return Err(AppError::ChainIdMismatch {
                expected: self.config.chain.chain_id.clone(),
                got: chain_id.to_string(),
            });
        }
        Ok(())
    }

    fn halt(&mut self, err: AppError) -> AppError {
        error!(
            height = self.store.version() + 1,
            error = %err,
            "[app] fatal error, halting"
        );
        self.deliver_state = None;
        self.halted = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::GenesisBuilder;
    use ls_01_store::InMemoryCommitStore;
    use ls_03_commit_bridge::InProcessEngine;
    use shared_crypto::{sign_tx, Ed25519KeyPair, SignerInfo};
    use shared_types::{names, Coins, Fee, Msg, MsgSend, Tx};

    const CHAIN: &str = "lockstep-devnet";
    const TIME: u64 = 1_700_000_000;

    struct Fixture {
        app: LockstepApp,
        engine: Arc<InProcessEngine>,
        validator: Ed25519KeyPair,
    }

    fn fixture_with(config: AppConfig) -> Fixture {
        let engine = Arc::new(InProcessEngine::new());
        let store = Arc::new(InMemoryCommitStore::new());
        let mut app = LockstepApp::new(config, engine.clone(), store, false).unwrap();
        let validator = Ed25519KeyPair::from_seed([1; 32]);
        let doc = GenesisBuilder::devnet(CHAIN, &validator)
            .map(|mut doc| {
                doc.genesis_time = TIME;
                doc
            })
            .unwrap();
        app.init_chain(&doc.init_chain_request().unwrap()).unwrap();
        Fixture {
            app,
            engine,
            validator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(AppConfig::default())
    }

    fn header(height: u64) -> BlockHeader {
        BlockHeader {
            chain_id: CHAIN.into(),
            height,
            time: TIME + height * 5,
            proposer: Address::default(),
        }
    }

    fn begin(app: &mut LockstepApp, height: u64) -> AppResult<ResponseBeginBlock> {
        app.begin_block(&RequestBeginBlock {
            header: header(height),
            last_commit_votes: Vec::new(),
        })
    }

    fn empty_block(app: &mut LockstepApp, height: u64) -> AppResult<ResponseCommit> {
        begin(app, height)?;
        app.end_block(&RequestEndBlock { height })?;
        app.commit()
    }

    fn balance(app: &LockstepApp, address: &Address) -> u128 {
        let mut ctx = app.committed_context();
        app.keepers().bank.balance(&mut ctx, address).unwrap().amount_of("ubld")
    }

    fn send_tx(app: &LockstepApp, from: &Ed25519KeyPair, to: Address, amount: u128) -> Vec<u8> {
        let mut ctx = app.committed_context();
        let account = app
            .keepers()
            .auth
            .account(&mut ctx, &from.address())
            .unwrap()
            .unwrap();
        let mut tx = Tx {
            msgs: vec![Msg::Send(MsgSend {
                from: from.address(),
                to,
                amount: Coins::single("ubld", amount),
            })],
            fee: Fee {
                amount: Coins::single("ubld", 500),
                gas_limit: 200_000,
            },
            memo: String::new(),
            timeout_height: 0,
            signatures: Vec::new(),
        };
        sign_tx(
            &mut tx,
            CHAIN,
            &[SignerInfo {
                key: from,
                account_number: account.account_number,
                sequence: account.sequence,
            }],
        )
        .unwrap();
        tx.encode().unwrap()
    }

    #[test]
    fn test_init_chain_leaves_genesis_uncommitted() {
        let f = fixture();
        let export = f.app.export_genesis().unwrap();
        assert_eq!(export.height, 0);
        // Nothing is committed until block 1.
        assert_eq!(f.app.last_block_height(), 0);
        assert!(f.app.deliver_state.is_some());
    }

    #[test]
    fn test_init_chain_twice_rejected() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        let doc = GenesisBuilder::devnet(CHAIN, &f.validator).unwrap();
        let err = f.app.init_chain(&doc.init_chain_request().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::AlreadyInitialized { height: 1 }));
    }

    #[test]
    fn test_blocks_commit_in_sequence_and_notify_engine() {
        let mut f = fixture();
        let first = empty_block(&mut f.app, 1).unwrap();
        let second = empty_block(&mut f.app, 2).unwrap();

        assert_eq!(first.height, 1);
        assert_eq!(second.height, 2);
        assert_eq!(f.app.last_block_height(), 2);
        assert_eq!(f.app.last_commit_hash(), second.data);
        assert_eq!(f.engine.commit_notifications(), vec![(true, 1), (true, 2)]);
        assert_eq!(f.engine.checkpoint_height(), 2);
    }

    #[test]
    fn test_out_of_order_height_rejected_without_halting() {
        let mut f = fixture();
        let err = begin(&mut f.app, 2).unwrap_err();
        assert!(matches!(err, AppError::UnexpectedHeight { expected: 1, got: 2 }));
        assert!(!f.app.is_halted());
        assert!(empty_block(&mut f.app, 1).is_ok());
    }

    #[test]
    fn test_wrong_chain_id_rejected() {
        let mut f = fixture();
        let mut req = RequestBeginBlock {
            header: header(1),
            last_commit_votes: Vec::new(),
        };
        req.header.chain_id = "other".into();
        let err = f.app.begin_block(&req).unwrap_err();
        assert!(matches!(err, AppError::ChainIdMismatch { .. }));
    }

    #[test]
    fn test_deliver_tx_moves_funds_and_charges_fee() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        let recipient = Address([9; 20]);
        let sender_before = balance(&f.app, &f.validator.address());

        begin(&mut f.app, 2).unwrap();
        let tx = send_tx(&f.app, &f.validator, recipient, 1_000);
        let response = f.app.deliver_tx(&tx).unwrap();
        assert!(response.is_ok(), "{}", response.log);
        assert!(response.gas_used > 0);
        assert!(response.events.iter().any(|e| e.kind == "tx"));
        f.app.end_block(&RequestEndBlock { height: 2 }).unwrap();
        f.app.commit().unwrap();

        assert_eq!(balance(&f.app, &recipient), 1_000);
        assert_eq!(balance(&f.app, &f.validator.address()), sender_before - 1_000 - 500);
    }

    #[test]
    fn test_failed_message_keeps_fee_and_sequence() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        let sender_before = balance(&f.app, &f.validator.address());

        begin(&mut f.app, 2).unwrap();
        // More than the sender holds: ante passes, the send fails.
        let tx = send_tx(&f.app, &f.validator, Address([9; 20]), sender_before);
        let response = f.app.deliver_tx(&tx).unwrap();
        assert!(!response.is_ok());
        f.app.end_block(&RequestEndBlock { height: 2 }).unwrap();
        f.app.commit().unwrap();

        assert_eq!(balance(&f.app, &Address([9; 20])), 0);
        assert_eq!(balance(&f.app, &f.validator.address()), sender_before - 500);
        let mut ctx = f.app.committed_context();
        let account = f
            .app
            .keepers()
            .auth
            .account(&mut ctx, &f.validator.address())
            .unwrap()
            .unwrap();
        assert_eq!(account.sequence, 1);
    }

    #[test]
    fn test_check_tx_rejects_replay_in_mempool() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        let tx = send_tx(&f.app, &f.validator, Address([9; 20]), 10);

        assert!(f.app.check_tx(&tx).unwrap().is_ok());
        let replay = f.app.check_tx(&tx).unwrap();
        assert!(!replay.is_ok());
        assert_eq!(replay.code, 32);

        // Commit resets the mempool view to committed state.
        empty_block(&mut f.app, 2).unwrap();
        assert!(f.app.check_tx(&tx).unwrap().is_ok());
    }

    #[test]
    fn test_check_tx_enforces_min_gas_prices() {
        let mut config = AppConfig::default();
        config.mempool.min_gas_prices = "1ubld".parse().unwrap();
        let mut f = fixture_with(config);
        empty_block(&mut f.app, 1).unwrap();

        let tx = send_tx(&f.app, &f.validator, Address([9; 20]), 10);
        let response = f.app.check_tx(&tx).unwrap();
        assert!(!response.is_ok());

        // Block execution ignores local gas prices.
        begin(&mut f.app, 2).unwrap();
        assert!(f.app.deliver_tx(&tx).unwrap().is_ok());
    }

    #[test]
    fn test_simulate_leaves_state_untouched() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        let tx = send_tx(&f.app, &f.validator, Address([9; 20]), 10);

        let response = f.app.simulate(&tx).unwrap();
        assert!(response.is_ok(), "{}", response.log);
        assert!(response.gas_used > 0);
        assert!(f.app.check_tx(&tx).unwrap().is_ok());
    }

    #[test]
    fn test_garbage_tx_rejected_with_decode_code() {
        let mut f = fixture();
        begin(&mut f.app, 1).unwrap();
        let response = f.app.deliver_tx(b"not a transaction").unwrap();
        assert_eq!(response.code, 2);
        assert!(!f.app.is_halted());
    }

    #[test]
    fn test_engine_failure_halts_app() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        begin(&mut f.app, 2).unwrap();
        f.app.end_block(&RequestEndBlock { height: 2 }).unwrap();

        f.engine.fail_next("engine unavailable");
        assert!(matches!(f.app.commit(), Err(AppError::Bridge(_))));
        assert!(f.app.is_halted());
        assert!(matches!(begin(&mut f.app, 3), Err(AppError::Halted(_))));
        assert!(matches!(f.app.check_tx(b"{}"), Err(AppError::Halted(_))));
    }

    #[test]
    fn test_halt_height_stops_after_commit() {
        let mut config = AppConfig::default();
        config.chain.halt_height = 2;
        let mut f = fixture_with(config);
        empty_block(&mut f.app, 1).unwrap();

        let err = empty_block(&mut f.app, 2).unwrap_err();
        assert!(matches!(err, AppError::HaltHeightReached { height: 2 }));
        assert_eq!(f.app.last_block_height(), 2);
        assert!(matches!(begin(&mut f.app, 3), Err(AppError::Halted(_))));
    }

    #[test]
    fn test_deliver_without_block_rejected() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        assert!(matches!(f.app.deliver_tx(b"{}"), Err(AppError::NoBlockInProgress)));
        assert!(matches!(f.app.commit(), Err(AppError::NoBlockInProgress)));
    }

    #[test]
    fn test_query_reads_committed_state() {
        let mut f = fixture();
        let before = f.app.query(&RequestQuery {
            path: "app/height".into(),
            data: Vec::new(),
        });
        assert_eq!(before.value, b"0");

        empty_block(&mut f.app, 1).unwrap();
        let after = f.app.query(&RequestQuery {
            path: "app/height".into(),
            data: Vec::new(),
        });
        assert_eq!(after.code, 0);
        assert_eq!(after.value, b"1");
        assert_eq!(after.height, 1);

        let unknown = f.app.query(&RequestQuery {
            path: "nowhere/at_all".into(),
            data: Vec::new(),
        });
        assert_ne!(unknown.code, 0);
    }

    #[test]
    fn test_load_height_allows_replay() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        let second = empty_block(&mut f.app, 2).unwrap();

        f.app.load_height(1).unwrap();
        assert_eq!(f.app.last_block_height(), 1);
        let replayed = empty_block(&mut f.app, 2).unwrap();
        assert_eq!(replayed.data, second.data);
        assert_eq!(f.engine.commit_notifications().last(), Some(&(false, 2)));
    }

    #[test]
    fn test_store_key_lookups_return_registry_instances() {
        let f = fixture();
        let a = f.app.get_key(names::BANK).unwrap();
        let b = f.app.get_key(names::BANK).unwrap();
        assert_eq!(a, b);
        assert!(f.app.get_key("nonexistent").is_none());
        assert!(f.app.get_tkey(names::TRANSIENT_PARAMS).is_some());
        assert!(f.app.get_tkey(names::BANK).is_none());
    }

    #[test]
    fn test_module_accounts_exposed() {
        let f = fixture();
        let addrs = f.app.module_account_addrs();
        assert!(addrs.contains(&Address::module(names::FEE_COLLECTOR)));
        assert!(addrs.contains(&Address::module(names::BONDED_POOL)));
        assert!(!addrs.contains(&f.validator.address()));
        assert!(f.app.module_account_permissions().contains(names::MINT));
    }

    #[test]
    fn test_export_genesis_after_blocks() {
        let mut f = fixture();
        empty_block(&mut f.app, 1).unwrap();
        let export = f.app.export_genesis().unwrap();
        assert_eq!(export.height, 1);
        assert_eq!(export.genesis.chain_id, CHAIN);
        for module in [names::AUTH, names::BANK, names::STAKING, names::SUPPLY] {
            assert!(export.genesis.app_state.contains_key(module), "{module}");
        }
    }

    #[test]
    fn test_restart_resumes_from_store() {
        let engine = Arc::new(InProcessEngine::new());
        let store = Arc::new(InMemoryCommitStore::new());
        let validator = Ed25519KeyPair::from_seed([1; 32]);
        let doc = GenesisBuilder::devnet(CHAIN, &validator).unwrap();

        let hash = {
            let mut app =
                LockstepApp::new(AppConfig::default(), engine.clone(), store.clone(), false).unwrap();
            app.init_chain(&doc.init_chain_request().unwrap()).unwrap();
            empty_block(&mut app, 1).unwrap();
            empty_block(&mut app, 2).unwrap().data
        };

        let mut app = LockstepApp::new(AppConfig::default(), engine.clone(), store, true).unwrap();
        assert_eq!(app.last_block_height(), 2);
        assert_eq!(app.last_commit_hash(), hash);
        assert!(empty_block(&mut app, 3).is_ok());
        assert_eq!(engine.checkpoint_height(), 3);
    }
}
