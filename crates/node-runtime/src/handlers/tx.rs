//! # Transaction Runner
//!
//! Runs one transaction against a block or mempool context.
//!
//! ## Flow
//!
//! ```text
//! decode ─► route check ─► ante (branch) ─┬─ rejected: nothing written
//!                                         └─ ok: written ─► msgs (branch) ─┬─ ok: written
//!                                                                          └─ failed: discarded
//! ```
//!
//! Ante effects (fee, sequence bump, public key) persist even when a message
//! fails, so a failing transaction still pays and cannot be replayed.
//! CheckTx stops after ante.

use std::sync::Arc;

use tracing::{debug, warn};

use lockstep_telemetry::TXS_REJECTED_ANTE;
use ls_01_store::Context;
use ls_04_orchestrator::{ModuleError, ModuleResult, MsgRouter};
use ls_05_keepers::GenesisTxDeliverer;
use ls_06_ante::{AnteError, AnteHandler};
use shared_types::{tx_hash, ResponseDeliverTx, Tx};

/// How far a transaction is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTxMode {
    /// Mempool admission: ante only.
    Check,
    /// Gas estimation: ante without signature checks, then the messages.
    Simulate,
    /// Block execution.
    Deliver,
}

impl RunTxMode {
    fn runs_msgs(self) -> bool {
        !matches!(self, RunTxMode::Check)
    }

    fn metric_label(self) -> Option<&'static str> {
        match self {
            RunTxMode::Check => Some("check"),
            RunTxMode::Deliver => Some("deliver"),
            RunTxMode::Simulate => None,
        }
    }
}

/// Ante handler plus message router; shared by the application and the
/// genesis transaction path.
pub struct TxRunner {
    ante: Arc<AnteHandler>,
    router: Arc<MsgRouter>,
}

impl TxRunner {
    pub fn new(ante: Arc<AnteHandler>, router: Arc<MsgRouter>) -> Self {
        Self { ante, router }
    }

    pub fn ante(&self) -> &AnteHandler {
        &self.ante
    }

    pub fn router(&self) -> &MsgRouter {
        &self.router
    }

    /// Run `tx_bytes` on `ctx`.
    ///
    /// Transaction-level failures come back as a non-zero response code.
    /// `Err` is reserved for fatal module errors (an invariant break or an
    /// engine failure), after which the block must not continue.
    pub fn run(&self, ctx: &mut Context, tx_bytes: &[u8], mode: RunTxMode) -> ModuleResult<ResponseDeliverTx> {
        let tx = match Tx::decode(tx_bytes) {
            Ok(tx) => tx,
            Err(e) => {
                let err = AnteError::TxDecode(e.to_string());
                return Ok(ResponseDeliverTx::error(err.codespace(), err.code(), err.to_string(), 0, 0));
            }
        };
        self.run_decoded(ctx, &tx, tx_bytes.len(), mode)
    }

    pub fn run_decoded(
        &self,
        ctx: &mut Context,
        tx: &Tx,
        tx_len: usize,
        mode: RunTxMode,
    ) -> ModuleResult<ResponseDeliverTx> {
        let gas_wanted = tx.fee.gas_limit;

        if let Some(msg) = tx.msgs.iter().find(|m| !self.router.has_route(m.route())) {
            let err = ModuleError::UnknownRoute(msg.route().to_string());
            return Ok(ResponseDeliverTx::error(
                err.codespace(),
                err.code(),
                err.to_string(),
                gas_wanted,
                0,
            ));
        }

        // The block context keeps its own meter; the tx meter only lives on
        // the branches below.
        let block_meter = ctx.gas_meter().clone();
        let mut tx_ctx = ctx.branch();

        let mut ante_ctx = tx_ctx.branch();
        let simulate = mode == RunTxMode::Simulate;
        if let Err(e) = self.ante.handle(&mut ante_ctx, tx, tx_len, simulate) {
            if let Some(label) = mode.metric_label() {
                TXS_REJECTED_ANTE.with_label_values(&[label]).inc();
            }
            let gas_used = ante_ctx.gas_meter().consumed();
            return Ok(ResponseDeliverTx::error(
                e.codespace(),
                e.code(),
                e.to_string(),
                gas_wanted,
                gas_used,
            ));
        }
        tx_ctx.write_branch(ante_ctx);

        let mut failure: Option<ModuleError> = None;
        if mode.runs_msgs() {
            let mut msg_ctx = tx_ctx.branch();
            for (i, msg) in tx.msgs.iter().enumerate() {
                if let Err(e) = self.router.dispatch(&mut msg_ctx, msg) {
                    if e.is_fatal() {
                        warn!(msg_index = i, msg = msg.type_name(), error = %e, "[tx] fatal message failure");
                        return Err(e);
                    }
                    debug!(msg_index = i, msg = msg.type_name(), error = %e, "[tx] message failed");
                    failure = Some(e);
                    break;
                }
            }
            if failure.is_none() {
                tx_ctx.write_branch(msg_ctx);
            } else {
                tx_ctx.discard_branch(msg_ctx);
            }
        }

        let gas_used = tx_ctx.gas_meter().consumed();
        let events = tx_ctx.take_events();
        ctx.write_branch(tx_ctx);
        ctx.set_gas_meter(block_meter);

        let mut response = match failure {
            Some(e) => ResponseDeliverTx::error(e.codespace(), e.code(), e.to_string(), gas_wanted, gas_used),
            None => ResponseDeliverTx {
                gas_wanted,
                gas_used,
                ..Default::default()
            },
        };
        response.events = events;
        Ok(response)
    }
}

impl GenesisTxDeliverer for TxRunner {
    fn deliver_gen_tx(&self, ctx: &mut Context, tx: &Tx) -> ModuleResult<()> {
        let bytes = tx.encode()?;
        let response = self.run_decoded(ctx, tx, bytes.len(), RunTxMode::Deliver)?;
        if !response.is_ok() {
            return Err(ModuleError::InvalidGenesis(format!(
                "gentx {} rejected: {}",
                hex::encode(tx_hash(&bytes)),
                response.log
            )));
        }
        Ok(())
    }
}
