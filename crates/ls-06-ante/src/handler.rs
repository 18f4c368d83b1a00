//! The decorator chain run before a transaction's messages.

use crate::config::MinGasPrices;
use crate::decorators::*;
use crate::errors::AnteResult;
use ls_01_store::Context;
use ls_05_keepers::{AuthKeeper, IbcKeeper, SupplyKeeper};
use shared_types::Tx;
use std::sync::Arc;
use tracing::debug;

/// Runs every decorator in order and stops at the first rejection.
///
/// The caller runs the handler on a branch of its context. State written
/// by the chain (public keys, the fee, the sequence bump) is committed only
/// when the whole chain passes.
pub struct AnteHandler {
    decorators: Vec<Box<dyn AnteDecorator>>,
}

impl AnteHandler {
    pub fn new(
        auth: Arc<AuthKeeper>,
        supply: Arc<SupplyKeeper>,
        ibc: Arc<IbcKeeper>,
        min_gas_prices: MinGasPrices,
    ) -> Self {
        // Gas is metered from the first decorator on, so size and signature
        // costs count against the transaction's own limit.
        Self::with_decorators(vec![
            Box::new(SetUpContext),
            Box::new(ValidateBasic),
            Box::new(TxTimeoutHeight),
            Box::new(ValidateMemo::new(Arc::clone(&auth))),
            Box::new(ConsumeTxSizeGas::new(Arc::clone(&auth))),
            Box::new(MempoolFee::new(min_gas_prices)),
            Box::new(SetPubKey::new(Arc::clone(&auth))),
            Box::new(ValidateSigCount::new(Arc::clone(&auth))),
            Box::new(DeductFee::new(Arc::clone(&auth), supply)),
            Box::new(SigGasConsume::new(Arc::clone(&auth))),
            Box::new(SigVerification::new(Arc::clone(&auth))),
            Box::new(IncrementSequence::new(auth)),
            Box::new(RejectRedundantRelay::new(ibc)),
        ])
    }

    pub fn with_decorators(decorators: Vec<Box<dyn AnteDecorator>>) -> Self {
        Self { decorators }
    }

    pub fn decorator_names(&self) -> Vec<&'static str> {
        self.decorators.iter().map(|d| d.name()).collect()
    }

    pub fn handle(&self, ctx: &mut Context, tx: &Tx, tx_len: usize, simulate: bool) -> AnteResult<()> {
        let ante_tx = AnteTx {
            tx,
            size: tx_len,
            simulate,
        };
        for decorator in &self.decorators {
            if let Err(e) = decorator.ante(ctx, &ante_tx) {
                debug!(
                    decorator = decorator.name(),
                    mode = ctx.mode().as_str(),
                    error = %e,
                    "[ante] transaction rejected"
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
