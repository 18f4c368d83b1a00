//! The individual ante checks. Each decorator either passes the transaction
//! on or rejects it; the handler runs them in a fixed order.

use crate::config::MinGasPrices;
use crate::errors::{AnteError, AnteResult};
use ls_01_store::{Context, ExecMode, GasMeter};
use ls_05_keepers::auth::Account;
use ls_05_keepers::{AuthKeeper, IbcKeeper, SupplyKeeper};
use shared_types::{names, Address, Event, Msg, MsgAcknowledgement, MsgTimeout, Tx};
use std::sync::Arc;
use tracing::debug;

/// A transaction under inspection with its encoded size.
pub struct AnteTx<'a> {
    pub tx: &'a Tx,
    pub size: usize,
    /// Gas estimation: signatures are not verified and the mempool fee is
    /// not enforced.
    pub simulate: bool,
}

pub trait AnteDecorator: Send + Sync {
    fn name(&self) -> &'static str;

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()>;
}

fn require_account(auth: &AuthKeeper, ctx: &mut Context, address: &Address) -> AnteResult<Account> {
    auth.account(ctx, address)?
        .ok_or(AnteError::UnknownAddress(*address))
}

// =============================================================================
// STATELESS
// =============================================================================

/// Install the transaction's gas meter. Genesis transactions are unmetered.
pub struct SetUpContext;

impl AnteDecorator for SetUpContext {
    fn name(&self) -> &'static str {
        "set_up_context"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let meter = match ctx.mode() {
            ExecMode::Genesis => GasMeter::infinite(),
            _ => GasMeter::new(tx.tx.fee.gas_limit),
        };
        ctx.set_gas_meter(meter);
        Ok(())
    }
}

pub struct ValidateBasic;

impl AnteDecorator for ValidateBasic {
    fn name(&self) -> &'static str {
        "validate_basic"
    }

    fn ante(&self, _ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let tx = tx.tx;
        if tx.msgs.is_empty() {
            return Err(AnteError::InvalidRequest("transaction has no messages".into()));
        }
        for msg in &tx.msgs {
            msg.validate_basic()?;
        }
        if tx.signatures.is_empty() {
            return Err(AnteError::NoSignatures);
        }
        let signers = tx.signers();
        if signers.len() != tx.signatures.len() {
            return Err(AnteError::InvalidSignature(format!(
                "expected {} signatures, got {}",
                signers.len(),
                tx.signatures.len()
            )));
        }
        Ok(())
    }
}

pub struct TxTimeoutHeight;

impl AnteDecorator for TxTimeoutHeight {
    fn name(&self) -> &'static str {
        "tx_timeout_height"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let timeout_height = tx.tx.timeout_height;
        if timeout_height != 0 && ctx.height() > timeout_height {
            return Err(AnteError::Expired {
                timeout_height,
                height: ctx.height(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// PARAMETER CHECKS
// =============================================================================

pub struct ValidateMemo {
    auth: Arc<AuthKeeper>,
}

impl ValidateMemo {
    pub fn new(auth: Arc<AuthKeeper>) -> Self {
        Self { auth }
    }
}

impl AnteDecorator for ValidateMemo {
    fn name(&self) -> &'static str {
        "validate_memo"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let max = self.auth.params(ctx)?.max_memo_characters;
        let len = tx.tx.memo.chars().count() as u64;
        if len > max {
            return Err(AnteError::MemoTooLarge { len, max });
        }
        Ok(())
    }
}

pub struct ConsumeTxSizeGas {
    auth: Arc<AuthKeeper>,
}

impl ConsumeTxSizeGas {
    pub fn new(auth: Arc<AuthKeeper>) -> Self {
        Self { auth }
    }
}

impl AnteDecorator for ConsumeTxSizeGas {
    fn name(&self) -> &'static str {
        "consume_tx_size_gas"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let per_byte = self.auth.params(ctx)?.tx_size_cost_per_byte;
        ctx.consume_gas((tx.size as u64).saturating_mul(per_byte), "txSize")?;
        Ok(())
    }
}

/// Node-local minimum gas price, enforced only when admitting to the mempool.
pub struct MempoolFee {
    min_gas_prices: MinGasPrices,
}

impl MempoolFee {
    pub fn new(min_gas_prices: MinGasPrices) -> Self {
        Self { min_gas_prices }
    }
}

impl AnteDecorator for MempoolFee {
    fn name(&self) -> &'static str {
        "mempool_fee"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        if !ctx.is_check() || tx.simulate || self.min_gas_prices.is_empty() {
            return Ok(());
        }
        let required = self.min_gas_prices.required_fees(tx.tx.fee.gas_limit);
        if !tx.tx.fee.amount.is_any_gte(&required) {
            return Err(AnteError::InsufficientFee(format!(
                "got {}, required one of {required}",
                tx.tx.fee.amount
            )));
        }
        Ok(())
    }
}

// =============================================================================
// ACCOUNTS AND SIGNATURES
// =============================================================================

/// Record each signer's public key on first use.
pub struct SetPubKey {
    auth: Arc<AuthKeeper>,
}

impl SetPubKey {
    pub fn new(auth: Arc<AuthKeeper>) -> Self {
        Self { auth }
    }
}

impl AnteDecorator for SetPubKey {
    fn name(&self) -> &'static str {
        "set_pub_key"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        for (signer, sig) in tx.tx.signers().iter().zip(&tx.tx.signatures) {
            let Some(pub_key) = sig.pub_key else {
                continue;
            };
            if pub_key.address() != *signer {
                return Err(AnteError::InvalidPubKey(format!(
                    "public key does not belong to {signer}"
                )));
            }
            let mut account = require_account(&self.auth, ctx, signer)?;
            if account.pub_key.is_none() {
                account.pub_key = Some(pub_key);
                self.auth.set_account(ctx, &account)?;
            }
        }
        Ok(())
    }
}

pub struct ValidateSigCount {
    auth: Arc<AuthKeeper>,
}

impl ValidateSigCount {
    pub fn new(auth: Arc<AuthKeeper>) -> Self {
        Self { auth }
    }
}

impl AnteDecorator for ValidateSigCount {
    fn name(&self) -> &'static str {
        "validate_sig_count"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let limit = self.auth.params(ctx)?.tx_sig_limit;
        let count = tx.tx.signatures.len() as u64;
        if count > limit {
            return Err(AnteError::TooManySignatures { count, limit });
        }
        Ok(())
    }
}

/// Move the fee from the first signer into the fee collector.
pub struct DeductFee {
    auth: Arc<AuthKeeper>,
    supply: Arc<SupplyKeeper>,
}

impl DeductFee {
    pub fn new(auth: Arc<AuthKeeper>, supply: Arc<SupplyKeeper>) -> Self {
        Self { auth, supply }
    }
}

impl AnteDecorator for DeductFee {
    fn name(&self) -> &'static str {
        "deduct_fee"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let payer = tx
            .tx
            .fee_payer()
            .ok_or_else(|| AnteError::InvalidRequest("transaction has no signer".into()))?;
        require_account(&self.auth, ctx, &payer)?;
        let fee = &tx.tx.fee.amount;
        if fee.is_zero() {
            return Ok(());
        }
        self.supply
            .send_coins_from_account_to_module(ctx, payer, names::FEE_COLLECTOR, fee)?;
        ctx.emit(Event::new("tx").attr("fee", fee).attr("fee_payer", payer));
        debug!(%payer, %fee, "[ante] fee deducted");
        Ok(())
    }
}

pub struct SigGasConsume {
    auth: Arc<AuthKeeper>,
}

impl SigGasConsume {
    pub fn new(auth: Arc<AuthKeeper>) -> Self {
        Self { auth }
    }
}

impl AnteDecorator for SigGasConsume {
    fn name(&self) -> &'static str {
        "sig_gas_consume"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let cost = self.auth.params(ctx)?.sig_verify_cost_ed25519;
        for _ in &tx.tx.signatures {
            ctx.consume_gas(cost, "ante verify: ed25519")?;
        }
        Ok(())
    }
}

/// Check every signature against the signer's stored key and sequence.
///
/// Genesis transactions are signed with account number 0 because the
/// accounts are only numbered while genesis is loaded.
pub struct SigVerification {
    auth: Arc<AuthKeeper>,
}

impl SigVerification {
    pub fn new(auth: Arc<AuthKeeper>) -> Self {
        Self { auth }
    }
}

impl AnteDecorator for SigVerification {
    fn name(&self) -> &'static str {
        "sig_verification"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        let genesis = ctx.mode() == ExecMode::Genesis;
        let chain_id = ctx.chain_id().to_string();
        for (signer, sig) in tx.tx.signers().iter().zip(&tx.tx.signatures) {
            let account = require_account(&self.auth, ctx, signer)?;
            if sig.sequence != account.sequence {
                return Err(AnteError::BadSequence {
                    address: *signer,
                    expected: account.sequence,
                    got: sig.sequence,
                });
            }
            if tx.simulate {
                continue;
            }
            let pub_key = account
                .pub_key
                .ok_or_else(|| AnteError::InvalidPubKey(format!("no public key set for {signer}")))?;
            let account_number = if genesis { 0 } else { account.account_number };
            let bytes = tx
                .tx
                .sign_doc(&chain_id, account_number, sig.sequence)
                .sign_bytes()?;
            shared_crypto::verify(&pub_key, &bytes, &sig.signature)
                .map_err(|e| AnteError::InvalidSignature(format!("{signer}: {e}")))?;
        }
        Ok(())
    }
}

pub struct IncrementSequence {
    auth: Arc<AuthKeeper>,
}

impl IncrementSequence {
    pub fn new(auth: Arc<AuthKeeper>) -> Self {
        Self { auth }
    }
}

impl AnteDecorator for IncrementSequence {
    fn name(&self) -> &'static str {
        "increment_sequence"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        for signer in tx.tx.signers() {
            let mut account = require_account(&self.auth, ctx, &signer)?;
            account.sequence += 1;
            self.auth.set_account(ctx, &account)?;
        }
        Ok(())
    }
}

// =============================================================================
// CROSS-CHAIN
// =============================================================================

/// Keep relayer transactions whose packets were all received (or, for
/// acknowledgements and timeouts, settled) already out of the mempool.
/// Delivery still rejects the individual duplicates.
pub struct RejectRedundantRelay {
    ibc: Arc<IbcKeeper>,
}

impl RejectRedundantRelay {
    pub fn new(ibc: Arc<IbcKeeper>) -> Self {
        Self { ibc }
    }
}

impl AnteDecorator for RejectRedundantRelay {
    fn name(&self) -> &'static str {
        "reject_redundant_relay"
    }

    fn ante(&self, ctx: &mut Context, tx: &AnteTx<'_>) -> AnteResult<()> {
        if !ctx.is_check() {
            return Ok(());
        }
        let mut relays = 0;
        let mut redundant = 0;
        for msg in &tx.tx.msgs {
            let settled = match msg {
                Msg::RecvPacket(recv) => {
                    let p = &recv.packet;
                    self.ibc
                        .has_receipt(ctx, &p.destination_port, &p.destination_channel, p.sequence)?
                }
                Msg::Acknowledgement(MsgAcknowledgement { packet: p, .. })
                | Msg::Timeout(MsgTimeout { packet: p, .. }) => self
                    .ibc
                    .packet_commitment(ctx, &p.source_port, &p.source_channel, p.sequence)?
                    .is_none(),
                _ => continue,
            };
            relays += 1;
            if settled {
                redundant += 1;
            }
        }
        if relays > 0 && relays == redundant {
            return Err(AnteError::RedundantRelay);
        }
        Ok(())
    }
}
