//! # Slashing
//!
//! Liveness tracking over a sliding window of blocks. A validator that misses
//! more than `1 - min_signed_per_window` of the window is slashed by
//! `slash_fraction_downtime`, jailed, and may unjail after
//! `downtime_jail_duration`. Double-sign punishment is driven by the evidence
//! module through `slash_double_sign`.
//!
//! ```text
//! info/<consensus address>           -> SigningInfo
//! missed/<consensus address>/<index> -> ()   present while the block was missed
//! ```

use crate::codec::{address_key, decode_genesis, encode_genesis, parse_address, to_json};
use crate::params::{ParamSet, Subspace};
use crate::staking::{StakingHooks, StakingKeeper, Validator};
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, Address, Decimal, Event, Msg, RequestBeginBlock, ValidatorUpdate, VoteInfo};
use std::sync::Arc;
use tracing::{debug, info, warn};

const INFO_PREFIX: &str = "info";
const MISSED_PREFIX: &str = "missed";

/// Power changes take effect one block after EndBlock reports them, so an
/// infraction seen in block H's last commit happened at H - 2.
const VALIDATOR_UPDATE_DELAY: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingParams {
    pub signed_blocks_window: u64,
    pub min_signed_per_window: Decimal,
    /// Seconds.
    pub downtime_jail_duration: u64,
    pub slash_fraction_double_sign: Decimal,
    pub slash_fraction_downtime: Decimal,
}

impl Default for SlashingParams {
    fn default() -> Self {
        Self {
            signed_blocks_window: 100,
            min_signed_per_window: Decimal::from_ratio(1, 2),
            downtime_jail_duration: 600,
            slash_fraction_double_sign: Decimal::from_ratio(1, 20),
            slash_fraction_downtime: Decimal::from_ratio(1, 100),
        }
    }
}

impl ParamSet for SlashingParams {
    fn validate(&self) -> Result<(), String> {
        if self.signed_blocks_window == 0 {
            return Err("signed_blocks_window must be positive".into());
        }
        for (name, value) in [
            ("min_signed_per_window", self.min_signed_per_window),
            ("slash_fraction_double_sign", self.slash_fraction_double_sign),
            ("slash_fraction_downtime", self.slash_fraction_downtime),
        ] {
            if value > Decimal::ONE {
                return Err(format!("{name} must not exceed 1"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInfo {
    pub address: Address,
    pub start_height: u64,
    pub index_offset: u64,
    pub jailed_until: u64,
    pub tombstoned: bool,
    pub missed_blocks_counter: u64,
}

impl SigningInfo {
    fn new(address: Address, start_height: u64) -> Self {
        Self {
            address,
            start_height,
            index_offset: 0,
            jailed_until: 0,
            tombstoned: false,
            missed_blocks_counter: 0,
        }
    }
}

pub struct SlashingKeeper {
    key: StoreKey,
    subspace: Subspace,
    staking: Arc<StakingKeeper>,
}

impl SlashingKeeper {
    pub fn new(key: StoreKey, subspace: Subspace, staking: Arc<StakingKeeper>) -> Self {
        Self { key, subspace, staking }
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<SlashingParams> {
        self.subspace.get_params(ctx)
    }

    pub fn staking(&self) -> &Arc<StakingKeeper> {
        &self.staking
    }

    pub fn signing_info(&self, ctx: &mut Context, consensus: &Address) -> ModuleResult<Option<SigningInfo>> {
        Ok(ctx.kv(&self.key)?.get_json(&address_key(INFO_PREFIX, consensus))?)
    }

    pub fn set_signing_info(&self, ctx: &mut Context, info: &SigningInfo) -> ModuleResult<()> {
        ctx.kv(&self.key)?
            .set_json(&address_key(INFO_PREFIX, &info.address), info)?;
        Ok(())
    }

    pub fn signing_infos(&self, ctx: &mut Context) -> ModuleResult<Vec<SigningInfo>> {
        let prefix = format!("{INFO_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<SigningInfo>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, info)| info)
            .collect())
    }

    fn missed_key(consensus: &Address, index: u64) -> Vec<u8> {
        format!("{MISSED_PREFIX}/{consensus}/{index:020}").into_bytes()
    }

    fn clear_missed(&self, ctx: &mut Context, consensus: &Address) -> ModuleResult<()> {
        let prefix = format!("{MISSED_PREFIX}/{consensus}/");
        let mut kv = ctx.kv(&self.key)?;
        for (key, _) in kv.prefix_iter(prefix.as_bytes())? {
            kv.delete(&key)?;
        }
        Ok(())
    }

    /// Record one vote of the last commit and punish downtime.
    pub fn handle_validator_signature(
        &self,
        ctx: &mut Context,
        consensus: Address,
        power: u64,
        signed: bool,
    ) -> ModuleResult<()> {
        let params = self.params(ctx)?;
        let height = ctx.height();
        let mut info = match self.signing_info(ctx, &consensus)? {
            Some(info) => info,
            None => SigningInfo::new(consensus, height),
        };

        let index = info.index_offset % params.signed_blocks_window;
        info.index_offset += 1;
        let key = Self::missed_key(&consensus, index);
        let previously_missed = ctx.kv(&self.key)?.has(&key)?;
        match (previously_missed, !signed) {
            (false, true) => {
                ctx.kv(&self.key)?.set(&key, Vec::new())?;
                info.missed_blocks_counter += 1;
            }
            (true, false) => {
                ctx.kv(&self.key)?.delete(&key)?;
                info.missed_blocks_counter = info.missed_blocks_counter.saturating_sub(1);
            }
            _ => {}
        }
        if !signed {
            ctx.emit(
                Event::new("liveness")
                    .attr("address", consensus)
                    .attr("missed_blocks", info.missed_blocks_counter)
                    .attr("height", height),
            );
        }

        let min_height = info.start_height + params.signed_blocks_window;
        let min_signed = params
            .min_signed_per_window
            .mul_int(u128::from(params.signed_blocks_window));
        let max_missed = u128::from(params.signed_blocks_window) - min_signed;
        if height > min_height && u128::from(info.missed_blocks_counter) > max_missed {
            match self.staking.validator_by_consensus(ctx, &consensus)? {
                Some(validator) if !validator.jailed => {
                    let infraction_height = height.saturating_sub(VALIDATOR_UPDATE_DELAY + 1);
                    self.staking.slash(
                        ctx,
                        &consensus,
                        infraction_height,
                        power,
                        params.slash_fraction_downtime,
                    )?;
                    self.staking.jail(ctx, &consensus)?;
                    info.jailed_until = ctx.block_time() + params.downtime_jail_duration;
                    info.missed_blocks_counter = 0;
                    info.index_offset = 0;
                    self.clear_missed(ctx, &consensus)?;
                    ctx.emit(
                        Event::new("slash")
                            .attr("address", consensus)
                            .attr("reason", "missing_signature")
                            .attr("jailed", true),
                    );
                    warn!(%consensus, height, "[slashing] validator slashed and jailed for downtime");
                }
                _ => debug!(%consensus, "[slashing] downtime for jailed or unknown validator"),
            }
        }
        self.set_signing_info(ctx, &info)
    }

    /// Slash and jail for a double sign, then tombstone so the validator can
    /// never be punished for, or unjail after, the same key again.
    pub fn slash_double_sign(
        &self,
        ctx: &mut Context,
        consensus: Address,
        infraction_height: u64,
        power: u64,
    ) -> ModuleResult<bool> {
        let params = self.params(ctx)?;
        let mut info = self
            .signing_info(ctx, &consensus)?
            .unwrap_or_else(|| SigningInfo::new(consensus, infraction_height));
        if info.tombstoned {
            debug!(%consensus, "[slashing] equivocation ignored, already tombstoned");
            return Ok(false);
        }
        self.staking.slash(
            ctx,
            &consensus,
            infraction_height,
            power,
            params.slash_fraction_double_sign,
        )?;
        self.staking.jail(ctx, &consensus)?;
        info.jailed_until = u64::MAX;
        info.tombstoned = true;
        self.set_signing_info(ctx, &info)?;
        warn!(%consensus, infraction_height, "[slashing] validator tombstoned for double sign");
        Ok(true)
    }

    pub fn unjail(&self, ctx: &mut Context, operator: &Address) -> ModuleResult<()> {
        let validator = self.staking.validator(ctx, operator)?.ok_or_else(|| {
            ModuleError::custom(names::SLASHING, 2, format!("no validator for {operator}"))
        })?;
        let self_delegation = self.staking.delegation(ctx, operator, operator)?;
        if self_delegation.map_or(true, |d| d.shares == 0) {
            return Err(ModuleError::custom(
                names::SLASHING,
                3,
                "validator has no self-delegation",
            ));
        }
        if !validator.jailed {
            return Err(ModuleError::custom(names::SLASHING, 4, "validator not jailed"));
        }
        let consensus = validator.consensus_address();
        if let Some(info) = self.signing_info(ctx, &consensus)? {
            if info.tombstoned {
                return Err(ModuleError::custom(names::SLASHING, 5, "validator is tombstoned"));
            }
            if ctx.block_time() < info.jailed_until {
                return Err(ModuleError::custom(
                    names::SLASHING,
                    6,
                    format!("validator jailed until {}", info.jailed_until),
                ));
            }
        }
        self.staking.unjail(ctx, operator)
    }
}

impl StakingHooks for SlashingKeeper {
    fn after_validator_created(&self, ctx: &mut Context, validator: &Validator) -> ModuleResult<()> {
        let consensus = validator.consensus_address();
        if self.signing_info(ctx, &consensus)?.is_none() {
            let height = ctx.height();
            self.set_signing_info(ctx, &SigningInfo::new(consensus, height))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingGenesis {
    #[serde(default)]
    pub params: SlashingParams,
    #[serde(default)]
    pub signing_infos: Vec<SigningInfo>,
}

pub struct SlashingModule {
    keeper: Arc<SlashingKeeper>,
}

impl SlashingModule {
    pub fn new(keeper: Arc<SlashingKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for SlashingModule {
    fn name(&self) -> &'static str {
        names::SLASHING
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::SLASHING, &SlashingGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: SlashingGenesis = decode_genesis(names::SLASHING, genesis)?;
        genesis.params.validate().map_err(ModuleError::InvalidGenesis)
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: SlashingGenesis = decode_genesis(names::SLASHING, genesis)?;
        self.keeper.subspace.set_params(ctx, &genesis.params)?;
        for info in &genesis.signing_infos {
            self.keeper.set_signing_info(ctx, info)?;
        }
        Ok(Vec::new())
    }

    /// Missed-block bitmaps are not exported; windows restart after import.
    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let mut signing_infos = self.keeper.signing_infos(ctx)?;
        for info in &mut signing_infos {
            info.index_offset = 0;
            info.missed_blocks_counter = 0;
        }
        let genesis = SlashingGenesis {
            params: self.keeper.params(ctx)?,
            signing_infos,
        };
        encode_genesis(names::SLASHING, &genesis)
    }

    fn has_begin_blocker(&self) -> bool {
        true
    }

    fn begin_block(&self, ctx: &mut Context, req: &RequestBeginBlock) -> ModuleResult<()> {
        for VoteInfo {
            validator,
            power,
            signed_last_block,
        } in &req.last_commit_votes
        {
            self.keeper
                .handle_validator_signature(ctx, *validator, *power, *signed_last_block)?;
        }
        Ok(())
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::SLASHING)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::Unjail(m) => {
                self.keeper.unjail(ctx, &m.operator)?;
                ctx.emit(Event::new("unjail").attr("validator", m.operator));
                info!(operator = %m.operator, "[slashing] unjail accepted");
                Ok(())
            }
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::SLASHING)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path.split_once('/') {
            Some(("signing_info", consensus)) => {
                let consensus = parse_address(consensus)?;
                to_json(&self.keeper.signing_info(ctx, &consensus)?)
            }
            None if path == "params" => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("slashing/{path}"))),
        }
    }
}
