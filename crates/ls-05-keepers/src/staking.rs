//! # Staking
//!
//! Validators, delegations and the unbonding queue.
//!
//! ```text
//! val/<operator>                   -> Validator
//! cons/<consensus address>         -> operator Address
//! del/<delegator>/<operator>       -> Delegation
//! last_power/<operator>            -> u64
//! unbonding_queue                  -> [UnbondingEntry] ordered by completion time
//! ```
//!
//! Tokens of bonded validators sit in the bonded pool; tokens of every other
//! validator and of pending unbondings sit in the not-bonded pool. Moving a
//! validator in or out of the active set moves its tokens between the pools
//! in the same EndBlock that reports the power change.

use crate::codec::{address_key, decode_genesis, encode_genesis, parse_address, to_json};
use crate::params::{ParamSet, Subspace};
use crate::supply::SupplyKeeper;
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{
    invariant, AppModule, InvariantRegistry, ModuleError, ModuleResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::coins::amount_string;
use shared_types::{
    names, Address, Coin, Coins, Decimal, Event, Msg, MsgCreateValidator, MsgDelegate,
    MsgUndelegate, PubKey, RequestBeginBlock, RequestEndBlock, ValidatorUpdate,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

const VALIDATOR_PREFIX: &str = "val";
const CONSENSUS_PREFIX: &str = "cons";
const DELEGATION_PREFIX: &str = "del";
const LAST_POWER_PREFIX: &str = "last_power";
const UNBONDING_QUEUE: &[u8] = b"unbonding_queue";

/// Staking's ABCI codespace.
const CODESPACE: &str = names::STAKING;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Seconds an undelegation waits before the tokens are released.
    pub unbonding_time: u64,
    pub max_validators: u32,
    pub bond_denom: String,
    /// Tokens per unit of consensus power.
    #[serde(with = "amount_string")]
    pub power_reduction: u128,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            unbonding_time: 1_814_400,
            max_validators: 100,
            bond_denom: "ubld".to_string(),
            power_reduction: 1_000_000,
        }
    }
}

impl ParamSet for StakingParams {
    fn validate(&self) -> Result<(), String> {
        if self.max_validators == 0 {
            return Err("max_validators must be positive".into());
        }
        if self.power_reduction == 0 {
            return Err("power_reduction must be positive".into());
        }
        if !shared_types::coins::valid_denom(&self.bond_denom) {
            return Err(format!("invalid bond denom {}", self.bond_denom));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondStatus {
    Unbonded,
    Bonded,
}

impl BondStatus {
    fn pool(self) -> &'static str {
        match self {
            BondStatus::Bonded => names::BONDED_POOL,
            BondStatus::Unbonded => names::NOT_BONDED_POOL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub operator: Address,
    pub consensus_pubkey: PubKey,
    pub moniker: String,
    #[serde(with = "amount_string")]
    pub tokens: u128,
    #[serde(with = "amount_string")]
    pub delegator_shares: u128,
    pub jailed: bool,
    pub status: BondStatus,
}

impl Validator {
    pub fn consensus_address(&self) -> Address {
        self.consensus_pubkey.address()
    }

    pub fn is_bonded(&self) -> bool {
        self.status == BondStatus::Bonded
    }

    pub fn consensus_power(&self, power_reduction: u128) -> u64 {
        let power = self.tokens / power_reduction.max(1);
        u64::try_from(power).unwrap_or(u64::MAX)
    }

    /// Shares issued for `amount` new tokens.
    fn shares_for_tokens(&self, amount: u128) -> u128 {
        if self.tokens == 0 || self.delegator_shares == 0 {
            return amount;
        }
        Decimal::from_ratio(self.delegator_shares, self.tokens).mul_int(amount)
    }

    /// Shares that must be burned to withdraw `amount` tokens, rounded up.
    fn shares_for_withdrawal(&self, amount: u128) -> u128 {
        if self.tokens == 0 {
            return amount;
        }
        Decimal::from_ratio(self.delegator_shares, self.tokens).mul_int_ceil(amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: Address,
    #[serde(with = "amount_string")]
    pub shares: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingEntry {
    pub delegator: Address,
    pub validator: Address,
    pub creation_height: u64,
    pub completion_time: u64,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

/// Callbacks other modules register to follow validator lifecycle events.
pub trait StakingHooks: Send + Sync {
    fn after_validator_created(&self, _ctx: &mut Context, _validator: &Validator) -> ModuleResult<()> {
        Ok(())
    }

    /// Called before `fraction` of the validator's stake is burned.
    fn before_validator_slashed(
        &self,
        _ctx: &mut Context,
        _validator: &Validator,
        _fraction: Decimal,
    ) -> ModuleResult<()> {
        Ok(())
    }
}

// =============================================================================
// KEEPER
// =============================================================================

pub struct StakingKeeper {
    key: StoreKey,
    subspace: Subspace,
    supply: Arc<SupplyKeeper>,
    hooks: OnceLock<Vec<Arc<dyn StakingHooks>>>,
}

impl StakingKeeper {
    pub fn new(key: StoreKey, subspace: Subspace, supply: Arc<SupplyKeeper>) -> Self {
        Self {
            key,
            subspace,
            supply,
            hooks: OnceLock::new(),
        }
    }

    /// Install the hooks. Allowed once, while the application is wired.
    pub fn set_hooks(&self, hooks: Vec<Arc<dyn StakingHooks>>) -> ModuleResult<()> {
        self.hooks
            .set(hooks)
            .map_err(|_| ModuleError::InvalidRequest("staking hooks already set".into()))
    }

    fn hooks(&self) -> &[Arc<dyn StakingHooks>] {
        self.hooks.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<StakingParams> {
        self.subspace.get_params(ctx)
    }

    pub fn bond_denom(&self, ctx: &mut Context) -> ModuleResult<String> {
        Ok(self.params(ctx)?.bond_denom)
    }

    fn bond_coins(&self, ctx: &mut Context, amount: u128) -> ModuleResult<Coins> {
        Ok(Coins::single(&self.bond_denom(ctx)?, amount))
    }

    // ---- validators ---------------------------------------------------------

    pub fn validator(&self, ctx: &mut Context, operator: &Address) -> ModuleResult<Option<Validator>> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&address_key(VALIDATOR_PREFIX, operator))?)
    }

    fn require_validator(&self, ctx: &mut Context, operator: &Address) -> ModuleResult<Validator> {
        self.validator(ctx, operator)?.ok_or_else(|| {
            ModuleError::custom(CODESPACE, 3, format!("validator {operator} does not exist"))
        })
    }

    pub fn set_validator(&self, ctx: &mut Context, validator: &Validator) -> ModuleResult<()> {
        let mut kv = ctx.kv(&self.key)?;
        kv.set_json(&address_key(VALIDATOR_PREFIX, &validator.operator), validator)?;
        kv.set_json(
            &address_key(CONSENSUS_PREFIX, &validator.consensus_address()),
            &validator.operator,
        )?;
        Ok(())
    }

    pub fn validator_by_consensus(
        &self,
        ctx: &mut Context,
        consensus: &Address,
    ) -> ModuleResult<Option<Validator>> {
        let operator: Option<Address> = ctx
            .kv(&self.key)?
            .get_json(&address_key(CONSENSUS_PREFIX, consensus))?;
        match operator {
            Some(operator) => self.validator(ctx, &operator),
            None => Ok(None),
        }
    }

    pub fn validators(&self, ctx: &mut Context) -> ModuleResult<Vec<Validator>> {
        let prefix = format!("{VALIDATOR_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<Validator>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    pub fn bonded_validators(&self, ctx: &mut Context) -> ModuleResult<Vec<Validator>> {
        Ok(self
            .validators(ctx)?
            .into_iter()
            .filter(Validator::is_bonded)
            .collect())
    }

    /// Sum of the consensus power of the current active set.
    pub fn total_bonded_power(&self, ctx: &mut Context) -> ModuleResult<u64> {
        let reduction = self.params(ctx)?.power_reduction;
        Ok(self
            .bonded_validators(ctx)?
            .iter()
            .map(|v| v.consensus_power(reduction))
            .sum())
    }

    // ---- delegations --------------------------------------------------------

    fn delegation_key(delegator: &Address, validator: &Address) -> Vec<u8> {
        format!("{DELEGATION_PREFIX}/{delegator}/{validator}").into_bytes()
    }

    pub fn delegation(
        &self,
        ctx: &mut Context,
        delegator: &Address,
        validator: &Address,
    ) -> ModuleResult<Option<Delegation>> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&Self::delegation_key(delegator, validator))?)
    }

    fn set_delegation(&self, ctx: &mut Context, delegation: &Delegation) -> ModuleResult<()> {
        let key = Self::delegation_key(&delegation.delegator, &delegation.validator);
        let mut kv = ctx.kv(&self.key)?;
        if delegation.shares == 0 {
            kv.delete(&key)?;
        } else {
            kv.set_json(&key, delegation)?;
        }
        Ok(())
    }

    pub fn delegations(&self, ctx: &mut Context) -> ModuleResult<Vec<Delegation>> {
        let prefix = format!("{DELEGATION_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<Delegation>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, d)| d)
            .collect())
    }

    pub fn delegator_delegations(
        &self,
        ctx: &mut Context,
        delegator: &Address,
    ) -> ModuleResult<Vec<Delegation>> {
        let prefix = format!("{DELEGATION_PREFIX}/{delegator}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<Delegation>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, d)| d)
            .collect())
    }

    pub fn unbonding_queue(&self, ctx: &mut Context) -> ModuleResult<Vec<UnbondingEntry>> {
        Ok(ctx.kv(&self.key)?.get_json(UNBONDING_QUEUE)?.unwrap_or_default())
    }

    fn set_unbonding_queue(&self, ctx: &mut Context, queue: &[UnbondingEntry]) -> ModuleResult<()> {
        let mut kv = ctx.kv(&self.key)?;
        if queue.is_empty() {
            kv.delete(UNBONDING_QUEUE)?;
        } else {
            kv.set_json(UNBONDING_QUEUE, &queue)?;
        }
        Ok(())
    }

    // ---- messages -----------------------------------------------------------

    pub fn create_validator(&self, ctx: &mut Context, msg: &MsgCreateValidator) -> ModuleResult<()> {
        if self.validator(ctx, &msg.operator)?.is_some() {
            return Err(ModuleError::custom(
                CODESPACE,
                4,
                format!("validator {} already exists", msg.operator),
            ));
        }
        if self
            .validator_by_consensus(ctx, &msg.pubkey.address())?
            .is_some()
        {
            return Err(ModuleError::custom(
                CODESPACE,
                5,
                "consensus public key already bound to a validator",
            ));
        }
        let validator = Validator {
            operator: msg.operator,
            consensus_pubkey: msg.pubkey,
            moniker: msg.moniker.clone(),
            tokens: 0,
            delegator_shares: 0,
            jailed: false,
            status: BondStatus::Unbonded,
        };
        self.set_validator(ctx, &validator)?;
        for hook in self.hooks() {
            hook.after_validator_created(ctx, &validator)?;
        }
        ctx.emit(
            Event::new("create_validator")
                .attr("validator", msg.operator)
                .attr("amount", &msg.self_delegation),
        );
        info!(operator = %msg.operator, moniker = %msg.moniker, "[staking] validator created");
        self.delegate(ctx, msg.operator, msg.operator, &msg.self_delegation)
    }

    pub fn delegate(
        &self,
        ctx: &mut Context,
        delegator: Address,
        operator: Address,
        amount: &Coin,
    ) -> ModuleResult<()> {
        let denom = self.bond_denom(ctx)?;
        if amount.denom != denom {
            return Err(ModuleError::custom(
                CODESPACE,
                6,
                format!("invalid coin denomination {}, expected {denom}", amount.denom),
            ));
        }
        let mut validator = self.require_validator(ctx, &operator)?;
        self.supply.delegate_coins_from_account_to_module(
            ctx,
            delegator,
            validator.status.pool(),
            &Coins::from_coin(amount.clone()),
        )?;

        let shares = validator.shares_for_tokens(amount.amount);
        validator.tokens += amount.amount;
        validator.delegator_shares += shares;
        self.set_validator(ctx, &validator)?;

        let mut delegation = self
            .delegation(ctx, &delegator, &operator)?
            .unwrap_or(Delegation {
                delegator,
                validator: operator,
                shares: 0,
            });
        delegation.shares += shares;
        self.set_delegation(ctx, &delegation)?;

        ctx.emit(
            Event::new("delegate")
                .attr("delegator", delegator)
                .attr("validator", operator)
                .attr("amount", amount),
        );
        debug!(%delegator, %operator, amount = amount.amount, shares, "[staking] delegated");
        Ok(())
    }

    pub fn undelegate(
        &self,
        ctx: &mut Context,
        delegator: Address,
        operator: Address,
        amount: &Coin,
    ) -> ModuleResult<u64> {
        let params = self.params(ctx)?;
        if amount.denom != params.bond_denom {
            return Err(ModuleError::custom(
                CODESPACE,
                6,
                format!("invalid coin denomination {}", amount.denom),
            ));
        }
        let mut validator = self.require_validator(ctx, &operator)?;
        let mut delegation = self.delegation(ctx, &delegator, &operator)?.ok_or_else(|| {
            ModuleError::custom(CODESPACE, 7, format!("no delegation from {delegator} to {operator}"))
        })?;
        let shares = validator.shares_for_withdrawal(amount.amount);
        if shares > delegation.shares || amount.amount > validator.tokens {
            return Err(ModuleError::custom(
                CODESPACE,
                8,
                "not enough delegation shares",
            ));
        }
        delegation.shares -= shares;
        self.set_delegation(ctx, &delegation)?;
        validator.delegator_shares -= shares;
        validator.tokens -= amount.amount;
        self.set_validator(ctx, &validator)?;

        let coins = Coins::from_coin(amount.clone());
        if validator.is_bonded() {
            self.supply.send_coins_from_module_to_module(
                ctx,
                names::BONDED_POOL,
                names::NOT_BONDED_POOL,
                &coins,
            )?;
        }

        let completion_time = ctx.block_time() + params.unbonding_time;
        let mut queue = self.unbonding_queue(ctx)?;
        let entry = UnbondingEntry {
            delegator,
            validator: operator,
            creation_height: ctx.height(),
            completion_time,
            amount: amount.amount,
        };
        let pos = queue.partition_point(|e| e.completion_time <= completion_time);
        queue.insert(pos, entry);
        self.set_unbonding_queue(ctx, &queue)?;

        ctx.emit(
            Event::new("unbond")
                .attr("delegator", delegator)
                .attr("validator", operator)
                .attr("amount", amount)
                .attr("completion_time", completion_time),
        );
        debug!(%delegator, %operator, amount = amount.amount, completion_time, "[staking] undelegated");
        Ok(completion_time)
    }

    /// Release every unbonding whose completion time has passed.
    pub fn complete_unbondings(&self, ctx: &mut Context) -> ModuleResult<usize> {
        let now = ctx.block_time();
        let queue = self.unbonding_queue(ctx)?;
        let split = queue.partition_point(|e| e.completion_time <= now);
        if split == 0 {
            return Ok(0);
        }
        let denom = self.bond_denom(ctx)?;
        for entry in &queue[..split] {
            let coins = Coins::single(&denom, entry.amount);
            self.supply.undelegate_coins_from_module_to_account(
                ctx,
                names::NOT_BONDED_POOL,
                entry.delegator,
                &coins,
            )?;
            ctx.emit(
                Event::new("complete_unbonding")
                    .attr("delegator", entry.delegator)
                    .attr("validator", entry.validator)
                    .attr("amount", &coins),
            );
        }
        self.set_unbonding_queue(ctx, &queue[split..])?;
        debug!(matured = split, "[staking] unbondings completed");
        Ok(split)
    }

    // ---- validator set ------------------------------------------------------

    fn last_power(&self, ctx: &mut Context, operator: &Address) -> ModuleResult<u64> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&address_key(LAST_POWER_PREFIX, operator))?
            .unwrap_or(0))
    }

    pub fn last_powers(&self, ctx: &mut Context) -> ModuleResult<BTreeMap<Address, u64>> {
        let prefix = format!("{LAST_POWER_PREFIX}/");
        ctx.kv(&self.key)?
            .prefix_iter_json::<u64>(prefix.as_bytes())?
            .into_iter()
            .map(|(k, power)| {
                let hex = String::from_utf8_lossy(&k[prefix.len()..]).into_owned();
                Ok((parse_address(&hex)?, power))
            })
            .collect()
    }

    fn set_last_power(&self, ctx: &mut Context, operator: &Address, power: u64) -> ModuleResult<()> {
        let key = address_key(LAST_POWER_PREFIX, operator);
        let mut kv = ctx.kv(&self.key)?;
        if power == 0 {
            kv.delete(&key)?;
        } else {
            kv.set_json(&key, &power)?;
        }
        Ok(())
    }

    fn set_status(&self, ctx: &mut Context, validator: &mut Validator, status: BondStatus) -> ModuleResult<()> {
        if validator.status == status {
            return Ok(());
        }
        if validator.tokens > 0 {
            let coins = self.bond_coins(ctx, validator.tokens)?;
            self.supply.send_coins_from_module_to_module(
                ctx,
                validator.status.pool(),
                status.pool(),
                &coins,
            )?;
        }
        validator.status = status;
        self.set_validator(ctx, validator)
    }

    /// Recompute the active set and return the consensus power changes since
    /// the previous call.
    pub fn apply_validator_set_updates(&self, ctx: &mut Context) -> ModuleResult<Vec<ValidatorUpdate>> {
        let params = self.params(ctx)?;
        let mut candidates: Vec<Validator> = self
            .validators(ctx)?
            .into_iter()
            .filter(|v| !v.jailed && v.consensus_power(params.power_reduction) > 0)
            .collect();
        candidates.sort_by(|a, b| {
            b.tokens
                .cmp(&a.tokens)
                .then_with(|| a.operator.cmp(&b.operator))
        });
        candidates.truncate(params.max_validators as usize);

        let previous = self.last_powers(ctx)?;
        let mut active = BTreeSet::new();
        let mut updates = Vec::new();

        for mut validator in candidates {
            let power = validator.consensus_power(params.power_reduction);
            active.insert(validator.operator);
            self.set_status(ctx, &mut validator, BondStatus::Bonded)?;
            if previous.get(&validator.operator) != Some(&power) {
                updates.push(ValidatorUpdate {
                    pub_key: validator.consensus_pubkey,
                    power,
                });
                self.set_last_power(ctx, &validator.operator, power)?;
            }
        }

        for operator in previous.keys().filter(|op| !active.contains(*op)) {
            self.set_last_power(ctx, operator, 0)?;
            let Some(mut validator) = self.validator(ctx, operator)? else {
                continue;
            };
            self.set_status(ctx, &mut validator, BondStatus::Unbonded)?;
            updates.push(ValidatorUpdate {
                pub_key: validator.consensus_pubkey,
                power: 0,
            });
        }

        // Validators that left the set without ever having power recorded
        // (e.g. slashed to zero within a block) must still leave the bonded pool.
        for mut validator in self.bonded_validators(ctx)? {
            if !active.contains(&validator.operator) {
                self.set_status(ctx, &mut validator, BondStatus::Unbonded)?;
            }
        }

        if !updates.is_empty() {
            info!(changes = updates.len(), active = active.len(), "[staking] validator set updated");
        }
        Ok(updates)
    }

    // ---- slashing -----------------------------------------------------------

    /// Burn `fraction` of the stake the validator had at the infraction
    /// (`power` at that height), bounded by its current tokens. Returns the
    /// amount burned.
    pub fn slash(
        &self,
        ctx: &mut Context,
        consensus: &Address,
        infraction_height: u64,
        power: u64,
        fraction: Decimal,
    ) -> ModuleResult<u128> {
        let params = self.params(ctx)?;
        let Some(mut validator) = self.validator_by_consensus(ctx, consensus)? else {
            warn!(%consensus, "[staking] slash for unknown validator ignored");
            return Ok(0);
        };
        let base = u128::from(power).saturating_mul(params.power_reduction);
        let amount = fraction.mul_int(base).min(validator.tokens);

        for hook in self.hooks() {
            hook.before_validator_slashed(ctx, &validator, fraction)?;
        }
        if amount == 0 {
            return Ok(0);
        }

        let pool = validator.status.pool();
        validator.tokens -= amount;
        self.set_validator(ctx, &validator)?;
        let coins = Coins::single(&params.bond_denom, amount);
        self.supply.burn_coins(ctx, pool, &coins)?;

        ctx.emit(
            Event::new("slash")
                .attr("validator", validator.operator)
                .attr("infraction_height", infraction_height)
                .attr("burned", &coins),
        );
        info!(
            operator = %validator.operator,
            infraction_height,
            %fraction,
            burned = amount,
            "[staking] validator slashed"
        );
        Ok(amount)
    }

    pub fn jail(&self, ctx: &mut Context, consensus: &Address) -> ModuleResult<()> {
        let Some(mut validator) = self.validator_by_consensus(ctx, consensus)? else {
            return Ok(());
        };
        if validator.jailed {
            return Ok(());
        }
        validator.jailed = true;
        self.set_validator(ctx, &validator)?;
        ctx.emit(Event::new("jail").attr("validator", validator.operator));
        info!(operator = %validator.operator, "[staking] validator jailed");
        Ok(())
    }

    pub fn unjail(&self, ctx: &mut Context, operator: &Address) -> ModuleResult<()> {
        let mut validator = self.require_validator(ctx, operator)?;
        validator.jailed = false;
        self.set_validator(ctx, &validator)?;
        info!(%operator, "[staking] validator unjailed");
        Ok(())
    }

    // ---- invariants ---------------------------------------------------------

    pub fn pool_violation(&self, ctx: &mut Context) -> ModuleResult<Option<String>> {
        let denom = self.bond_denom(ctx)?;
        let mut bonded = 0u128;
        let mut not_bonded = 0u128;
        for validator in self.validators(ctx)? {
            match validator.status {
                BondStatus::Bonded => bonded += validator.tokens,
                BondStatus::Unbonded => not_bonded += validator.tokens,
            }
        }
        not_bonded += self
            .unbonding_queue(ctx)?
            .iter()
            .map(|e| e.amount)
            .sum::<u128>();

        let bonded_balance = self
            .supply
            .module_balance(ctx, names::BONDED_POOL)?
            .amount_of(&denom);
        let not_bonded_balance = self
            .supply
            .module_balance(ctx, names::NOT_BONDED_POOL)?
            .amount_of(&denom);
        if bonded != bonded_balance || not_bonded != not_bonded_balance {
            return Ok(Some(format!(
                "pool balances bonded={bonded_balance} not_bonded={not_bonded_balance}, \
                 expected bonded={bonded} not_bonded={not_bonded}"
            )));
        }
        Ok(None)
    }

    pub fn shares_violation(&self, ctx: &mut Context) -> ModuleResult<Option<String>> {
        let mut sums: BTreeMap<Address, u128> = BTreeMap::new();
        for delegation in self.delegations(ctx)? {
            *sums.entry(delegation.validator).or_default() += delegation.shares;
        }
        for validator in self.validators(ctx)? {
            let total = sums.get(&validator.operator).copied().unwrap_or(0);
            if total != validator.delegator_shares {
                return Ok(Some(format!(
                    "validator {} has {} shares but delegations sum to {total}",
                    validator.operator, validator.delegator_shares
                )));
            }
        }
        Ok(None)
    }
}

// =============================================================================
// MODULE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingGenesis {
    #[serde(default)]
    pub params: StakingParams,
    #[serde(default)]
    pub validators: Vec<Validator>,
    #[serde(default)]
    pub delegations: Vec<Delegation>,
    #[serde(default)]
    pub unbonding_entries: Vec<UnbondingEntry>,
}

pub struct StakingModule {
    keeper: Arc<StakingKeeper>,
}

impl StakingModule {
    pub fn new(keeper: Arc<StakingKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for StakingModule {
    fn name(&self) -> &'static str {
        names::STAKING
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::STAKING, &StakingGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: StakingGenesis = decode_genesis(names::STAKING, genesis)?;
        genesis.params.validate().map_err(ModuleError::InvalidGenesis)?;
        let mut operators = BTreeSet::new();
        let mut consensus = BTreeSet::new();
        for validator in &genesis.validators {
            if !operators.insert(validator.operator)
                || !consensus.insert(validator.consensus_address())
            {
                return Err(ModuleError::InvalidGenesis(format!(
                    "duplicate validator {}",
                    validator.operator
                )));
            }
        }
        Ok(())
    }

    /// Stored bonded validators form the initial set; their tokens must
    /// already be held by the bonded pool through the bank genesis.
    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: StakingGenesis = decode_genesis(names::STAKING, genesis)?;
        self.keeper.subspace.set_params(ctx, &genesis.params)?;
        let mut updates = Vec::new();
        for validator in &genesis.validators {
            self.keeper.set_validator(ctx, validator)?;
            let power = validator.consensus_power(genesis.params.power_reduction);
            if validator.is_bonded() && !validator.jailed && power > 0 {
                self.keeper.set_last_power(ctx, &validator.operator, power)?;
                updates.push(ValidatorUpdate {
                    pub_key: validator.consensus_pubkey,
                    power,
                });
            }
        }
        for delegation in &genesis.delegations {
            self.keeper.set_delegation(ctx, delegation)?;
        }
        let mut queue = genesis.unbonding_entries.clone();
        queue.sort_by_key(|e| e.completion_time);
        self.keeper.set_unbonding_queue(ctx, &queue)?;
        info!(validators = genesis.validators.len(), bonded = updates.len(), "[staking] genesis loaded");
        Ok(updates)
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = StakingGenesis {
            params: self.keeper.params(ctx)?,
            validators: self.keeper.validators(ctx)?,
            delegations: self.keeper.delegations(ctx)?,
            unbonding_entries: self.keeper.unbonding_queue(ctx)?,
        };
        encode_genesis(names::STAKING, &genesis)
    }

    fn has_begin_blocker(&self) -> bool {
        true
    }

    fn begin_block(&self, ctx: &mut Context, _req: &RequestBeginBlock) -> ModuleResult<()> {
        self.keeper.complete_unbondings(ctx).map(|_| ())
    }

    fn has_end_blocker(&self) -> bool {
        true
    }

    fn end_block(&self, ctx: &mut Context, _req: &RequestEndBlock) -> ModuleResult<Vec<ValidatorUpdate>> {
        self.keeper.apply_validator_set_updates(ctx)
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::STAKING)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::CreateValidator(m) => self.keeper.create_validator(ctx, m),
            Msg::Delegate(MsgDelegate {
                delegator,
                validator,
                amount,
            }) => self.keeper.delegate(ctx, *delegator, *validator, amount),
            Msg::Undelegate(MsgUndelegate {
                delegator,
                validator,
                amount,
            }) => self
                .keeper
                .undelegate(ctx, *delegator, *validator, amount)
                .map(|_| ()),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::STAKING)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["validators"] => to_json(&self.keeper.validators(ctx)?),
            ["validator", operator] => {
                let operator = parse_address(operator)?;
                to_json(&self.keeper.require_validator(ctx, &operator)?)
            }
            ["delegation", delegator, validator] => {
                let delegator = parse_address(delegator)?;
                let validator = parse_address(validator)?;
                to_json(&self.keeper.delegation(ctx, &delegator, &validator)?)
            }
            ["params"] => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("staking/{path}"))),
        }
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        let keeper = Arc::clone(&self.keeper);
        registry.register(
            names::STAKING,
            "module-accounts",
            invariant(move |ctx| keeper.pool_violation(ctx)),
        );
        let keeper = Arc::clone(&self.keeper);
        registry.register(
            names::STAKING,
            "delegator-shares",
            invariant(move |ctx| keeper.shares_violation(ctx)),
        );
    }
}
