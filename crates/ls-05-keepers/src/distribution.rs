//! # Distribution
//!
//! Fee and block-reward allocation.
//!
//! ```text
//! outstanding/<operator>   -> Coins   rewards withdrawable by the operator
//! community_pool           -> Coins
//! previous_proposer        -> Address (consensus address)
//! ```
//!
//! At each BeginBlock everything in the fee collector moves into the
//! distribution account and is split: a proposer bonus scaled by the share of
//! power that signed, the community tax, and the rest pro rata to the power of
//! each validator in the last commit. Truncation remainders and shares of
//! unknown or stakeless validators go to the community pool, so
//! `sum(outstanding) + community_pool` always equals the account balance.
//!
//! Rewards are tracked per validator; the operator withdraws them.

use crate::codec::{address_key, decode_genesis, encode_genesis, parse_address, to_json};
use crate::gov::ProposalHandler;
use crate::params::{ParamSet, Subspace};
use crate::staking::{StakingHooks, StakingKeeper, Validator};
use crate::supply::SupplyKeeper;
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{invariant, AppModule, InvariantRegistry, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{
    names, Address, Coins, Decimal, Event, Msg, ProposalContent, RequestBeginBlock,
    ValidatorUpdate, VoteInfo,
};
use std::sync::Arc;
use tracing::{debug, info};

const OUTSTANDING_PREFIX: &str = "outstanding";
const COMMUNITY_POOL: &[u8] = b"community_pool";
const PREVIOUS_PROPOSER: &[u8] = b"previous_proposer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionParams {
    pub community_tax: Decimal,
    pub base_proposer_reward: Decimal,
    pub bonus_proposer_reward: Decimal,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            community_tax: Decimal::from_ratio(2, 100),
            base_proposer_reward: Decimal::from_ratio(1, 100),
            bonus_proposer_reward: Decimal::from_ratio(4, 100),
        }
    }
}

impl ParamSet for DistributionParams {
    fn validate(&self) -> Result<(), String> {
        let total = self
            .community_tax
            .saturating_add(self.base_proposer_reward)
            .saturating_add(self.bonus_proposer_reward);
        if total > Decimal::ONE {
            return Err("community tax and proposer rewards exceed 1".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingRewards {
    pub validator: Address,
    pub rewards: Coins,
}

pub struct DistributionKeeper {
    key: StoreKey,
    subspace: Subspace,
    supply: Arc<SupplyKeeper>,
    staking: Arc<StakingKeeper>,
}

impl DistributionKeeper {
    pub fn new(
        key: StoreKey,
        subspace: Subspace,
        supply: Arc<SupplyKeeper>,
        staking: Arc<StakingKeeper>,
    ) -> Self {
        Self {
            key,
            subspace,
            supply,
            staking,
        }
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<DistributionParams> {
        self.subspace.get_params(ctx)
    }

    pub fn outstanding(&self, ctx: &mut Context, operator: &Address) -> ModuleResult<Coins> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&address_key(OUTSTANDING_PREFIX, operator))?
            .unwrap_or_default())
    }

    fn set_outstanding(&self, ctx: &mut Context, operator: &Address, rewards: &Coins) -> ModuleResult<()> {
        let key = address_key(OUTSTANDING_PREFIX, operator);
        let mut kv = ctx.kv(&self.key)?;
        if rewards.is_zero() {
            kv.delete(&key)?;
        } else {
            kv.set_json(&key, rewards)?;
        }
        Ok(())
    }

    pub fn all_outstanding(&self, ctx: &mut Context) -> ModuleResult<Vec<OutstandingRewards>> {
        let prefix = format!("{OUTSTANDING_PREFIX}/");
        ctx.kv(&self.key)?
            .prefix_iter_json::<Coins>(prefix.as_bytes())?
            .into_iter()
            .map(|(k, rewards)| {
                let hex = String::from_utf8_lossy(&k[prefix.len()..]).into_owned();
                Ok(OutstandingRewards {
                    validator: parse_address(&hex)?,
                    rewards,
                })
            })
            .collect()
    }

    pub fn community_pool(&self, ctx: &mut Context) -> ModuleResult<Coins> {
        Ok(ctx.kv(&self.key)?.get_json(COMMUNITY_POOL)?.unwrap_or_default())
    }

    fn set_community_pool(&self, ctx: &mut Context, pool: &Coins) -> ModuleResult<()> {
        ctx.kv(&self.key)?.set_json(COMMUNITY_POOL, pool)?;
        Ok(())
    }

    fn add_to_community_pool(&self, ctx: &mut Context, amount: &Coins) -> ModuleResult<()> {
        let pool = self.community_pool(ctx)?.checked_add(amount)?;
        self.set_community_pool(ctx, &pool)
    }

    pub fn previous_proposer(&self, ctx: &mut Context) -> ModuleResult<Option<Address>> {
        Ok(ctx.kv(&self.key)?.get_json(PREVIOUS_PROPOSER)?)
    }

    fn set_previous_proposer(&self, ctx: &mut Context, proposer: &Address) -> ModuleResult<()> {
        ctx.kv(&self.key)?.set_json(PREVIOUS_PROPOSER, proposer)?;
        Ok(())
    }

    /// A validator that may receive rewards: known and still holding stake.
    fn rewardable(&self, ctx: &mut Context, consensus: &Address) -> ModuleResult<Option<Validator>> {
        Ok(self
            .staking
            .validator_by_consensus(ctx, consensus)?
            .filter(|v| v.tokens > 0))
    }

    fn credit(&self, ctx: &mut Context, operator: &Address, amount: &Coins) -> ModuleResult<()> {
        let rewards = self.outstanding(ctx, operator)?.checked_add(amount)?;
        self.set_outstanding(ctx, operator, &rewards)
    }

    /// Distribute the fee collector's balance. Returns the amount collected.
    pub fn allocate_tokens(
        &self,
        ctx: &mut Context,
        proposer: Option<Address>,
        votes: &[VoteInfo],
    ) -> ModuleResult<Coins> {
        let fees = self.supply.module_balance(ctx, names::FEE_COLLECTOR)?;
        if fees.is_zero() {
            return Ok(fees);
        }
        self.supply
            .send_coins_from_module_to_module(ctx, names::FEE_COLLECTOR, names::DISTRIBUTION, &fees)?;

        let params = self.params(ctx)?;
        let total_power: u128 = votes.iter().map(|v| u128::from(v.power)).sum();
        let signed_power: u128 = votes
            .iter()
            .filter(|v| v.signed_last_block)
            .map(|v| u128::from(v.power))
            .sum();
        let mut distributed = Coins::new();

        if let Some(proposer) = proposer {
            if let Some(validator) = self.rewardable(ctx, &proposer)? {
                let multiplier = params
                    .base_proposer_reward
                    .saturating_add(params.bonus_proposer_reward.mul(Decimal::from_ratio(signed_power, total_power)));
                let reward = fees.mul_dec(multiplier);
                self.credit(ctx, &validator.operator, &reward)?;
                distributed = distributed.checked_add(&reward)?;
                ctx.emit(
                    Event::new("proposer_reward")
                        .attr("validator", validator.operator)
                        .attr("amount", &reward),
                );
            }
        }

        let voter_share = Decimal::ONE
            .checked_sub(params.community_tax)
            .and_then(|d| {
                d.checked_sub(
                    params.base_proposer_reward.saturating_add(
                        params
                            .bonus_proposer_reward
                            .mul(Decimal::from_ratio(signed_power, total_power)),
                    ),
                )
            })
            .unwrap_or(Decimal::ZERO);
        let for_voters = fees.mul_dec(voter_share);

        for vote in votes {
            let Some(validator) = self.rewardable(ctx, &vote.validator)? else {
                continue;
            };
            let reward = for_voters.mul_ratio(u128::from(vote.power), total_power);
            if reward.is_zero() {
                continue;
            }
            self.credit(ctx, &validator.operator, &reward)?;
            distributed = distributed.checked_add(&reward)?;
        }

        let to_pool = fees.checked_sub(&distributed)?;
        self.add_to_community_pool(ctx, &to_pool)?;
        debug!(height = ctx.height(), %fees, community = %to_pool, "[distribution] allocated");
        Ok(fees)
    }

    pub fn withdraw_validator_rewards(&self, ctx: &mut Context, operator: &Address) -> ModuleResult<Coins> {
        if self.staking.validator(ctx, operator)?.is_none() {
            return Err(ModuleError::custom(
                names::DISTRIBUTION,
                12,
                format!("no validator distribution info for {operator}"),
            ));
        }
        let rewards = self.outstanding(ctx, operator)?;
        if !rewards.is_zero() {
            self.supply
                .send_coins_from_module_to_account(ctx, names::DISTRIBUTION, *operator, &rewards)?;
            self.set_outstanding(ctx, operator, &Coins::new())?;
        }
        ctx.emit(
            Event::new("withdraw_rewards")
                .attr("validator", operator)
                .attr("amount", &rewards),
        );
        info!(%operator, %rewards, "[distribution] rewards withdrawn");
        Ok(rewards)
    }

    pub fn spend_community_pool(
        &self,
        ctx: &mut Context,
        recipient: Address,
        amount: &Coins,
    ) -> ModuleResult<()> {
        let pool = self.community_pool(ctx)?;
        let remaining = pool.checked_sub(amount).map_err(|_| {
            ModuleError::custom(
                names::DISTRIBUTION,
                13,
                format!("community pool {pool} cannot cover {amount}"),
            )
        })?;
        self.set_community_pool(ctx, &remaining)?;
        self.supply
            .send_coins_from_module_to_account(ctx, names::DISTRIBUTION, recipient, amount)?;
        info!(%recipient, %amount, "[distribution] community pool spend");
        Ok(())
    }

    pub fn can_withdraw_violation(&self, ctx: &mut Context) -> ModuleResult<Option<String>> {
        let mut expected = self.community_pool(ctx)?;
        for entry in self.all_outstanding(ctx)? {
            expected = expected.checked_add(&entry.rewards)?;
        }
        let balance = self.supply.module_balance(ctx, names::DISTRIBUTION)?;
        if expected == balance {
            return Ok(None);
        }
        Ok(Some(format!(
            "distribution account holds {balance}, owes {expected}"
        )))
    }
}

impl StakingHooks for DistributionKeeper {
    /// Forfeit the slashed fraction of the validator's unwithdrawn rewards.
    fn before_validator_slashed(
        &self,
        ctx: &mut Context,
        validator: &Validator,
        fraction: Decimal,
    ) -> ModuleResult<()> {
        let outstanding = self.outstanding(ctx, &validator.operator)?;
        let forfeited = if fraction >= Decimal::ONE {
            outstanding.clone()
        } else {
            outstanding.mul_dec(fraction)
        };
        if forfeited.is_zero() {
            return Ok(());
        }
        self.set_outstanding(ctx, &validator.operator, &outstanding.checked_sub(&forfeited)?)?;
        self.add_to_community_pool(ctx, &forfeited)?;
        debug!(operator = %validator.operator, %forfeited, "[distribution] rewards forfeited");
        Ok(())
    }
}

impl ProposalHandler for DistributionKeeper {
    fn handle(&self, ctx: &mut Context, content: &ProposalContent) -> ModuleResult<()> {
        match content {
            ProposalContent::CommunityPoolSpend {
                recipient, amount, ..
            } => self.spend_community_pool(ctx, *recipient, amount),
            _ => Err(ModuleError::InvalidRequest(
                "distribution handles only community pool spends".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionGenesis {
    #[serde(default)]
    pub params: DistributionParams,
    #[serde(default)]
    pub community_pool: Coins,
    #[serde(default)]
    pub outstanding_rewards: Vec<OutstandingRewards>,
    #[serde(default)]
    pub previous_proposer: Option<Address>,
}

pub struct DistributionModule {
    keeper: Arc<DistributionKeeper>,
}

impl DistributionModule {
    pub fn new(keeper: Arc<DistributionKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for DistributionModule {
    fn name(&self) -> &'static str {
        names::DISTRIBUTION
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::DISTRIBUTION, &DistributionGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: DistributionGenesis = decode_genesis(names::DISTRIBUTION, genesis)?;
        genesis.params.validate().map_err(ModuleError::InvalidGenesis)
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: DistributionGenesis = decode_genesis(names::DISTRIBUTION, genesis)?;
        self.keeper.subspace.set_params(ctx, &genesis.params)?;
        self.keeper.set_community_pool(ctx, &genesis.community_pool)?;
        for entry in &genesis.outstanding_rewards {
            self.keeper.set_outstanding(ctx, &entry.validator, &entry.rewards)?;
        }
        if let Some(proposer) = &genesis.previous_proposer {
            self.keeper.set_previous_proposer(ctx, proposer)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = DistributionGenesis {
            params: self.keeper.params(ctx)?,
            community_pool: self.keeper.community_pool(ctx)?,
            outstanding_rewards: self.keeper.all_outstanding(ctx)?,
            previous_proposer: self.keeper.previous_proposer(ctx)?,
        };
        encode_genesis(names::DISTRIBUTION, &genesis)
    }

    fn has_begin_blocker(&self) -> bool {
        true
    }

    /// Fees of the previous block are allocated using its commit; the first
    /// block has none.
    fn begin_block(&self, ctx: &mut Context, req: &RequestBeginBlock) -> ModuleResult<()> {
        if ctx.height() > 1 {
            let proposer = self.keeper.previous_proposer(ctx)?;
            self.keeper
                .allocate_tokens(ctx, proposer, &req.last_commit_votes)?;
        }
        let proposer = ctx.proposer();
        self.keeper.set_previous_proposer(ctx, &proposer)
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::DISTRIBUTION)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::WithdrawValidatorRewards(m) => self
                .keeper
                .withdraw_validator_rewards(ctx, &m.operator)
                .map(|_| ()),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::DISTRIBUTION)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path.split_once('/') {
            Some(("outstanding", operator)) => {
                let operator = parse_address(operator)?;
                to_json(&self.keeper.outstanding(ctx, &operator)?)
            }
            None if path == "community_pool" => to_json(&self.keeper.community_pool(ctx)?),
            None if path == "params" => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("distribution/{path}"))),
        }
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        let keeper = Arc::clone(&self.keeper);
        registry.register(
            names::DISTRIBUTION,
            "can-withdraw",
            invariant(move |ctx| keeper.can_withdraw_violation(ctx)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, coins, create_validator, pubkey, TestKeepers, POWER};

    fn vote(n: u8, power: u64, signed: bool) -> VoteInfo {
        VoteInfo {
            validator: pubkey(n).address(),
            power,
            signed_last_block: signed,
        }
    }

    fn collect_fees(k: &TestKeepers, ctx: &mut Context, amount: u128) {
        k.supply.mint_coins(ctx, names::MINT, &coins(amount)).unwrap();
        k.supply
            .send_coins_from_module_to_module(ctx, names::MINT, names::FEE_COLLECTOR, &coins(amount))
            .unwrap();
    }

    #[test]
    fn test_allocation_splits_fees() {
        let (k, mut ctx) = TestKeepers::new();
        create_validator(&k, &mut ctx, 1, 3 * POWER);
        create_validator(&k, &mut ctx, 2, POWER);
        collect_fees(&k, &mut ctx, 1_000);

        let votes = [vote(1, 3, true), vote(2, 1, true)];
        k.distribution
            .allocate_tokens(&mut ctx, Some(pubkey(1).address()), &votes)
            .unwrap();

        // Proposer: 1% + 4% * 1.0 = 50. Community tax: 20. Voters share 930.
        assert_eq!(k.distribution.outstanding(&mut ctx, &addr(1)).unwrap(), coins(50 + 697));
        assert_eq!(k.distribution.outstanding(&mut ctx, &addr(2)).unwrap(), coins(232));
        assert_eq!(k.distribution.community_pool(&mut ctx).unwrap(), coins(21));
        assert_eq!(k.distribution.can_withdraw_violation(&mut ctx).unwrap(), None);
        assert!(k
            .supply
            .module_balance(&mut ctx, names::FEE_COLLECTOR)
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_unknown_voter_share_goes_to_community_pool() {
        let (k, mut ctx) = TestKeepers::new();
        create_validator(&k, &mut ctx, 1, POWER);
        collect_fees(&k, &mut ctx, 100);
        k.distribution
            .allocate_tokens(&mut ctx, None, &[vote(1, 1, true), vote(9, 1, true)])
            .unwrap();
        let pool = k.distribution.community_pool(&mut ctx).unwrap();
        let paid = k.distribution.outstanding(&mut ctx, &addr(1)).unwrap();
        assert_eq!(pool.checked_add(&paid).unwrap(), coins(100));
        assert_eq!(k.distribution.can_withdraw_violation(&mut ctx).unwrap(), None);
    }

    #[test]
    fn test_withdraw_and_full_slash_forfeit() {
        let (k, mut ctx) = TestKeepers::new();
        create_validator(&k, &mut ctx, 1, POWER);
        create_validator(&k, &mut ctx, 2, POWER);
        collect_fees(&k, &mut ctx, 1_000);
        k.distribution
            .allocate_tokens(&mut ctx, None, &[vote(1, 1, true), vote(2, 1, true)])
            .unwrap();

        let withdrawn = k
            .distribution
            .withdraw_validator_rewards(&mut ctx, &addr(1))
            .unwrap();
        assert!(!withdrawn.is_zero());
        assert_eq!(k.bank.balance(&mut ctx, &addr(1)).unwrap(), withdrawn);

        let validator = k.staking.validator(&mut ctx, &addr(2)).unwrap().unwrap();
        k.distribution
            .before_validator_slashed(&mut ctx, &validator, Decimal::ONE)
            .unwrap();
        assert!(k.distribution.outstanding(&mut ctx, &addr(2)).unwrap().is_zero());
        assert_eq!(k.distribution.can_withdraw_violation(&mut ctx).unwrap(), None);
    }

    #[test]
    fn test_community_pool_spend() {
        let (k, mut ctx) = TestKeepers::new();
        collect_fees(&k, &mut ctx, 100);
        k.distribution.allocate_tokens(&mut ctx, None, &[]).unwrap();
        assert_eq!(k.distribution.community_pool(&mut ctx).unwrap(), coins(100));

        let spend = |amount| ProposalContent::CommunityPoolSpend {
            title: "grant".into(),
            description: "grant".into(),
            recipient: addr(5),
            amount: coins(amount),
        };
        assert!(k.distribution.handle(&mut ctx, &spend(101)).is_err());
        k.distribution.handle(&mut ctx, &spend(40)).unwrap();
        assert_eq!(k.bank.balance(&mut ctx, &addr(5)).unwrap(), coins(40));
        assert_eq!(k.distribution.can_withdraw_violation(&mut ctx).unwrap(), None);
    }
}
