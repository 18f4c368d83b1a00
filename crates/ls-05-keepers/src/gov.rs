//! # Governance
//!
//! Proposals move through a deposit period and a voting period. At the end of
//! voting, EndBlock tallies the bonded stake behind each option:
//!
//! | Outcome | Condition | Deposits |
//! |---------|-----------|----------|
//! | no quorum | voted stake / bonded stake < `quorum` | burned |
//! | vetoed | `NoWithVeto` / voted >= `veto_threshold` | burned |
//! | passed | `Yes` / (voted - abstain) > `threshold` | refunded |
//! | rejected | otherwise | refunded |
//!
//! A passed proposal is executed by the handler registered for its route in
//! the `GovRouter`, on a branch of the block state that is discarded if the
//! handler fails.
//!
//! ```text
//! proposal/<id>              -> Proposal
//! next_proposal_id           -> u64
//! deposit/<id>/<depositor>   -> Coins
//! vote/<id>/<voter>          -> VoteOption
//! ```

use crate::codec::{decode_genesis, encode_genesis, index_key, to_json};
use crate::params::{ParamSet, Subspace};
use crate::staking::StakingKeeper;
use crate::supply::SupplyKeeper;
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::coins::amount_string;
use shared_types::{
    names, Address, Coins, Decimal, Event, Msg, MsgDeposit, MsgSubmitProposal, MsgVote,
    ProposalContent, RequestEndBlock, ValidatorUpdate, VoteOption,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

const PROPOSAL_PREFIX: &str = "proposal";
const DEPOSIT_PREFIX: &str = "deposit";
const VOTE_PREFIX: &str = "vote";
const NEXT_PROPOSAL_ID: &[u8] = b"next_proposal_id";

// =============================================================================
// ROUTER
// =============================================================================

/// Executes passed proposals of one content route.
pub trait ProposalHandler: Send + Sync {
    fn handle(&self, ctx: &mut Context, content: &ProposalContent) -> ModuleResult<()>;
}

/// Text proposals carry no action.
pub struct TextProposalHandler;

impl ProposalHandler for TextProposalHandler {
    fn handle(&self, _ctx: &mut Context, content: &ProposalContent) -> ModuleResult<()> {
        match content {
            ProposalContent::Text { .. } => Ok(()),
            _ => Err(ModuleError::InvalidRequest("not a text proposal".into())),
        }
    }
}

#[derive(Default)]
pub struct GovRouter {
    routes: BTreeMap<&'static str, Arc<dyn ProposalHandler>>,
}

impl GovRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(
        mut self,
        route: &'static str,
        handler: Arc<dyn ProposalHandler>,
    ) -> ModuleResult<Self> {
        if self.routes.insert(route, handler).is_some() {
            return Err(ModuleError::InvalidRequest(format!(
                "governance route {route} registered twice"
            )));
        }
        Ok(self)
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    pub fn routes(&self) -> Vec<&'static str> {
        self.routes.keys().copied().collect()
    }

    fn handler(&self, route: &str) -> Option<&Arc<dyn ProposalHandler>> {
        self.routes.get(route)
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovParams {
    pub min_deposit: Coins,
    /// Seconds.
    pub max_deposit_period: u64,
    /// Seconds.
    pub voting_period: u64,
    pub quorum: Decimal,
    pub threshold: Decimal,
    pub veto_threshold: Decimal,
}

impl Default for GovParams {
    fn default() -> Self {
        Self {
            min_deposit: Coins::single("ubld", 10_000_000),
            max_deposit_period: 172_800,
            voting_period: 172_800,
            quorum: Decimal::from_ratio(334, 1000),
            threshold: Decimal::from_ratio(1, 2),
            veto_threshold: Decimal::from_ratio(334, 1000),
        }
    }
}

impl ParamSet for GovParams {
    fn validate(&self) -> Result<(), String> {
        if self.voting_period == 0 || self.max_deposit_period == 0 {
            return Err("deposit and voting periods must be positive".into());
        }
        if self.quorum > Decimal::ONE || self.threshold > Decimal::ONE || self.veto_threshold > Decimal::ONE {
            return Err("tally fractions must not exceed 1".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    DepositPeriod,
    VotingPeriod,
    Passed,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    #[serde(with = "amount_string")]
    pub yes: u128,
    #[serde(with = "amount_string")]
    pub abstain: u128,
    #[serde(with = "amount_string")]
    pub no: u128,
    #[serde(with = "amount_string")]
    pub no_with_veto: u128,
}

impl TallyResult {
    fn add(&mut self, option: VoteOption, power: u128) {
        let slot = match option {
            VoteOption::Yes => &mut self.yes,
            VoteOption::Abstain => &mut self.abstain,
            VoteOption::No => &mut self.no,
            VoteOption::NoWithVeto => &mut self.no_with_veto,
        };
        *slot += power;
    }

    pub fn total(&self) -> u128 {
        self.yes + self.abstain + self.no + self.no_with_veto
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u64,
    pub content: ProposalContent,
    pub status: ProposalStatus,
    pub submit_time: u64,
    pub deposit_end_time: u64,
    pub total_deposit: Coins,
    pub voting_start_time: u64,
    pub voting_end_time: u64,
    #[serde(default)]
    pub final_tally: Option<TallyResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TallyOutcome {
    Passed,
    Rejected { burn_deposits: bool },
}

// =============================================================================
// KEEPER
// =============================================================================

pub struct GovKeeper {
    key: StoreKey,
    subspace: Subspace,
    supply: Arc<SupplyKeeper>,
    staking: Arc<StakingKeeper>,
    router: GovRouter,
}

impl GovKeeper {
    pub fn new(
        key: StoreKey,
        subspace: Subspace,
        supply: Arc<SupplyKeeper>,
        staking: Arc<StakingKeeper>,
        router: GovRouter,
    ) -> Self {
        Self {
            key,
            subspace,
            supply,
            staking,
            router,
        }
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<GovParams> {
        self.subspace.get_params(ctx)
    }

    pub fn router(&self) -> &GovRouter {
        &self.router
    }

    pub fn proposal(&self, ctx: &mut Context, id: u64) -> ModuleResult<Option<Proposal>> {
        Ok(ctx.kv(&self.key)?.get_json(&index_key(PROPOSAL_PREFIX, id))?)
    }

    fn require_proposal(&self, ctx: &mut Context, id: u64) -> ModuleResult<Proposal> {
        self.proposal(ctx, id)?
            .ok_or_else(|| ModuleError::custom(names::GOV, 1, format!("unknown proposal {id}")))
    }

    fn set_proposal(&self, ctx: &mut Context, proposal: &Proposal) -> ModuleResult<()> {
        ctx.kv(&self.key)?
            .set_json(&index_key(PROPOSAL_PREFIX, proposal.id), proposal)?;
        Ok(())
    }

    fn delete_proposal(&self, ctx: &mut Context, id: u64) -> ModuleResult<()> {
        ctx.kv(&self.key)?.delete(&index_key(PROPOSAL_PREFIX, id))?;
        Ok(())
    }

    pub fn proposals(&self, ctx: &mut Context) -> ModuleResult<Vec<Proposal>> {
        let prefix = format!("{PROPOSAL_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<Proposal>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, p)| p)
            .collect())
    }

    fn next_id(&self, ctx: &mut Context) -> ModuleResult<u64> {
        let mut kv = ctx.kv(&self.key)?;
        let id: u64 = kv.get_json(NEXT_PROPOSAL_ID)?.unwrap_or(1);
        kv.set_json(NEXT_PROPOSAL_ID, &(id + 1))?;
        Ok(id)
    }

    fn entry_key(prefix: &str, id: u64, address: &Address) -> Vec<u8> {
        format!("{prefix}/{id:020}/{address}").into_bytes()
    }

    /// `(depositor, amount)` of every deposit on proposal `id`.
    pub fn deposits(&self, ctx: &mut Context, id: u64) -> ModuleResult<Vec<(Address, Coins)>> {
        let prefix = format!("{DEPOSIT_PREFIX}/{id:020}/");
        ctx.kv(&self.key)?
            .prefix_iter_json::<Coins>(prefix.as_bytes())?
            .into_iter()
            .map(|(k, coins)| {
                let hex = String::from_utf8_lossy(&k[prefix.len()..]).into_owned();
                Ok((crate::codec::parse_address(&hex)?, coins))
            })
            .collect()
    }

    pub fn votes(&self, ctx: &mut Context, id: u64) -> ModuleResult<Vec<(Address, VoteOption)>> {
        let prefix = format!("{VOTE_PREFIX}/{id:020}/");
        ctx.kv(&self.key)?
            .prefix_iter_json::<VoteOption>(prefix.as_bytes())?
            .into_iter()
            .map(|(k, option)| {
                let hex = String::from_utf8_lossy(&k[prefix.len()..]).into_owned();
                Ok((crate::codec::parse_address(&hex)?, option))
            })
            .collect()
    }

    pub fn submit_proposal(&self, ctx: &mut Context, msg: &MsgSubmitProposal) -> ModuleResult<u64> {
        let route = msg.content.route();
        if !self.router.has_route(route) {
            return Err(ModuleError::custom(
                names::GOV,
                5,
                format!("no handler for proposal route {route}"),
            ));
        }
        let params = self.params(ctx)?;
        let id = self.next_id(ctx)?;
        let now = ctx.block_time();
        let proposal = Proposal {
            id,
            content: msg.content.clone(),
            status: ProposalStatus::DepositPeriod,
            submit_time: now,
            deposit_end_time: now + params.max_deposit_period,
            total_deposit: Coins::new(),
            voting_start_time: 0,
            voting_end_time: 0,
            final_tally: None,
        };
        self.set_proposal(ctx, &proposal)?;
        ctx.emit(
            Event::new("submit_proposal")
                .attr("proposal_id", id)
                .attr("proposer", msg.proposer)
                .attr("title", msg.content.title()),
        );
        info!(id, route, title = msg.content.title(), "[gov] proposal submitted");
        if !msg.initial_deposit.is_zero() {
            self.add_deposit(ctx, id, msg.proposer, &msg.initial_deposit)?;
        }
        Ok(id)
    }

    pub fn add_deposit(
        &self,
        ctx: &mut Context,
        id: u64,
        depositor: Address,
        amount: &Coins,
    ) -> ModuleResult<()> {
        let mut proposal = self.require_proposal(ctx, id)?;
        if !matches!(
            proposal.status,
            ProposalStatus::DepositPeriod | ProposalStatus::VotingPeriod
        ) {
            return Err(ModuleError::custom(names::GOV, 2, format!("proposal {id} is closed")));
        }
        self.supply
            .send_coins_from_account_to_module(ctx, depositor, names::GOV, amount)?;

        let key = Self::entry_key(DEPOSIT_PREFIX, id, &depositor);
        let previous: Coins = ctx.kv(&self.key)?.get_json(&key)?.unwrap_or_default();
        ctx.kv(&self.key)?.set_json(&key, &previous.checked_add(amount)?)?;

        proposal.total_deposit = proposal.total_deposit.checked_add(amount)?;
        let params = self.params(ctx)?;
        if proposal.status == ProposalStatus::DepositPeriod
            && proposal.total_deposit.is_all_gte(&params.min_deposit)
        {
            proposal.status = ProposalStatus::VotingPeriod;
            proposal.voting_start_time = ctx.block_time();
            proposal.voting_end_time = ctx.block_time() + params.voting_period;
            ctx.emit(Event::new("proposal_deposit").attr("voting_period_start", id));
            info!(id, "[gov] voting period started");
        }
        self.set_proposal(ctx, &proposal)
    }

    pub fn add_vote(&self, ctx: &mut Context, id: u64, voter: Address, option: VoteOption) -> ModuleResult<()> {
        let proposal = self.require_proposal(ctx, id)?;
        if proposal.status != ProposalStatus::VotingPeriod {
            return Err(ModuleError::custom(
                names::GOV,
                3,
                format!("proposal {id} is not in its voting period"),
            ));
        }
        ctx.kv(&self.key)?
            .set_json(&Self::entry_key(VOTE_PREFIX, id, &voter), &option)?;
        ctx.emit(
            Event::new("proposal_vote")
                .attr("proposal_id", id)
                .attr("voter", voter)
                .attr("option", format!("{option:?}")),
        );
        Ok(())
    }

    /// Weigh votes by bonded stake. A delegator's own vote overrides the
    /// vote its validator casts for the delegated shares.
    pub fn tally(&self, ctx: &mut Context, id: u64) -> ModuleResult<(TallyOutcome, TallyResult)> {
        let params = self.params(ctx)?;
        let votes = self.votes(ctx, id)?;
        let mut validators: HashMap<Address, (u128, u128, u128, Option<VoteOption>)> = self
            .staking
            .bonded_validators(ctx)?
            .into_iter()
            .map(|v| (v.operator, (v.tokens, v.delegator_shares, 0u128, None)))
            .collect();
        let total_bonded: u128 = validators.values().map(|(tokens, ..)| *tokens).sum();
        let mut result = TallyResult::default();

        for (voter, option) in &votes {
            if let Some(entry) = validators.get_mut(voter) {
                entry.3 = Some(*option);
            }
            for delegation in self.staking.delegator_delegations(ctx, voter)? {
                let Some(entry) = validators.get_mut(&delegation.validator) else {
                    continue;
                };
                entry.2 += delegation.shares;
                let power = Decimal::from_ratio(entry.0, entry.1).mul_int(delegation.shares);
                result.add(*option, power);
            }
        }
        for (tokens, shares, deducted, option) in validators.values() {
            let Some(option) = option else { continue };
            let remaining = shares.saturating_sub(*deducted);
            result.add(*option, Decimal::from_ratio(*tokens, *shares).mul_int(remaining));
        }
        let total = result.total();

        if total_bonded == 0 {
            return Ok((TallyOutcome::Rejected { burn_deposits: false }, result));
        }
        if Decimal::from_ratio(total, total_bonded) < params.quorum {
            return Ok((TallyOutcome::Rejected { burn_deposits: true }, result));
        }
        let counted = total - result.abstain;
        if counted == 0 {
            return Ok((TallyOutcome::Rejected { burn_deposits: false }, result));
        }
        if Decimal::from_ratio(result.no_with_veto, total) >= params.veto_threshold {
            return Ok((TallyOutcome::Rejected { burn_deposits: true }, result));
        }
        if Decimal::from_ratio(result.yes, counted) > params.threshold {
            return Ok((TallyOutcome::Passed, result));
        }
        Ok((TallyOutcome::Rejected { burn_deposits: false }, result))
    }

    fn settle_deposits(&self, ctx: &mut Context, id: u64, burn: bool) -> ModuleResult<()> {
        let deposits = self.deposits(ctx, id)?;
        let mut burned = Coins::new();
        for (depositor, amount) in deposits {
            if burn {
                burned = burned.checked_add(&amount)?;
            } else {
                self.supply
                    .send_coins_from_module_to_account(ctx, names::GOV, depositor, &amount)?;
            }
            ctx.kv(&self.key)?
                .delete(&Self::entry_key(DEPOSIT_PREFIX, id, &depositor))?;
        }
        if !burned.is_zero() {
            self.supply.burn_coins(ctx, names::GOV, &burned)?;
        }
        Ok(())
    }

    fn clear_votes(&self, ctx: &mut Context, id: u64) -> ModuleResult<()> {
        for (voter, _) in self.votes(ctx, id)? {
            ctx.kv(&self.key)?
                .delete(&Self::entry_key(VOTE_PREFIX, id, &voter))?;
        }
        Ok(())
    }

    /// Close expired deposit periods and finished votes.
    pub fn end_blocker(&self, ctx: &mut Context) -> ModuleResult<()> {
        let now = ctx.block_time();
        for mut proposal in self.proposals(ctx)? {
            match proposal.status {
                ProposalStatus::DepositPeriod if now >= proposal.deposit_end_time => {
                    self.settle_deposits(ctx, proposal.id, true)?;
                    self.delete_proposal(ctx, proposal.id)?;
                    ctx.emit(Event::new("inactive_proposal").attr("proposal_id", proposal.id));
                    info!(id = proposal.id, "[gov] proposal dropped, deposit period expired");
                }
                ProposalStatus::VotingPeriod if now >= proposal.voting_end_time => {
                    let (outcome, tally) = self.tally(ctx, proposal.id)?;
                    proposal.status = match outcome {
                        TallyOutcome::Passed => {
                            self.settle_deposits(ctx, proposal.id, false)?;
                            self.execute(ctx, &proposal)
                        }
                        TallyOutcome::Rejected { burn_deposits } => {
                            self.settle_deposits(ctx, proposal.id, burn_deposits)?;
                            ProposalStatus::Rejected
                        }
                    };
                    proposal.final_tally = Some(tally);
                    self.clear_votes(ctx, proposal.id)?;
                    self.set_proposal(ctx, &proposal)?;
                    ctx.emit(
                        Event::new("active_proposal")
                            .attr("proposal_id", proposal.id)
                            .attr("result", format!("{:?}", proposal.status)),
                    );
                    info!(id = proposal.id, status = ?proposal.status, "[gov] proposal finished");
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut Context, proposal: &Proposal) -> ProposalStatus {
        let route = proposal.content.route();
        let Some(handler) = self.router.handler(route) else {
            warn!(id = proposal.id, route, "[gov] passed proposal has no handler");
            return ProposalStatus::Failed;
        };
        let mut branch = ctx.branch();
        match handler.handle(&mut branch, &proposal.content) {
            Ok(()) => {
                ctx.write_branch(branch);
                ProposalStatus::Passed
            }
            Err(e) => {
                ctx.discard_branch(branch);
                warn!(id = proposal.id, error = %e, "[gov] proposal handler failed");
                ProposalStatus::Failed
            }
        }
    }
}

// =============================================================================
// MODULE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub proposal_id: u64,
    pub depositor: Address,
    pub amount: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal_id: u64,
    pub voter: Address,
    pub option: VoteOption,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovGenesis {
    #[serde(default = "first_proposal_id")]
    pub starting_proposal_id: u64,
    #[serde(default)]
    pub params: GovParams,
    #[serde(default)]
    pub proposals: Vec<Proposal>,
    #[serde(default)]
    pub deposits: Vec<DepositRecord>,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
}

fn first_proposal_id() -> u64 {
    1
}

impl Default for GovGenesis {
    fn default() -> Self {
        Self {
            starting_proposal_id: first_proposal_id(),
            params: GovParams::default(),
            proposals: Vec::new(),
            deposits: Vec::new(),
            votes: Vec::new(),
        }
    }
}

pub struct GovModule {
    keeper: Arc<GovKeeper>,
}

impl GovModule {
    pub fn new(keeper: Arc<GovKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for GovModule {
    fn name(&self) -> &'static str {
        names::GOV
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::GOV, &GovGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: GovGenesis = decode_genesis(names::GOV, genesis)?;
        genesis.params.validate().map_err(ModuleError::InvalidGenesis)?;
        if genesis.starting_proposal_id == 0 {
            return Err(ModuleError::InvalidGenesis("starting proposal id must be positive".into()));
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: GovGenesis = decode_genesis(names::GOV, genesis)?;
        let keeper = &self.keeper;
        keeper.subspace.set_params(ctx, &genesis.params)?;
        ctx.kv(&keeper.key)?
            .set_json(NEXT_PROPOSAL_ID, &genesis.starting_proposal_id)?;
        for proposal in &genesis.proposals {
            keeper.set_proposal(ctx, proposal)?;
        }
        for deposit in &genesis.deposits {
            let key = GovKeeper::entry_key(DEPOSIT_PREFIX, deposit.proposal_id, &deposit.depositor);
            ctx.kv(&keeper.key)?.set_json(&key, &deposit.amount)?;
        }
        for vote in &genesis.votes {
            let key = GovKeeper::entry_key(VOTE_PREFIX, vote.proposal_id, &vote.voter);
            ctx.kv(&keeper.key)?.set_json(&key, &vote.option)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let keeper = &self.keeper;
        let proposals = keeper.proposals(ctx)?;
        let mut deposits = Vec::new();
        let mut votes = Vec::new();
        for proposal in &proposals {
            for (depositor, amount) in keeper.deposits(ctx, proposal.id)? {
                deposits.push(DepositRecord {
                    proposal_id: proposal.id,
                    depositor,
                    amount,
                });
            }
            for (voter, option) in keeper.votes(ctx, proposal.id)? {
                votes.push(VoteRecord {
                    proposal_id: proposal.id,
                    voter,
                    option,
                });
            }
        }
        let starting_proposal_id: u64 = ctx
            .kv(&keeper.key)?
            .get_json(NEXT_PROPOSAL_ID)?
            .unwrap_or(1);
        let genesis = GovGenesis {
            starting_proposal_id,
            params: keeper.params(ctx)?,
            proposals,
            deposits,
            votes,
        };
        encode_genesis(names::GOV, &genesis)
    }

    fn has_end_blocker(&self) -> bool {
        true
    }

    fn end_block(&self, ctx: &mut Context, _req: &RequestEndBlock) -> ModuleResult<Vec<ValidatorUpdate>> {
        self.keeper.end_blocker(ctx)?;
        Ok(Vec::new())
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::GOV)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::SubmitProposal(m) => self.keeper.submit_proposal(ctx, m).map(|_| ()),
            Msg::Deposit(MsgDeposit {
                depositor,
                proposal_id,
                amount,
            }) => self.keeper.add_deposit(ctx, *proposal_id, *depositor, amount),
            Msg::Vote(MsgVote {
                voter,
                proposal_id,
                option,
            }) => self.keeper.add_vote(ctx, *proposal_id, *voter, *option),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::GOV)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        let parse_id = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| ModuleError::InvalidRequest(format!("bad proposal id {s}")))
        };
        match path.split_once('/') {
            Some(("proposal", id)) => {
                let id = parse_id(id)?;
                to_json(&self.keeper.require_proposal(ctx, id)?)
            }
            Some(("tally", id)) => {
                let id = parse_id(id)?;
                to_json(&self.keeper.tally(ctx, id)?.1)
            }
            None if path == "proposals" => to_json(&self.keeper.proposals(ctx)?),
            None if path == "params" => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("gov/{path}"))),
        }
    }
}
