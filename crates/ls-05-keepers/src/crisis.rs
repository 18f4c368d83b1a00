//! # Crisis
//!
//! Runs every registered invariant at genesis and every `inv_check_period`
//! blocks in EndBlock. A broken invariant is a fatal `InvariantBroken` error:
//! the node halts instead of building on corrupted state.
//!
//! Anyone may pay `constant_fee` to check a single invariant on demand with
//! `MsgVerifyInvariant`.

use crate::codec::{decode_genesis, encode_genesis, to_json};
use crate::params::{ParamSet, Subspace};
use crate::supply::SupplyKeeper;
use ls_01_store::Context;
use ls_04_orchestrator::{AppModule, InvariantRegistry, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, Coins, Event, Msg, MsgVerifyInvariant, RequestEndBlock, ValidatorUpdate};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisParams {
    pub constant_fee: Coins,
}

impl Default for CrisisParams {
    fn default() -> Self {
        Self {
            constant_fee: Coins::single("ubld", 1_000),
        }
    }
}

impl ParamSet for CrisisParams {}

pub struct CrisisKeeper {
    subspace: Subspace,
    supply: Arc<SupplyKeeper>,
    inv_check_period: u64,
    invariants: OnceLock<Arc<InvariantRegistry>>,
}

impl CrisisKeeper {
    /// `inv_check_period` of 0 disables the periodic check.
    pub fn new(subspace: Subspace, supply: Arc<SupplyKeeper>, inv_check_period: u64) -> Self {
        Self {
            subspace,
            supply,
            inv_check_period,
            invariants: OnceLock::new(),
        }
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<CrisisParams> {
        self.subspace.get_params(ctx)
    }

    pub fn inv_check_period(&self) -> u64 {
        self.inv_check_period
    }

    /// Install the registry collected from the module manager.
    pub fn set_invariants(&self, registry: Arc<InvariantRegistry>) -> ModuleResult<()> {
        self.invariants
            .set(registry)
            .map_err(|_| ModuleError::InvalidRequest("invariants already registered".into()))
    }

    pub fn invariant_routes(&self) -> Vec<String> {
        self.invariants
            .get()
            .map(|r| r.routes())
            .unwrap_or_default()
    }

    pub fn assert_invariants(&self, ctx: &mut Context) -> ModuleResult<()> {
        let Some(registry) = self.invariants.get() else {
            return Ok(());
        };
        registry.assert_all(ctx)?;
        debug!(height = ctx.height(), checked = registry.len(), "[crisis] invariants hold");
        Ok(())
    }

    /// Charge the constant fee, then check one invariant.
    pub fn verify_invariant(&self, ctx: &mut Context, msg: &MsgVerifyInvariant) -> ModuleResult<()> {
        let fee = self.params(ctx)?.constant_fee;
        self.supply
            .send_coins_from_account_to_module(ctx, msg.sender, names::FEE_COLLECTOR, &fee)?;

        let registry = self
            .invariants
            .get()
            .ok_or_else(|| ModuleError::custom(names::CRISIS, 2, "no invariants registered"))?;
        let found = registry.check(ctx, &msg.module, &msg.route)?;
        if !found {
            return Err(ModuleError::custom(
                names::CRISIS,
                2,
                format!("unknown invariant {}/{}", msg.module, msg.route),
            ));
        }
        ctx.emit(
            Event::new("invariant")
                .attr("route", format!("{}/{}", msg.module, msg.route))
                .attr("sender", msg.sender),
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisGenesis {
    #[serde(default)]
    pub params: CrisisParams,
}

pub struct CrisisModule {
    keeper: Arc<CrisisKeeper>,
}

impl CrisisModule {
    pub fn new(keeper: Arc<CrisisKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for CrisisModule {
    fn name(&self) -> &'static str {
        names::CRISIS
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::CRISIS, &CrisisGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        decode_genesis::<CrisisGenesis>(names::CRISIS, genesis).map(|_| ())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: CrisisGenesis = decode_genesis(names::CRISIS, genesis)?;
        self.keeper.subspace.set_params(ctx, &genesis.params)?;
        self.keeper.assert_invariants(ctx)?;
        info!(
            invariants = self.keeper.invariant_routes().len(),
            "[crisis] genesis invariants hold"
        );
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = CrisisGenesis {
            params: self.keeper.params(ctx)?,
        };
        encode_genesis(names::CRISIS, &genesis)
    }

    fn has_end_blocker(&self) -> bool {
        true
    }

    fn end_block(&self, ctx: &mut Context, _req: &RequestEndBlock) -> ModuleResult<Vec<ValidatorUpdate>> {
        let period = self.keeper.inv_check_period;
        if period != 0 && ctx.height() % period == 0 {
            self.keeper.assert_invariants(ctx)?;
        }
        Ok(Vec::new())
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::CRISIS)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::VerifyInvariant(m) => self.keeper.verify_invariant(ctx, m),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::CRISIS)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path {
            "invariants" => to_json(&self.keeper.invariant_routes()),
            "params" => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("crisis/{path}"))),
        }
    }
}
