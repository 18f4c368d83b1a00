//! # Supply
//!
//! Total token supply and every movement of funds into, out of, or between
//! module accounts. `ModuleAccountPermissions` is checked here: only a Minter
//! may mint, only a Burner may burn, and staking-pool transfers require the
//! Staking permission.

use crate::auth::{AuthKeeper, ModuleAccountPermissions, Permission};
use crate::bank::BankKeeper;
use crate::codec::{decode_genesis, encode_genesis, to_json};
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{invariant, AppModule, InvariantRegistry, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, Address, Coins, Event, ValidatorUpdate};
use std::sync::Arc;
use tracing::{debug, info};

const SUPPLY_KEY: &[u8] = b"supply";

pub struct SupplyKeeper {
    key: StoreKey,
    auth: Arc<AuthKeeper>,
    bank: Arc<BankKeeper>,
    permissions: Arc<ModuleAccountPermissions>,
}

impl SupplyKeeper {
    pub fn new(
        key: StoreKey,
        auth: Arc<AuthKeeper>,
        bank: Arc<BankKeeper>,
        permissions: Arc<ModuleAccountPermissions>,
    ) -> Self {
        Self {
            key,
            auth,
            bank,
            permissions,
        }
    }

    pub fn supply(&self, ctx: &mut Context) -> ModuleResult<Coins> {
        Ok(ctx.kv(&self.key)?.get_json(SUPPLY_KEY)?.unwrap_or_default())
    }

    pub fn set_supply(&self, ctx: &mut Context, supply: &Coins) -> ModuleResult<()> {
        ctx.kv(&self.key)?.set_json(SUPPLY_KEY, supply)?;
        Ok(())
    }

    fn require(&self, module: &str, permission: Permission) -> ModuleResult<()> {
        if !self.permissions.has(module, permission) {
            return Err(ModuleError::Unauthorized(format!(
                "module account {module} lacks {permission:?} permission"
            )));
        }
        Ok(())
    }

    /// Address of `module`'s account, creating the account on first use.
    pub fn module_address(&self, ctx: &mut Context, module: &str) -> ModuleResult<Address> {
        Ok(self.auth.module_account(ctx, module)?.address)
    }

    pub fn module_balance(&self, ctx: &mut Context, module: &str) -> ModuleResult<Coins> {
        let address = self.module_address(ctx, module)?;
        self.bank.balance(ctx, &address)
    }

    pub fn mint_coins(&self, ctx: &mut Context, module: &str, amount: &Coins) -> ModuleResult<()> {
        self.require(module, Permission::Minter)?;
        let address = self.module_address(ctx, module)?;
        self.bank.add_coins(ctx, address, amount)?;
        let supply = self.supply(ctx)?.checked_add(amount)?;
        self.set_supply(ctx, &supply)?;
        ctx.emit(Event::new("mint").attr("module", module).attr("amount", amount));
        debug!(module, %amount, "[supply] minted");
        Ok(())
    }

    pub fn burn_coins(&self, ctx: &mut Context, module: &str, amount: &Coins) -> ModuleResult<()> {
        self.require(module, Permission::Burner)?;
        let address = self.module_address(ctx, module)?;
        self.bank.subtract_coins(ctx, address, amount)?;
        let supply = self.supply(ctx)?.checked_sub(amount)?;
        self.set_supply(ctx, &supply)?;
        ctx.emit(Event::new("burn").attr("module", module).attr("amount", amount));
        debug!(module, %amount, "[supply] burned");
        Ok(())
    }

    pub fn send_coins_from_module_to_account(
        &self,
        ctx: &mut Context,
        module: &str,
        recipient: Address,
        amount: &Coins,
    ) -> ModuleResult<()> {
        let sender = self.module_address(ctx, module)?;
        self.bank.send_coins(ctx, sender, recipient, amount)
    }

    pub fn send_coins_from_account_to_module(
        &self,
        ctx: &mut Context,
        sender: Address,
        module: &str,
        amount: &Coins,
    ) -> ModuleResult<()> {
        let recipient = self.module_address(ctx, module)?;
        self.bank.send_coins(ctx, sender, recipient, amount)
    }

    pub fn send_coins_from_module_to_module(
        &self,
        ctx: &mut Context,
        from: &str,
        to: &str,
        amount: &Coins,
    ) -> ModuleResult<()> {
        let sender = self.module_address(ctx, from)?;
        let recipient = self.module_address(ctx, to)?;
        self.bank.send_coins(ctx, sender, recipient, amount)
    }

    /// Bond stake: move `amount` from a delegator into a staking pool.
    pub fn delegate_coins_from_account_to_module(
        &self,
        ctx: &mut Context,
        delegator: Address,
        module: &str,
        amount: &Coins,
    ) -> ModuleResult<()> {
        self.require(module, Permission::Staking)?;
        self.send_coins_from_account_to_module(ctx, delegator, module, amount)
    }

    /// Return stake from a staking pool to a delegator.
    pub fn undelegate_coins_from_module_to_account(
        &self,
        ctx: &mut Context,
        module: &str,
        delegator: Address,
        amount: &Coins,
    ) -> ModuleResult<()> {
        self.require(module, Permission::Staking)?;
        self.send_coins_from_module_to_account(ctx, module, delegator, amount)
    }

    /// `None` when the recorded supply equals the sum of all balances.
    pub fn total_supply_violation(&self, ctx: &mut Context) -> ModuleResult<Option<String>> {
        let supply = self.supply(ctx)?;
        let balances = self.bank.total_balances(ctx)?;
        if supply == balances {
            return Ok(None);
        }
        Ok(Some(format!(
            "total supply {supply} does not match sum of balances {balances}"
        )))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyGenesis {
    /// Empty means "derive from genesis balances".
    #[serde(default)]
    pub supply: Coins,
}

pub struct SupplyModule {
    keeper: Arc<SupplyKeeper>,
}

impl SupplyModule {
    pub fn new(keeper: Arc<SupplyKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for SupplyModule {
    fn name(&self) -> &'static str {
        names::SUPPLY
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::SUPPLY, &SupplyGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        decode_genesis::<SupplyGenesis>(names::SUPPLY, genesis).map(|_| ())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: SupplyGenesis = decode_genesis(names::SUPPLY, genesis)?;
        let supply = if genesis.supply.is_zero() {
            self.keeper.bank.total_balances(ctx)?
        } else {
            genesis.supply
        };
        self.keeper.set_supply(ctx, &supply)?;
        info!(%supply, "[supply] genesis supply set");
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = SupplyGenesis {
            supply: self.keeper.supply(ctx)?,
        };
        encode_genesis(names::SUPPLY, &genesis)
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::SUPPLY)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path {
            "total" => to_json(&self.keeper.supply(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("supply/{path}"))),
        }
    }

    fn register_invariants(&self, registry: &mut InvariantRegistry) {
        let keeper = Arc::clone(&self.keeper);
        registry.register(
            names::SUPPLY,
            "total-supply",
            invariant(move |ctx| keeper.total_supply_violation(ctx)),
        );
    }
}
