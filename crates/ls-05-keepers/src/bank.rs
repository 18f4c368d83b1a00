//! # Bank
//!
//! Account balances and plain transfers. Module accounts are blocked as
//! `MsgSend` recipients; funds reach them only through the supply keeper.
//!
//! ```text
//! bal/<address>  -> Coins
//! ```

use crate::auth::AuthKeeper;
use crate::codec::{address_key, decode_genesis, encode_genesis, parse_address, to_json};
use crate::params::{ParamSet, Subspace};
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, Address, Coins, Event, Msg, MsgSend, ValidatorUpdate};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

const BALANCE_PREFIX: &str = "bal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankParams {
    pub send_enabled: bool,
}

impl Default for BankParams {
    fn default() -> Self {
        Self { send_enabled: true }
    }
}

impl ParamSet for BankParams {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub address: Address,
    pub coins: Coins,
}

pub struct BankKeeper {
    key: StoreKey,
    subspace: Subspace,
    auth: Arc<AuthKeeper>,
    blocked: BTreeSet<Address>,
}

impl BankKeeper {
    pub fn new(
        key: StoreKey,
        subspace: Subspace,
        auth: Arc<AuthKeeper>,
        blocked: BTreeSet<Address>,
    ) -> Self {
        Self {
            key,
            subspace,
            auth,
            blocked,
        }
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<BankParams> {
        self.subspace.get_params(ctx)
    }

    /// True if `address` may not receive funds through `MsgSend`.
    pub fn is_blocked(&self, address: &Address) -> bool {
        self.blocked.contains(address)
    }

    pub fn balance(&self, ctx: &mut Context, address: &Address) -> ModuleResult<Coins> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&address_key(BALANCE_PREFIX, address))?
            .unwrap_or_default())
    }

    pub fn set_balance(&self, ctx: &mut Context, address: &Address, coins: &Coins) -> ModuleResult<()> {
        let mut kv = ctx.kv(&self.key)?;
        let key = address_key(BALANCE_PREFIX, address);
        if coins.is_zero() {
            kv.delete(&key)?;
        } else {
            kv.set_json(&key, coins)?;
        }
        Ok(())
    }

    pub fn all_balances(&self, ctx: &mut Context) -> ModuleResult<Vec<Balance>> {
        let prefix = format!("{BALANCE_PREFIX}/");
        let entries = ctx
            .kv(&self.key)?
            .prefix_iter_json::<Coins>(prefix.as_bytes())?;
        entries
            .into_iter()
            .map(|(key, coins)| {
                let hex = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
                Ok(Balance {
                    address: parse_address(&hex)?,
                    coins,
                })
            })
            .collect()
    }

    /// Sum of every balance.
    pub fn total_balances(&self, ctx: &mut Context) -> ModuleResult<Coins> {
        let mut total = Coins::new();
        for balance in self.all_balances(ctx)? {
            total = total.checked_add(&balance.coins)?;
        }
        Ok(total)
    }

    pub fn add_coins(&self, ctx: &mut Context, address: Address, amount: &Coins) -> ModuleResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.auth.get_or_create_account(ctx, address)?;
        let balance = self.balance(ctx, &address)?.checked_add(amount)?;
        self.set_balance(ctx, &address, &balance)
    }

    pub fn subtract_coins(&self, ctx: &mut Context, address: Address, amount: &Coins) -> ModuleResult<()> {
        let balance = self.balance(ctx, &address)?;
        let remaining = balance.checked_sub(amount).map_err(|_| {
            ModuleError::InsufficientFunds(format!("{address} has {balance}, needs {amount}"))
        })?;
        self.set_balance(ctx, &address, &remaining)
    }

    pub fn send_coins(
        &self,
        ctx: &mut Context,
        from: Address,
        to: Address,
        amount: &Coins,
    ) -> ModuleResult<()> {
        self.subtract_coins(ctx, from, amount)?;
        self.add_coins(ctx, to, amount)?;
        ctx.emit(
            Event::new("transfer")
                .attr("sender", from)
                .attr("recipient", to)
                .attr("amount", amount),
        );
        debug!(%from, %to, %amount, "[bank] sent");
        Ok(())
    }

    fn handle_send(&self, ctx: &mut Context, msg: &MsgSend) -> ModuleResult<()> {
        if !self.params(ctx)?.send_enabled {
            return Err(ModuleError::custom(names::BANK, 8, "transfers are disabled"));
        }
        if self.is_blocked(&msg.to) {
            return Err(ModuleError::Unauthorized(format!(
                "{} is not allowed to receive funds",
                msg.to
            )));
        }
        self.send_coins(ctx, msg.from, msg.to, &msg.amount)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankGenesis {
    #[serde(default)]
    pub params: BankParams,
    #[serde(default)]
    pub balances: Vec<Balance>,
}

pub struct BankModule {
    keeper: Arc<BankKeeper>,
}

impl BankModule {
    pub fn new(keeper: Arc<BankKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for BankModule {
    fn name(&self) -> &'static str {
        names::BANK
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::BANK, &BankGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: BankGenesis = decode_genesis(names::BANK, genesis)?;
        let mut seen = BTreeSet::new();
        for balance in &genesis.balances {
            if !seen.insert(balance.address) {
                return Err(ModuleError::InvalidGenesis(format!(
                    "duplicate balance for {}",
                    balance.address
                )));
            }
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: BankGenesis = decode_genesis(names::BANK, genesis)?;
        self.keeper.subspace.set_params(ctx, &genesis.params)?;
        for balance in &genesis.balances {
            self.keeper.add_coins(ctx, balance.address, &balance.coins)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = BankGenesis {
            params: self.keeper.params(ctx)?,
            balances: self.keeper.all_balances(ctx)?,
        };
        encode_genesis(names::BANK, &genesis)
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::BANK)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::Send(send) => self.keeper.handle_send(ctx, send),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::BANK)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path.split_once('/') {
            Some(("balances", address)) => {
                let address = parse_address(address)?;
                to_json(&self.keeper.balance(ctx, &address)?)
            }
            None if path == "params" => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("bank/{path}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, coins, TestKeepers};

    #[test]
    fn test_send_moves_funds_and_emits_event() {
        let (k, mut ctx) = TestKeepers::new();
        k.bank.add_coins(&mut ctx, addr(1), &coins(100)).unwrap();
        let module = BankModule::new(Arc::clone(&k.bank));
        let msg = Msg::Send(MsgSend {
            from: addr(1),
            to: addr(2),
            amount: coins(30),
        });
        module.handle_msg(&mut ctx, &msg).unwrap();
        assert_eq!(k.bank.balance(&mut ctx, &addr(1)).unwrap(), coins(70));
        assert_eq!(k.bank.balance(&mut ctx, &addr(2)).unwrap(), coins(30));
        assert!(k.auth.has_account(&mut ctx, &addr(2)).unwrap());
        assert_eq!(ctx.events().last().unwrap().kind, "transfer");
    }

    #[test]
    fn test_insufficient_funds() {
        let (k, mut ctx) = TestKeepers::new();
        k.bank.add_coins(&mut ctx, addr(1), &coins(5)).unwrap();
        assert!(matches!(
            k.bank.send_coins(&mut ctx, addr(1), addr(2), &coins(6)),
            Err(ModuleError::InsufficientFunds(_))
        ));
        assert_eq!(k.bank.balance(&mut ctx, &addr(1)).unwrap(), coins(5));
    }

    #[test]
    fn test_module_accounts_are_blocked_recipients() {
        let (k, mut ctx) = TestKeepers::new();
        k.bank.add_coins(&mut ctx, addr(1), &coins(5)).unwrap();
        let module = BankModule::new(Arc::clone(&k.bank));
        let msg = Msg::Send(MsgSend {
            from: addr(1),
            to: Address::module(names::BONDED_POOL),
            amount: coins(5),
        });
        assert!(matches!(
            module.handle_msg(&mut ctx, &msg),
            Err(ModuleError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_zero_balances_are_removed() {
        let (k, mut ctx) = TestKeepers::new();
        k.bank.add_coins(&mut ctx, addr(3), &coins(5)).unwrap();
        k.bank.subtract_coins(&mut ctx, addr(3), &coins(5)).unwrap();
        assert!(k.bank.all_balances(&mut ctx).unwrap().is_empty());
    }
}
