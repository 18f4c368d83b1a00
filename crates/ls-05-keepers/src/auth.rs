//! # Auth
//!
//! Accounts (number, sequence, public key) and module accounts.
//!
//! ```text
//! acc/<address>           -> Account
//! global_account_number   -> u64
//! ```
//!
//! Module accounts live at `Address::module(name)` and may only be created for
//! names listed in the application's `ModuleAccountPermissions`.

use crate::codec::{address_key, decode_genesis, encode_genesis, parse_address, to_json};
use crate::params::{ParamSet, Subspace};
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, Address, PubKey, ValidatorUpdate};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

const ACCOUNT_PREFIX: &str = "acc";
const GLOBAL_ACCOUNT_NUMBER: &[u8] = b"global_account_number";

// =============================================================================
// MODULE ACCOUNT PERMISSIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Minter,
    Burner,
    Staking,
}

/// Which modules may hold a module account and what each may do with the
/// token supply. Fixed when the application is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleAccountPermissions(BTreeMap<String, BTreeSet<Permission>>);

impl ModuleAccountPermissions {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Permission>)>,
        S: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(name, perms)| (name.into(), perms.into_iter().collect()))
                .collect(),
        )
    }

    pub fn contains(&self, module: &str) -> bool {
        self.0.contains_key(module)
    }

    pub fn permissions(&self, module: &str) -> Option<&BTreeSet<Permission>> {
        self.0.get(module)
    }

    pub fn has(&self, module: &str, permission: Permission) -> bool {
        self.0
            .get(module)
            .is_some_and(|perms| perms.contains(&permission))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<Permission>)> {
        self.0.iter().map(|(name, perms)| (name.as_str(), perms))
    }

    /// Address of every module account.
    pub fn addresses(&self) -> BTreeSet<Address> {
        self.0.keys().map(|name| Address::module(name)).collect()
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAccountInfo {
    pub name: String,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    #[serde(default)]
    pub pub_key: Option<PubKey>,
    pub account_number: u64,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleAccountInfo>,
}

impl Account {
    pub fn is_module(&self) -> bool {
        self.module.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub max_memo_characters: u64,
    pub tx_sig_limit: u64,
    pub tx_size_cost_per_byte: u64,
    pub sig_verify_cost_ed25519: u64,
}

impl Default for AuthParams {
    fn default() -> Self {
        Self {
            max_memo_characters: 256,
            tx_sig_limit: 7,
            tx_size_cost_per_byte: 10,
            sig_verify_cost_ed25519: 590,
        }
    }
}

impl ParamSet for AuthParams {
    fn validate(&self) -> Result<(), String> {
        if self.max_memo_characters == 0 || self.tx_sig_limit == 0 {
            return Err("memo and signature limits must be positive".into());
        }
        Ok(())
    }
}

pub struct AuthKeeper {
    key: StoreKey,
    subspace: Subspace,
    permissions: Arc<ModuleAccountPermissions>,
}

impl AuthKeeper {
    pub fn new(key: StoreKey, subspace: Subspace, permissions: Arc<ModuleAccountPermissions>) -> Self {
        Self {
            key,
            subspace,
            permissions,
        }
    }

    pub fn permissions(&self) -> &Arc<ModuleAccountPermissions> {
        &self.permissions
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<AuthParams> {
        self.subspace.get_params(ctx)
    }

    pub fn account(&self, ctx: &mut Context, address: &Address) -> ModuleResult<Option<Account>> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&address_key(ACCOUNT_PREFIX, address))?)
    }

    pub fn has_account(&self, ctx: &mut Context, address: &Address) -> ModuleResult<bool> {
        Ok(ctx.kv(&self.key)?.has(&address_key(ACCOUNT_PREFIX, address))?)
    }

    pub fn set_account(&self, ctx: &mut Context, account: &Account) -> ModuleResult<()> {
        ctx.kv(&self.key)?
            .set_json(&address_key(ACCOUNT_PREFIX, &account.address), account)?;
        Ok(())
    }

    fn next_account_number(&self, ctx: &mut Context) -> ModuleResult<u64> {
        let mut kv = ctx.kv(&self.key)?;
        let number: u64 = kv.get_json(GLOBAL_ACCOUNT_NUMBER)?.unwrap_or(0);
        kv.set_json(GLOBAL_ACCOUNT_NUMBER, &(number + 1))?;
        Ok(number)
    }

    /// Create and store a fresh account at `address`.
    pub fn new_account(&self, ctx: &mut Context, address: Address) -> ModuleResult<Account> {
        let account = Account {
            address,
            pub_key: None,
            account_number: self.next_account_number(ctx)?,
            sequence: 0,
            module: None,
        };
        self.set_account(ctx, &account)?;
        debug!(%address, number = account.account_number, "[auth] account created");
        Ok(account)
    }

    pub fn get_or_create_account(&self, ctx: &mut Context, address: Address) -> ModuleResult<Account> {
        match self.account(ctx, &address)? {
            Some(account) => Ok(account),
            None => self.new_account(ctx, address),
        }
    }

    /// The module account of `name`, created on first use.
    pub fn module_account(&self, ctx: &mut Context, name: &str) -> ModuleResult<Account> {
        let Some(perms) = self.permissions.permissions(name) else {
            return Err(ModuleError::UnknownAddress(format!("no module account for {name}")));
        };
        let address = Address::module(name);
        if let Some(account) = self.account(ctx, &address)? {
            return Ok(account);
        }
        let account = Account {
            address,
            pub_key: None,
            account_number: self.next_account_number(ctx)?,
            sequence: 0,
            module: Some(ModuleAccountInfo {
                name: name.to_string(),
                permissions: perms.iter().copied().collect(),
            }),
        };
        self.set_account(ctx, &account)?;
        debug!(module = name, %address, "[auth] module account created");
        Ok(account)
    }

    pub fn accounts(&self, ctx: &mut Context) -> ModuleResult<Vec<Account>> {
        let prefix = format!("{ACCOUNT_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<Account>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, account)| account)
            .collect())
    }
}

// =============================================================================
// MODULE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGenesis {
    #[serde(default)]
    pub params: AuthParams,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

pub struct AuthModule {
    keeper: Arc<AuthKeeper>,
}

impl AuthModule {
    pub fn new(keeper: Arc<AuthKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for AuthModule {
    fn name(&self) -> &'static str {
        names::AUTH
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::AUTH, &AuthGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: AuthGenesis = decode_genesis(names::AUTH, genesis)?;
        genesis.params.validate().map_err(ModuleError::InvalidGenesis)?;
        let mut seen = BTreeSet::new();
        for account in &genesis.accounts {
            if !seen.insert(account.address) {
                return Err(ModuleError::InvalidGenesis(format!(
                    "duplicate account {}",
                    account.address
                )));
            }
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: AuthGenesis = decode_genesis(names::AUTH, genesis)?;
        self.keeper.subspace.set_params(ctx, &genesis.params)?;
        let mut next: u64 = ctx
            .kv(&self.keeper.key)?
            .get_json(GLOBAL_ACCOUNT_NUMBER)?
            .unwrap_or(0);
        for account in &genesis.accounts {
            self.keeper.set_account(ctx, account)?;
            next = next.max(account.account_number + 1);
        }
        ctx.kv(&self.keeper.key)?.set_json(GLOBAL_ACCOUNT_NUMBER, &next)?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = AuthGenesis {
            params: self.keeper.params(ctx)?,
            accounts: self.keeper.accounts(ctx)?,
        };
        encode_genesis(names::AUTH, &genesis)
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::AUTH)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path.split_once('/') {
            Some(("account", address)) => {
                let address = parse_address(address)?;
                let account = self
                    .keeper
                    .account(ctx, &address)?
                    .ok_or_else(|| ModuleError::UnknownAddress(address.to_string()))?;
                to_json(&account)
            }
            None if path == "params" => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("auth/{path}"))),
        }
    }
}
