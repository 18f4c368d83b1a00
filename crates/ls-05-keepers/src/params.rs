//! # Params
//!
//! Module parameters stored field by field under `<subspace>/<field>` in the
//! params partition. A change made during a block is also marked in the
//! transient params partition, which is cleared when the next block starts.
//!
//! Subspaces are declared once while the application is wired; the keeper is
//! immutable afterwards.

use crate::gov::ProposalHandler;
use ls_01_store::{Context, StoreKey, TransientStoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shared_types::{names, ParamChange, ProposalContent};
use std::collections::BTreeMap;
use tracing::info;

/// A module's parameter struct.
pub trait ParamSet: Serialize + DeserializeOwned + Default {
    /// Semantic checks beyond decoding.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn check_set<T: ParamSet>(value: &Value) -> Result<(), String> {
    let params: T = serde_json::from_value(value.clone()).map_err(|e| e.to_string())?;
    params.validate()
}

fn default_set<T: ParamSet>() -> Map<String, Value> {
    match serde_json::to_value(T::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn invalid(msg: impl Into<String>) -> ModuleError {
    ModuleError::InvalidRequest(msg.into())
}

/// One module's parameter namespace.
#[derive(Clone)]
pub struct Subspace {
    name: &'static str,
    key: StoreKey,
    tkey: TransientStoreKey,
    check: fn(&Value) -> Result<(), String>,
    defaults: fn() -> Map<String, Value>,
}

impl Subspace {
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn field_key(&self, field: &str) -> Vec<u8> {
        format!("{}/{}", self.name, field).into_bytes()
    }

    /// Defaults overlaid with every stored field.
    fn current(&self, ctx: &mut Context) -> ModuleResult<Map<String, Value>> {
        let mut map = (self.defaults)();
        let prefix = format!("{}/", self.name);
        for (k, v) in ctx.kv(&self.key)?.prefix_iter_json::<Value>(prefix.as_bytes())? {
            let field = String::from_utf8_lossy(&k[prefix.len()..]).into_owned();
            map.insert(field, v);
        }
        Ok(map)
    }

    pub fn get_params<T: ParamSet>(&self, ctx: &mut Context) -> ModuleResult<T> {
        let map = self.current(ctx)?;
        serde_json::from_value(Value::Object(map))
            .map_err(|e| invalid(format!("decoding {} params: {e}", self.name)))
    }

    pub fn set_params<T: ParamSet>(&self, ctx: &mut Context, params: &T) -> ModuleResult<()> {
        params.validate().map_err(invalid)?;
        let Ok(Value::Object(map)) = serde_json::to_value(params) else {
            return Err(invalid(format!("{} params must encode as an object", self.name)));
        };
        let mut kv = ctx.kv(&self.key)?;
        for (field, value) in map {
            kv.set_json(&self.field_key(&field), &value)?;
        }
        Ok(())
    }

    /// Replace one field with the JSON value `raw`. The resulting set must
    /// still decode and validate.
    pub fn update(&self, ctx: &mut Context, field: &str, raw: &str) -> ModuleResult<()> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| invalid(format!("{}/{field}: {e}", self.name)))?;
        let mut map = self.current(ctx)?;
        if !map.contains_key(field) {
            return Err(invalid(format!("unknown parameter {}/{field}", self.name)));
        }
        map.insert(field.to_string(), value.clone());
        (self.check)(&Value::Object(map)).map_err(|e| invalid(format!("{}/{field}: {e}", self.name)))?;

        ctx.kv(&self.key)?.set_json(&self.field_key(field), &value)?;
        ctx.transient(&self.tkey)?.set(&self.field_key(field), vec![1])?;
        info!(subspace = self.name, field, "[params] updated");
        Ok(())
    }

    /// True if `field` was changed during the current block.
    pub fn has_changed(&self, ctx: &mut Context, field: &str) -> ModuleResult<bool> {
        Ok(ctx.transient(&self.tkey)?.has(&self.field_key(field))?)
    }
}

pub struct ParamsKeeper {
    key: StoreKey,
    tkey: TransientStoreKey,
    subspaces: BTreeMap<&'static str, Subspace>,
}

impl ParamsKeeper {
    pub fn new(key: StoreKey, tkey: TransientStoreKey) -> Self {
        Self {
            key,
            tkey,
            subspaces: BTreeMap::new(),
        }
    }

    /// Declare the subspace of module `name` with parameter type `T`.
    pub fn add_subspace<T: ParamSet>(&mut self, name: &'static str) -> ModuleResult<Subspace> {
        if self.subspaces.contains_key(name) {
            return Err(invalid(format!("subspace {name} declared twice")));
        }
        let subspace = Subspace {
            name,
            key: self.key.clone(),
            tkey: self.tkey.clone(),
            check: check_set::<T>,
            defaults: default_set::<T>,
        };
        self.subspaces.insert(name, subspace.clone());
        Ok(subspace)
    }

    pub fn subspace(&self, name: &str) -> Option<&Subspace> {
        self.subspaces.get(name)
    }

    pub fn apply_change(&self, ctx: &mut Context, change: &ParamChange) -> ModuleResult<()> {
        let subspace = self
            .subspaces
            .get(change.subspace.as_str())
            .ok_or_else(|| invalid(format!("unknown subspace {}", change.subspace)))?;
        subspace.update(ctx, &change.key, &change.value)
    }
}

impl ProposalHandler for ParamsKeeper {
    fn handle(&self, ctx: &mut Context, content: &ProposalContent) -> ModuleResult<()> {
        let ProposalContent::ParameterChange { changes, .. } = content else {
            return Err(invalid("params handler only executes parameter changes"));
        };
        for change in changes {
            self.apply_change(ctx, change)?;
        }
        Ok(())
    }
}

/// The params module has no state of its own beyond the subspaces.
pub struct ParamsModule;

impl AppModule for ParamsModule {
    fn name(&self) -> &'static str {
        names::PARAMS
    }
}
