//! # AppModule
//!
//! The uniform contract the manager drives. A module implements only the
//! hooks it needs; the defaults do nothing.
//!
//! All calls receive the execution `Context` of the phase. Anything a module
//! keeps between calls lives in its store partitions, never in the module
//! value itself.

use crate::errors::{ModuleError, ModuleResult};
use crate::invariants::InvariantRegistry;
use ls_01_store::Context;
use serde_json::Value;
use shared_types::{Msg, RequestBeginBlock, RequestEndBlock, ValidatorUpdate};

pub trait AppModule: Send + Sync {
    /// Unique module name. Also the key of its genesis entry.
    fn name(&self) -> &'static str;

    /// Genesis used when the genesis document has no entry for this module.
    fn default_genesis(&self) -> Value {
        Value::Null
    }

    /// Stateless validation of this module's genesis entry.
    fn validate_genesis(&self, _genesis: &Value) -> ModuleResult<()> {
        Ok(())
    }

    /// Load genesis state. May return the initial validator set; at most one
    /// module per application does.
    fn init_genesis(&self, _ctx: &mut Context, _genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        Ok(Vec::new())
    }

    fn export_genesis(&self, _ctx: &mut Context) -> ModuleResult<Value> {
        Ok(self.default_genesis())
    }

    fn has_begin_blocker(&self) -> bool {
        false
    }

    fn begin_block(&self, _ctx: &mut Context, _req: &RequestBeginBlock) -> ModuleResult<()> {
        Ok(())
    }

    fn has_end_blocker(&self) -> bool {
        false
    }

    /// Returns this module's validator-set delta for the block, if any.
    fn end_block(&self, _ctx: &mut Context, _req: &RequestEndBlock) -> ModuleResult<Vec<ValidatorUpdate>> {
        Ok(Vec::new())
    }

    /// Message route served by `handle_msg`.
    fn route(&self) -> Option<&'static str> {
        None
    }

    fn handle_msg(&self, _ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        Err(ModuleError::UnknownRoute(msg.route().to_string()))
    }

    /// Query route served by `query`.
    fn query_route(&self) -> Option<&'static str> {
        None
    }

    /// Answer `path` (the part after the route) with JSON bytes.
    fn query(&self, _ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        Err(ModuleError::UnknownRoute(format!("{}/{path}", self.name())))
    }

    fn register_invariants(&self, _registry: &mut InvariantRegistry) {}
}
