//! # Module Manager
//!
//! Holds the registered modules and the declared phase orderings. Built once
//! at application construction; the orderings never change afterwards.

use crate::errors::{ManagerError, ManagerResult, ModuleError};
use crate::invariants::InvariantRegistry;
use crate::module::AppModule;
use crate::ordering::{ModuleOrdering, OrderingConstraint, Phase};
use crate::router::{MsgRouter, QueryRouter};
use ls_01_store::Context;
use shared_types::{
    GenesisState, RequestBeginBlock, RequestEndBlock, ResponseBeginBlock, ResponseEndBlock,
    ValidatorUpdate,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ModuleManager {
    modules: BTreeMap<&'static str, Arc<dyn AppModule>>,
    /// Names in registration order.
    registered: Vec<&'static str>,
    ordering: ModuleOrdering,
}

impl ModuleManager {
    /// Register `modules` and check `ordering` against them and against every
    /// constraint.
    pub fn new(
        modules: Vec<Arc<dyn AppModule>>,
        ordering: ModuleOrdering,
        constraints: &[OrderingConstraint],
    ) -> ManagerResult<Self> {
        let mut map = BTreeMap::new();
        let mut registered = Vec::with_capacity(modules.len());
        for module in modules {
            let name = module.name();
            if map.insert(name, module).is_some() {
                return Err(ManagerError::DuplicateModule(name.to_string()));
            }
            registered.push(name);
        }

        let known: HashSet<&'static str> = registered.iter().copied().collect();
        ordering.check_names(&known)?;

        for name in &registered {
            let module = &map[name];
            let required = [
                (Phase::InitGenesis, true),
                (Phase::BeginBlock, module.has_begin_blocker()),
                (Phase::EndBlock, module.has_end_blocker()),
            ];
            for (phase, needed) in required {
                if needed && ordering.position(phase, name).is_none() {
                    return Err(ManagerError::MissingFromOrder {
                        phase,
                        module: name.to_string(),
                    });
                }
            }
        }

        for constraint in constraints {
            constraint.check(&ordering)?;
        }

        info!(
            modules = registered.len(),
            constraints = constraints.len(),
            "[manager] module orderings verified"
        );
        Ok(Self {
            modules: map,
            registered,
            ordering,
        })
    }

    pub fn ordering(&self) -> &ModuleOrdering {
        &self.ordering
    }

    pub fn module_names(&self) -> &[&'static str] {
        &self.registered
    }

    pub fn module(&self, name: &str) -> Option<&Arc<dyn AppModule>> {
        self.modules.get(name)
    }

    fn ordered(&self, phase: Phase) -> impl Iterator<Item = (&'static str, &Arc<dyn AppModule>)> + '_ {
        self.ordering
            .phase(phase)
            .iter()
            .filter_map(move |name| self.modules.get(name).map(|m| (*name, m)))
    }

    fn failed(module: &str, phase: Phase, source: ModuleError) -> ManagerError {
        ManagerError::ModuleFailed {
            module: module.to_string(),
            phase,
            source,
        }
    }

    /// A module's genesis entry; absent or null entries take the default.
    fn entry(genesis: &GenesisState, name: &str, module: &Arc<dyn AppModule>) -> serde_json::Value {
        match genesis.get(name) {
            Some(value) if !value.is_null() => value.clone(),
            _ => module.default_genesis(),
        }
    }

    /// Stateless check of every module's genesis entry.
    pub fn validate_genesis(&self, genesis: &GenesisState) -> ManagerResult<()> {
        for (name, module) in self.ordered(Phase::InitGenesis) {
            let entry = Self::entry(genesis, name, module);
            module
                .validate_genesis(&entry)
                .map_err(|e| Self::failed(name, Phase::InitGenesis, e))?;
        }
        Ok(())
    }

    /// Run every module's genesis initializer in order. Returns the initial
    /// validator set; only one module may produce it.
    pub fn init_genesis(
        &self,
        ctx: &mut Context,
        genesis: &GenesisState,
    ) -> ManagerResult<Vec<ValidatorUpdate>> {
        self.validate_genesis(genesis)?;

        let mut validators: Option<(&'static str, Vec<ValidatorUpdate>)> = None;
        for (name, module) in self.ordered(Phase::InitGenesis) {
            let entry = Self::entry(genesis, name, module);
            debug!(module = name, "[manager] init genesis");
            let updates = module
                .init_genesis(ctx, &entry)
                .map_err(|e| Self::failed(name, Phase::InitGenesis, e))?;
            if updates.is_empty() {
                continue;
            }
            if let Some((first, _)) = &validators {
                return Err(ManagerError::MultipleValidatorSets {
                    first: first.to_string(),
                    second: name.to_string(),
                });
            }
            validators = Some((name, updates));
        }

        let updates = validators.map(|(_, v)| v).unwrap_or_default();
        info!(validators = updates.len(), "[manager] genesis initialized");
        Ok(updates)
    }

    /// Every module's state, keyed by module name.
    pub fn export_genesis(&self, ctx: &mut Context) -> ManagerResult<GenesisState> {
        let mut genesis = GenesisState::new();
        for (name, module) in self.ordered(Phase::InitGenesis) {
            let value = module
                .export_genesis(ctx)
                .map_err(|e| Self::failed(name, Phase::InitGenesis, e))?;
            genesis.insert(name.to_string(), value);
        }
        Ok(genesis)
    }

    pub fn begin_block(
        &self,
        ctx: &mut Context,
        req: &RequestBeginBlock,
    ) -> ManagerResult<ResponseBeginBlock> {
        for (name, module) in self.ordered(Phase::BeginBlock) {
            debug!(module = name, height = req.header.height, "[manager] begin block");
            module
                .begin_block(ctx, req)
                .map_err(|e| Self::failed(name, Phase::BeginBlock, e))?;
        }
        Ok(ResponseBeginBlock {
            events: ctx.take_events(),
        })
    }

    /// The validator-set delta of the block is the one returned by the last
    /// module that returned a non-empty delta.
    pub fn end_block(
        &self,
        ctx: &mut Context,
        req: &RequestEndBlock,
    ) -> ManagerResult<ResponseEndBlock> {
        let mut validator_updates = Vec::new();
        for (name, module) in self.ordered(Phase::EndBlock) {
            debug!(module = name, height = req.height, "[manager] end block");
            let updates = module
                .end_block(ctx, req)
                .map_err(|e| Self::failed(name, Phase::EndBlock, e))?;
            if !updates.is_empty() {
                validator_updates = updates;
            }
        }
        Ok(ResponseEndBlock {
            validator_updates,
            events: ctx.take_events(),
        })
    }

    pub fn register_routes(&self, msgs: &mut MsgRouter, queries: &mut QueryRouter) -> ManagerResult<()> {
        for name in &self.registered {
            let module = &self.modules[name];
            if let Some(route) = module.route() {
                msgs.add_route(route, Arc::clone(module))?;
            }
            if let Some(route) = module.query_route() {
                queries.add_route(route, Arc::clone(module))?;
            }
        }
        Ok(())
    }

    pub fn register_invariants(&self, registry: &mut InvariantRegistry) {
        for name in &self.registered {
            self.modules[name].register_invariants(registry);
        }
        info!(invariants = registry.len(), "[manager] invariants registered");
    }
}
