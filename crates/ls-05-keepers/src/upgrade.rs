//! # Upgrade
//!
//! Coordinated software upgrades. A passed `SoftwareUpgrade` proposal
//! schedules a `Plan`; when the chain reaches the plan height, BeginBlock
//! either runs the migration registered for the plan name or stops the node
//! with `ModuleError::UpgradeNeeded` so the operator can swap binaries.
//! Heights listed in `skip_upgrade_heights` drop their plan instead.

use crate::codec::to_json;
use crate::gov::ProposalHandler;
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{names, Event, Plan, ProposalContent, RequestBeginBlock, ValidatorUpdate};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, warn};

const PLAN_KEY: &[u8] = b"plan";
const DONE_PREFIX: &str = "done";

/// Migration run at the plan height by a binary that knows the plan.
pub type UpgradeHandler = Arc<dyn Fn(&mut Context, &Plan) -> ModuleResult<()> + Send + Sync>;

pub struct UpgradeKeeper {
    key: StoreKey,
    skip_heights: BTreeSet<u64>,
    handlers: RwLock<BTreeMap<String, UpgradeHandler>>,
}

impl UpgradeKeeper {
    pub fn new(key: StoreKey, skip_heights: BTreeSet<u64>) -> Self {
        Self {
            key,
            skip_heights,
            handlers: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn set_upgrade_handler(&self, name: &str, handler: UpgradeHandler) {
        self.handlers.write().insert(name.to_string(), handler);
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn plan(&self, ctx: &mut Context) -> ModuleResult<Option<Plan>> {
        Ok(ctx.kv(&self.key)?.get_json(PLAN_KEY)?)
    }

    fn done_key(name: &str) -> Vec<u8> {
        format!("{DONE_PREFIX}/{name}").into_bytes()
    }

    /// Height at which the plan `name` was applied.
    pub fn done_height(&self, ctx: &mut Context, name: &str) -> ModuleResult<Option<u64>> {
        Ok(ctx.kv(&self.key)?.get_json(&Self::done_key(name))?)
    }

    /// Replace any pending plan with `plan`.
    pub fn schedule_upgrade(&self, ctx: &mut Context, plan: &Plan) -> ModuleResult<()> {
        if plan.height <= ctx.height() {
            return Err(ModuleError::InvalidRequest(format!(
                "upgrade height {} is not in the future",
                plan.height
            )));
        }
        if self.done_height(ctx, &plan.name)?.is_some() {
            return Err(ModuleError::InvalidRequest(format!(
                "upgrade {} has already been applied",
                plan.name
            )));
        }
        ctx.kv(&self.key)?.set_json(PLAN_KEY, plan)?;
        info!(name = %plan.name, height = plan.height, "[upgrade] plan scheduled");
        Ok(())
    }

    pub fn clear_plan(&self, ctx: &mut Context) -> ModuleResult<()> {
        ctx.kv(&self.key)?.delete(PLAN_KEY)?;
        Ok(())
    }

    pub fn begin_blocker(&self, ctx: &mut Context) -> ModuleResult<()> {
        let Some(plan) = self.plan(ctx)? else {
            return Ok(());
        };
        if ctx.height() < plan.height {
            return Ok(());
        }
        if self.skip_heights.contains(&plan.height) {
            warn!(name = %plan.name, height = plan.height, "[upgrade] skipping scheduled upgrade");
            return self.clear_plan(ctx);
        }
        let handler = self.handlers.read().get(&plan.name).cloned();
        let Some(handler) = handler else {
            error!(
                name = %plan.name,
                height = plan.height,
                info = %plan.info,
                "[upgrade] UPGRADE NEEDED, halting"
            );
            return Err(ModuleError::UpgradeNeeded {
                name: plan.name,
                height: plan.height,
            });
        };
        handler(ctx, &plan)?;
        let height = ctx.height();
        ctx.kv(&self.key)?
            .set_json(&Self::done_key(&plan.name), &height)?;
        self.clear_plan(ctx)?;
        ctx.emit(
            Event::new("upgrade")
                .attr("name", &plan.name)
                .attr("height", plan.height),
        );
        info!(name = %plan.name, height, "[upgrade] applied");
        Ok(())
    }
}

impl ProposalHandler for UpgradeKeeper {
    fn handle(&self, ctx: &mut Context, content: &ProposalContent) -> ModuleResult<()> {
        match content {
            ProposalContent::SoftwareUpgrade { plan, .. } => self.schedule_upgrade(ctx, plan),
            ProposalContent::CancelSoftwareUpgrade { .. } => self.clear_plan(ctx),
            _ => Err(ModuleError::InvalidRequest(
                "upgrade handler only executes upgrade proposals".into(),
            )),
        }
    }
}

pub struct UpgradeModule {
    keeper: Arc<UpgradeKeeper>,
}

impl UpgradeModule {
    pub fn new(keeper: Arc<UpgradeKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for UpgradeModule {
    fn name(&self) -> &'static str {
        names::UPGRADE
    }

    fn default_genesis(&self) -> Value {
        Value::Object(Default::default())
    }

    fn has_begin_blocker(&self) -> bool {
        true
    }

    fn begin_block(&self, ctx: &mut Context, _req: &RequestBeginBlock) -> ModuleResult<()> {
        self.keeper.begin_blocker(ctx)
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::UPGRADE)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path.split_once('/') {
            Some(("applied", name)) => to_json(&self.keeper.done_height(ctx, name)?),
            None if path == "plan" => to_json(&self.keeper.plan(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("upgrade/{path}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, registry};

    fn keeper(skip: &[u64]) -> UpgradeKeeper {
        UpgradeKeeper::new(
            registry().key(names::UPGRADE).unwrap(),
            skip.iter().copied().collect(),
        )
    }

    fn plan(height: u64) -> Plan {
        Plan {
            name: "v2".into(),
            height,
            info: String::new(),
        }
    }

    fn at_height(ctx: &mut Context, height: u64) {
        let mut header = ctx.header().clone();
        header.height = height;
        ctx.set_header(header);
    }

    #[test]
    fn test_halts_at_plan_height_without_handler() {
        let keeper = keeper(&[]);
        let mut ctx = context();
        keeper.schedule_upgrade(&mut ctx, &plan(5)).unwrap();

        at_height(&mut ctx, 4);
        keeper.begin_blocker(&mut ctx).unwrap();

        at_height(&mut ctx, 5);
        let err = keeper.begin_blocker(&mut ctx).unwrap_err();
        assert_eq!(
            err,
            ModuleError::UpgradeNeeded {
                name: "v2".into(),
                height: 5
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_handler_applies_plan() {
        let keeper = keeper(&[]);
        let mut ctx = context();
        keeper.set_upgrade_handler(
            "v2",
            Arc::new(|ctx: &mut Context, _plan: &Plan| {
                ctx.emit(Event::new("migrated"));
                Ok(())
            }),
        );
        keeper.schedule_upgrade(&mut ctx, &plan(5)).unwrap();
        at_height(&mut ctx, 5);
        keeper.begin_blocker(&mut ctx).unwrap();

        assert_eq!(keeper.plan(&mut ctx).unwrap(), None);
        assert_eq!(keeper.done_height(&mut ctx, "v2").unwrap(), Some(5));
        assert!(ctx.events().iter().any(|e| e.kind == "migrated"));
        // A plan cannot be applied twice.
        assert!(keeper.schedule_upgrade(&mut ctx, &plan(9)).is_err());
    }

    #[test]
    fn test_skip_height_drops_plan() {
        let keeper = keeper(&[5]);
        let mut ctx = context();
        keeper.schedule_upgrade(&mut ctx, &plan(5)).unwrap();
        at_height(&mut ctx, 5);
        keeper.begin_blocker(&mut ctx).unwrap();
        assert_eq!(keeper.plan(&mut ctx).unwrap(), None);
    }

    #[test]
    fn test_proposals_schedule_and_cancel() {
        let keeper = keeper(&[]);
        let mut ctx = context();
        let schedule = ProposalContent::SoftwareUpgrade {
            title: "v2".into(),
            description: "upgrade".into(),
            plan: plan(10),
        };
        keeper.handle(&mut ctx, &schedule).unwrap();
        assert_eq!(keeper.plan(&mut ctx).unwrap(), Some(plan(10)));

        let cancel = ProposalContent::CancelSoftwareUpgrade {
            title: "stop".into(),
            description: "cancel".into(),
        };
        keeper.handle(&mut ctx, &cancel).unwrap();
        assert_eq!(keeper.plan(&mut ctx).unwrap(), None);

        // Height 1 is the current height of the test context.
        assert!(keeper.schedule_upgrade(&mut ctx, &plan(1)).is_err());
    }
}
