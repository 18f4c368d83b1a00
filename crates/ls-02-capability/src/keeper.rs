//! Capability keeper and per-module scoped keepers.
//!
//! Storage layout in the capability partition:
//!
//! ```text
//! index                      -> next capability index (u64)
//! owners/<index:020>         -> [CapabilityOwner]
//! rev/<module>/<name>        -> index
//! ```

use crate::errors::{CapabilityError, CapabilityResult};
use ls_01_store::{Context, StoreKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

const INDEX_KEY: &[u8] = b"index";

fn owners_key(index: u64) -> Vec<u8> {
    format!("owners/{index:020}").into_bytes()
}

fn rev_key(module: &str, name: &str) -> Vec<u8> {
    format!("rev/{module}/{name}").into_bytes()
}

/// An unforgeable handle to a resource. Only this crate can create one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability {
    index: u64,
}

impl Capability {
    pub fn index(&self) -> u64 {
        self.index
    }
}

/// One `(module, name)` binding of a capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityOwner {
    pub module: String,
    pub name: String,
}

#[derive(Debug, Default)]
struct Scopes {
    modules: BTreeSet<String>,
    sealed: bool,
}

pub struct CapabilityKeeper {
    key: StoreKey,
    scopes: RwLock<Scopes>,
}

impl CapabilityKeeper {
    pub fn new(key: StoreKey) -> Arc<Self> {
        Arc::new(Self {
            key,
            scopes: RwLock::new(Scopes::default()),
        })
    }

    /// Create the scoped keeper for `module`. Each module can be scoped once,
    /// and only before the keeper is sealed.
    pub fn scope_to_module(
        self: &Arc<Self>,
        module: &str,
    ) -> CapabilityResult<ScopedCapabilityKeeper> {
        if module.trim().is_empty() {
            return Err(CapabilityError::EmptyModuleName);
        }
        let mut scopes = self.scopes.write();
        if scopes.sealed {
            return Err(CapabilityError::Sealed(module.to_string()));
        }
        if !scopes.modules.insert(module.to_string()) {
            return Err(CapabilityError::DuplicateScope(module.to_string()));
        }
        debug!(module, "[capability] scoped module");
        Ok(ScopedCapabilityKeeper {
            key: self.key.clone(),
            module: module.to_string(),
        })
    }

    /// Forbid further scoping. Called once wiring is complete.
    pub fn seal(&self) {
        let mut scopes = self.scopes.write();
        scopes.sealed = true;
        info!(scopes = scopes.modules.len(), "[capability] sealed");
    }

    pub fn is_sealed(&self) -> bool {
        self.scopes.read().sealed
    }

    pub fn scoped_modules(&self) -> Vec<String> {
        self.scopes.read().modules.iter().cloned().collect()
    }
}

/// A module's view of the capability table. Every operation acts only on
/// entries owned by `module`.
#[derive(Debug, Clone)]
pub struct ScopedCapabilityKeeper {
    key: StoreKey,
    module: String,
}

impl ScopedCapabilityKeeper {
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Create a capability for `name`, owned by this scope.
    pub fn new_capability(&self, ctx: &mut Context, name: &str) -> CapabilityResult<Capability> {
        if name.is_empty() {
            return Err(CapabilityError::EmptyName);
        }
        let mut kv = ctx.kv(&self.key)?;
        let rev = rev_key(&self.module, name);
        if kv.has(&rev)? {
            return Err(CapabilityError::CapabilityTaken {
                module: self.module.clone(),
                name: name.to_string(),
            });
        }
        let index: u64 = kv.get_json(INDEX_KEY)?.unwrap_or(1);
        kv.set_json(INDEX_KEY, &(index + 1))?;
        let owners = vec![CapabilityOwner {
            module: self.module.clone(),
            name: name.to_string(),
        }];
        kv.set_json(&owners_key(index), &owners)?;
        kv.set_json(&rev, &index)?;
        debug!(module = %self.module, name, index, "[capability] created");
        Ok(Capability { index })
    }

    /// True only if this scope holds `cap` under exactly `name`.
    pub fn authenticate_capability(
        &self,
        ctx: &mut Context,
        cap: &Capability,
        name: &str,
    ) -> CapabilityResult<bool> {
        if name.is_empty() {
            return Ok(false);
        }
        let stored: Option<u64> = ctx.kv(&self.key)?.get_json(&rev_key(&self.module, name))?;
        Ok(stored == Some(cap.index))
    }

    /// The capability this scope holds under `name`, if any.
    pub fn lookup_capability(
        &self,
        ctx: &mut Context,
        name: &str,
    ) -> CapabilityResult<Option<Capability>> {
        if name.is_empty() {
            return Ok(None);
        }
        let stored: Option<u64> = ctx.kv(&self.key)?.get_json(&rev_key(&self.module, name))?;
        Ok(stored.map(|index| Capability { index }))
    }

    /// Become an additional owner of an existing capability under `name`.
    pub fn claim_capability(
        &self,
        ctx: &mut Context,
        cap: &Capability,
        name: &str,
    ) -> CapabilityResult<()> {
        if name.is_empty() {
            return Err(CapabilityError::EmptyName);
        }
        let mut kv = ctx.kv(&self.key)?;
        let mut owners: Vec<CapabilityOwner> = kv
            .get_json(&owners_key(cap.index))?
            .ok_or(CapabilityError::UnknownCapability(cap.index))?;
        if owners.iter().any(|o| o.module == self.module) {
            return Err(CapabilityError::AlreadyOwned {
                module: self.module.clone(),
                index: cap.index,
            });
        }
        let rev = rev_key(&self.module, name);
        if kv.has(&rev)? {
            return Err(CapabilityError::CapabilityTaken {
                module: self.module.clone(),
                name: name.to_string(),
            });
        }
        owners.push(CapabilityOwner {
            module: self.module.clone(),
            name: name.to_string(),
        });
        owners.sort();
        kv.set_json(&owners_key(cap.index), &owners)?;
        kv.set_json(&rev, &cap.index)?;
        debug!(module = %self.module, name, index = cap.index, "[capability] claimed");
        Ok(())
    }

    /// Drop this scope's ownership. The capability disappears with its last owner.
    pub fn release_capability(&self, ctx: &mut Context, cap: &Capability) -> CapabilityResult<()> {
        let mut kv = ctx.kv(&self.key)?;
        let mut owners: Vec<CapabilityOwner> = kv
            .get_json(&owners_key(cap.index))?
            .ok_or(CapabilityError::UnknownCapability(cap.index))?;
        let Some(pos) = owners.iter().position(|o| o.module == self.module) else {
            return Err(CapabilityError::NotOwner {
                module: self.module.clone(),
                index: cap.index,
            });
        };
        let released = owners.remove(pos);
        kv.delete(&rev_key(&self.module, &released.name))?;
        if owners.is_empty() {
            kv.delete(&owners_key(cap.index))?;
        } else {
            kv.set_json(&owners_key(cap.index), &owners)?;
        }
        debug!(module = %self.module, index = cap.index, "[capability] released");
        Ok(())
    }

    /// Every owner of the capability this scope holds under `name`.
    pub fn owners(
        &self,
        ctx: &mut Context,
        name: &str,
    ) -> CapabilityResult<Option<(Capability, Vec<CapabilityOwner>)>> {
        let Some(cap) = self.lookup_capability(ctx, name)? else {
            return Ok(None);
        };
        let owners: Vec<CapabilityOwner> = ctx
            .kv(&self.key)?
            .get_json(&owners_key(cap.index))?
            .unwrap_or_default();
        Ok(Some((cap, owners)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ls_01_store::{ExecMode, Snapshot, StateView, StoreKeyRegistry};
    use shared_types::BlockHeader;

    fn setup() -> (Arc<CapabilityKeeper>, Context) {
        let registry = Arc::new(StoreKeyRegistry::new(&["capability"], &[]).unwrap());
        let keeper = CapabilityKeeper::new(registry.key("capability").unwrap());
        let ctx = Context::new(
            BlockHeader::default(),
            ExecMode::Deliver,
            StateView::new(Arc::new(Snapshot::default())),
            registry,
        );
        (keeper, ctx)
    }

    #[test]
    fn test_capability_does_not_authenticate_in_other_scope() {
        let (keeper, mut ctx) = setup();
        let transfer = keeper.scope_to_module("transfer").unwrap();
        let vm = keeper.scope_to_module("vmbridge").unwrap();

        let cap = transfer.new_capability(&mut ctx, "ports/transfer").unwrap();
        assert!(transfer
            .authenticate_capability(&mut ctx, &cap, "ports/transfer")
            .unwrap());
        assert!(!vm.authenticate_capability(&mut ctx, &cap, "ports/transfer").unwrap());
        assert!(vm.lookup_capability(&mut ctx, "ports/transfer").unwrap().is_none());
    }

    #[test]
    fn test_same_name_in_two_scopes_yields_distinct_capabilities() {
        let (keeper, mut ctx) = setup();
        let a = keeper.scope_to_module("a").unwrap();
        let b = keeper.scope_to_module("b").unwrap();
        let cap_a = a.new_capability(&mut ctx, "res").unwrap();
        let cap_b = b.new_capability(&mut ctx, "res").unwrap();
        assert_ne!(cap_a, cap_b);
        assert!(!b.authenticate_capability(&mut ctx, &cap_a, "res").unwrap());
    }

    #[test]
    fn test_duplicate_name_in_scope_rejected() {
        let (keeper, mut ctx) = setup();
        let a = keeper.scope_to_module("a").unwrap();
        a.new_capability(&mut ctx, "res").unwrap();
        assert!(matches!(
            a.new_capability(&mut ctx, "res"),
            Err(CapabilityError::CapabilityTaken { .. })
        ));
    }

    #[test]
    fn test_claim_grants_second_owner() {
        let (keeper, mut ctx) = setup();
        let ibc = keeper.scope_to_module("ibc").unwrap();
        let transfer = keeper.scope_to_module("transfer").unwrap();
        let cap = ibc.new_capability(&mut ctx, "ports/transfer").unwrap();
        transfer
            .claim_capability(&mut ctx, &cap, "ports/transfer")
            .unwrap();
        assert!(transfer
            .authenticate_capability(&mut ctx, &cap, "ports/transfer")
            .unwrap());
        let (_, owners) = ibc.owners(&mut ctx, "ports/transfer").unwrap().unwrap();
        assert_eq!(owners.len(), 2);
        assert!(matches!(
            transfer.claim_capability(&mut ctx, &cap, "other"),
            Err(CapabilityError::AlreadyOwned { .. })
        ));
    }

    #[test]
    fn test_release_removes_ownership() {
        let (keeper, mut ctx) = setup();
        let a = keeper.scope_to_module("a").unwrap();
        let cap = a.new_capability(&mut ctx, "res").unwrap();
        a.release_capability(&mut ctx, &cap).unwrap();
        assert!(!a.authenticate_capability(&mut ctx, &cap, "res").unwrap());
        assert_eq!(
            a.release_capability(&mut ctx, &cap),
            Err(CapabilityError::UnknownCapability(cap.index()))
        );
    }

    #[test]
    fn test_scoping_rules() {
        let (keeper, _) = setup();
        keeper.scope_to_module("ibc").unwrap();
        assert_eq!(
            keeper.scope_to_module("ibc").unwrap_err(),
            CapabilityError::DuplicateScope("ibc".into())
        );
        keeper.seal();
        assert!(keeper.is_sealed());
        assert_eq!(
            keeper.scope_to_module("late").unwrap_err(),
            CapabilityError::Sealed("late".into())
        );
    }

    #[test]
    fn test_discarded_branch_forgets_capability() {
        let (keeper, mut ctx) = setup();
        let a = keeper.scope_to_module("a").unwrap();
        let mut branch = ctx.branch();
        a.new_capability(&mut branch, "res").unwrap();
        ctx.discard_branch(branch);
        assert!(a.lookup_capability(&mut ctx, "res").unwrap().is_none());
    }
}
