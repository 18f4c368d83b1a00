//! # Invariant Registry
//!
//! Named state checks, registered by modules as `module/route`. An invariant
//! returns `Some(message)` when it is broken.

use crate::errors::{ModuleError, ModuleResult};
use lockstep_telemetry::INVARIANT_CHECKS;
use ls_01_store::{Context, GasMeter};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

pub type Invariant = Arc<dyn Fn(&mut Context) -> ModuleResult<Option<String>> + Send + Sync>;

/// Wrap a closure as an `Invariant`.
pub fn invariant<F>(check: F) -> Invariant
where
    F: Fn(&mut Context) -> ModuleResult<Option<String>> + Send + Sync + 'static,
{
    Arc::new(check)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant {module}/{route} broken: {message}")]
pub struct InvariantViolation {
    pub module: String,
    pub route: String,
    pub message: String,
}

impl From<InvariantViolation> for ModuleError {
    fn from(v: InvariantViolation) -> Self {
        ModuleError::InvariantBroken(v.to_string())
    }
}

struct Entry {
    module: &'static str,
    route: &'static str,
    check: Invariant,
}

#[derive(Default)]
pub struct InvariantRegistry {
    entries: Vec<Entry>,
}

impl InvariantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: &'static str, route: &'static str, check: Invariant) {
        debug!(module, route, "[invariants] registered");
        self.entries.push(Entry {
            module,
            route,
            check,
        });
    }

    /// `module/route` of every registered invariant, in registration order.
    pub fn routes(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{}/{}", e.module, e.route))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate one invariant. `Ok(false)` means no such route exists.
    pub fn check(
        &self,
        ctx: &mut Context,
        module: &str,
        route: &str,
    ) -> Result<bool, InvariantViolation> {
        let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.module == module && e.route == route)
        else {
            return Ok(false);
        };
        Self::evaluate(entry, ctx)?;
        Ok(true)
    }

    /// Evaluate every invariant; the first broken one is returned.
    pub fn assert_all(&self, ctx: &mut Context) -> Result<(), InvariantViolation> {
        for entry in &self.entries {
            Self::evaluate(entry, ctx)?;
        }
        Ok(())
    }

    fn evaluate(entry: &Entry, ctx: &mut Context) -> Result<(), InvariantViolation> {
        INVARIANT_CHECKS.inc();
        // Invariants read the state without spending the caller's gas.
        let mut scratch = ctx.branch();
        scratch.set_gas_meter(GasMeter::infinite());
        let outcome = (entry.check)(&mut scratch)
            .unwrap_or_else(|e| Some(format!("evaluation failed: {e}")));
        match outcome {
            None => Ok(()),
            Some(message) => {
                error!(
                    module = entry.module,
                    route = entry.route,
                    %message,
                    "[invariants] broken"
                );
                Err(InvariantViolation {
                    module: entry.module.to_string(),
                    route: entry.route.to_string(),
                    message,
                })
            }
        }
    }
}
