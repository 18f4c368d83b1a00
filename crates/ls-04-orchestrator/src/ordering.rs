//! Per-phase module orderings and the checks run against them.

use crate::errors::{ManagerError, ManagerResult};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    InitGenesis,
    BeginBlock,
    EndBlock,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::InitGenesis, Phase::BeginBlock, Phase::EndBlock];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::InitGenesis => "InitGenesis",
            Phase::BeginBlock => "BeginBlock",
            Phase::EndBlock => "EndBlock",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The declared order of each lifecycle phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOrdering {
    pub init_genesis: Vec<&'static str>,
    pub begin_block: Vec<&'static str>,
    pub end_block: Vec<&'static str>,
}

impl ModuleOrdering {
    pub fn phase(&self, phase: Phase) -> &[&'static str] {
        match phase {
            Phase::InitGenesis => &self.init_genesis,
            Phase::BeginBlock => &self.begin_block,
            Phase::EndBlock => &self.end_block,
        }
    }

    /// Position of `module` within `phase`.
    pub fn position(&self, phase: Phase, module: &str) -> Option<usize> {
        self.phase(phase).iter().position(|m| *m == module)
    }

    /// Reject repeated names and names outside `known`.
    pub(crate) fn check_names(&self, known: &HashSet<&'static str>) -> ManagerResult<()> {
        for phase in Phase::ALL {
            let mut seen = HashSet::new();
            for module in self.phase(phase) {
                if !known.contains(module) {
                    return Err(ManagerError::UnknownModule {
                        phase,
                        module: module.to_string(),
                    });
                }
                if !seen.insert(*module) {
                    return Err(ManagerError::DuplicateInOrder {
                        phase,
                        module: module.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// "`before` must run before `after` in `phase`", with the reason it matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingConstraint {
    pub phase: Phase,
    pub before: &'static str,
    pub after: &'static str,
    pub reason: &'static str,
}

impl OrderingConstraint {
    pub const fn new(
        phase: Phase,
        before: &'static str,
        after: &'static str,
        reason: &'static str,
    ) -> Self {
        Self {
            phase,
            before,
            after,
            reason,
        }
    }

    /// Both modules must be present in the phase and in the stated order.
    pub fn check(&self, ordering: &ModuleOrdering) -> ManagerResult<()> {
        let before = ordering.position(self.phase, self.before);
        let after = ordering.position(self.phase, self.after);
        match (before, after) {
            (Some(b), Some(a)) if b < a => Ok(()),
            _ => Err(ManagerError::ConstraintViolated {
                phase: self.phase,
                before: self.before.to_string(),
                after: self.after.to_string(),
                reason: self.reason.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordering() -> ModuleOrdering {
        ModuleOrdering {
            init_genesis: vec!["distribution", "staking", "bank"],
            begin_block: vec!["mint", "distribution", "slashing"],
            end_block: vec!["gov", "staking"],
        }
    }

    #[test]
    fn test_constraint_holds() {
        let c = OrderingConstraint::new(
            Phase::BeginBlock,
            "distribution",
            "slashing",
            "slashed validators forfeit this block's reward",
        );
        assert!(c.check(&ordering()).is_ok());
    }

    #[test]
    fn test_constraint_violated_when_reversed_or_absent() {
        let reversed = OrderingConstraint::new(Phase::EndBlock, "staking", "gov", "r");
        assert!(matches!(
            reversed.check(&ordering()),
            Err(ManagerError::ConstraintViolated { .. })
        ));
        let absent = OrderingConstraint::new(Phase::EndBlock, "crisis", "staking", "r");
        assert!(absent.check(&ordering()).is_err());
    }

    #[test]
    fn test_check_names() {
        let known: HashSet<&'static str> =
            ["distribution", "staking", "bank", "mint", "slashing", "gov"]
                .into_iter()
                .collect();
        assert!(ordering().check_names(&known).is_ok());

        let mut dup = ordering();
        dup.end_block.push("gov");
        assert!(matches!(
            dup.check_names(&known),
            Err(ManagerError::DuplicateInOrder { phase: Phase::EndBlock, .. })
        ));

        let mut unknown = ordering();
        unknown.begin_block.push("upgrade");
        assert!(matches!(
            unknown.check_names(&known),
            Err(ManagerError::UnknownModule { .. })
        ));
    }
}
