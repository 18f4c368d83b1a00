use crate::ordering::Phase;
use ls_01_store::StoreError;
use shared_types::TypesError;
use thiserror::Error;

pub type ModuleResult<T> = Result<T, ModuleError>;
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Codespace of errors that are not specific to one module.
pub const SDK_CODESPACE: &str = "sdk";

/// Error returned by a module handler, hook or lifecycle call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Types(#[from] TypesError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    #[error("No handler registered for route {0}")]
    UnknownRoute(String),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    /// A module-specific failure with its own codespace.
    #[error("{codespace}: {message}")]
    Custom {
        codespace: &'static str,
        code: u32,
        message: String,
    },

    #[error("Upgrade {name} needed at height {height}")]
    UpgradeNeeded { name: String, height: u64 },

    #[error("Invariant broken: {0}")]
    InvariantBroken(String),

    #[error("External engine failed: {0}")]
    Engine(String),
}

impl ModuleError {
    pub fn custom(codespace: &'static str, code: u32, message: impl Into<String>) -> Self {
        ModuleError::Custom {
            codespace,
            code,
            message: message.into(),
        }
    }

    /// Errors after which the node must stop processing blocks.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ModuleError::UpgradeNeeded { .. }
                | ModuleError::InvariantBroken(_)
                | ModuleError::Engine(_)
        )
    }

    pub fn is_out_of_gas(&self) -> bool {
        matches!(self, ModuleError::Store(StoreError::OutOfGas { .. }))
    }

    pub fn codespace(&self) -> &'static str {
        match self {
            ModuleError::Custom { codespace, .. } => codespace,
            ModuleError::UpgradeNeeded { .. } => "upgrade",
            ModuleError::InvariantBroken(_) => "crisis",
            ModuleError::Engine(_) => "vmbridge",
            _ => SDK_CODESPACE,
        }
    }

    /// Stable ABCI code within `codespace()`.
    pub fn code(&self) -> u32 {
        match self {
            ModuleError::Store(StoreError::OutOfGas { .. }) => 11,
            ModuleError::Store(_) => 1,
            ModuleError::Types(TypesError::InvalidAddress(_)) => 7,
            ModuleError::Types(TypesError::InvalidCoins(_)) => 10,
            ModuleError::Types(TypesError::InsufficientCoins { .. }) => 5,
            ModuleError::Types(TypesError::Encoding(_)) => 2,
            ModuleError::Types(_) => 18,
            ModuleError::InvalidRequest(_) => 18,
            ModuleError::Unauthorized(_) => 4,
            ModuleError::InsufficientFunds(_) => 5,
            ModuleError::UnknownAddress(_) => 9,
            ModuleError::UnknownRoute(_) => 6,
            ModuleError::InvalidGenesis(_) => 18,
            ModuleError::Custom { code, .. } => *code,
            ModuleError::UpgradeNeeded { .. } => 1,
            ModuleError::InvariantBroken(_) => 1,
            ModuleError::Engine(_) => 1,
        }
    }
}

/// Error raised while building or driving the module manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    #[error("Module {0} registered twice")]
    DuplicateModule(String),

    #[error("{phase} order names unknown module {module}")]
    UnknownModule { phase: Phase, module: String },

    #[error("{phase} order lists {module} more than once")]
    DuplicateInOrder { phase: Phase, module: String },

    #[error("Module {module} is missing from the {phase} order")]
    MissingFromOrder { phase: Phase, module: String },

    #[error("{phase} order must run {before} before {after}: {reason}")]
    ConstraintViolated {
        phase: Phase,
        before: String,
        after: String,
        reason: String,
    },

    #[error("Route {0} is registered by more than one module")]
    DuplicateRoute(String),

    #[error("Module {module} failed in {phase}: {source}")]
    ModuleFailed {
        module: String,
        phase: Phase,
        #[source]
        source: ModuleError,
    },

    #[error("Both {first} and {second} returned a genesis validator set")]
    MultipleValidatorSets { first: String, second: String },
}

impl ManagerError {
    /// The module error behind a failed phase, if any.
    pub fn module_error(&self) -> Option<&ModuleError> {
        match self {
            ManagerError::ModuleFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ModuleError::InvariantBroken("bank/total-supply".into()).is_fatal());
        assert!(ModuleError::Engine("timeout".into()).is_fatal());
        assert!(ModuleError::UpgradeNeeded {
            name: "v2".into(),
            height: 10
        }
        .is_fatal());
        assert!(!ModuleError::InsufficientFunds("1ubld".into()).is_fatal());
    }

    #[test]
    fn test_codes_are_stable() {
        let oog = ModuleError::Store(StoreError::OutOfGas {
            descriptor: "WriteFlat".into(),
            limit: 10,
            consumed: 20,
        });
        assert_eq!(oog.code(), 11);
        assert!(oog.is_out_of_gas());
        assert_eq!(ModuleError::UnknownRoute("x".into()).code(), 6);

        let custom = ModuleError::custom("staking", 3, "validator exists");
        assert_eq!(custom.codespace(), "staking");
        assert_eq!(custom.code(), 3);
    }
}
