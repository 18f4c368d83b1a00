use ls_01_store::StoreError;
use thiserror::Error;

pub type CapabilityResult<T> = Result<T, CapabilityError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("Module name for a capability scope cannot be empty")]
    EmptyModuleName,

    #[error("Capability scope already created for module {0}")]
    DuplicateScope(String),

    #[error("Capability keeper is sealed; cannot scope module {0}")]
    Sealed(String),

    #[error("Capability name cannot be empty")]
    EmptyName,

    #[error("Capability {name} already exists in scope {module}")]
    CapabilityTaken { module: String, name: String },

    #[error("Capability {0} does not exist")]
    UnknownCapability(u64),

    #[error("Module {module} already owns capability {index}")]
    AlreadyOwned { module: String, index: u64 },

    #[error("Module {module} does not own capability {index}")]
    NotOwner { module: String, index: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}
