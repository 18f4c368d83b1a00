//! Module, store and module-account names.
//!
//! Message routes, store partitions and module accounts are all addressed by
//! these strings; they are part of the persisted state layout.

pub const AUTH: &str = "auth";
pub const BANK: &str = "bank";
pub const SUPPLY: &str = "supply";
pub const STAKING: &str = "staking";
pub const MINT: &str = "mint";
pub const DISTRIBUTION: &str = "distribution";
pub const SLASHING: &str = "slashing";
pub const GOV: &str = "gov";
pub const CRISIS: &str = "crisis";
pub const PARAMS: &str = "params";
pub const UPGRADE: &str = "upgrade";
pub const EVIDENCE: &str = "evidence";
pub const CAPABILITY: &str = "capability";
pub const IBC: &str = "ibc";
pub const TRANSFER: &str = "transfer";
pub const VM_BRIDGE: &str = "vmbridge";
pub const GENUTIL: &str = "genutil";

/// Main store partition (application metadata).
pub const MAIN_STORE: &str = "main";
/// Transient partition used to stage parameter changes within a block.
pub const TRANSIENT_PARAMS: &str = "transient_params";

/// Module account collecting transaction fees and block provisions.
pub const FEE_COLLECTOR: &str = "fee_collector";
/// Module account holding bonded stake.
pub const BONDED_POOL: &str = "bonded_tokens_pool";
/// Module account holding unbonded and unbonding stake.
pub const NOT_BONDED_POOL: &str = "not_bonded_tokens_pool";
