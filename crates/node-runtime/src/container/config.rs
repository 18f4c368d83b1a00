//! # Application Configuration
//!
//! Node-local settings of the application root. None of these are part of
//! consensus state except through their effect on block processing
//! (`halt_height`, `skip_upgrade_heights`, `inv_check_period`), so every node
//! of a network is expected to run with the same values for those.
//!
//! ## Environment
//!
//! | Variable                  | Field                          |
//! |---------------------------|--------------------------------|
//! | `LS_CHAIN_ID`             | `chain.chain_id`               |
//! | `LS_INV_CHECK_PERIOD`     | `chain.inv_check_period`       |
//! | `LS_HALT_HEIGHT`          | `chain.halt_height`            |
//! | `LS_SKIP_UPGRADE_HEIGHTS` | `chain.skip_upgrade_heights`   |
//! | `LS_MIN_GAS_PRICES`       | `mempool.min_gas_prices`       |
//! | `LS_HOME`                 | `storage.home`                 |
//! | `LS_GENESIS_FILE`         | `storage.genesis_file`         |
//! | `LS_BLOCK_INTERVAL_MS`    | `blocks.interval_ms`           |

use ls_06_ante::MinGasPrices;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var}={value} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("chain id must not be empty")]
    EmptyChainId,

    #[error("block interval must be at least 1ms")]
    ZeroBlockInterval,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Chain identity and block-processing switches.
    pub chain: ChainConfig,
    /// Local mempool admission.
    pub mempool: MempoolConfig,
    /// Where committed state and the genesis document live.
    pub storage: StorageConfig,
    /// Block production of the devnet binary.
    pub blocks: BlockConfig,
}

impl AppConfig {
    /// Defaults overridden by any `LS_*` variable that is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(chain_id) = lookup("LS_CHAIN_ID") {
            config.chain.chain_id = chain_id;
        }
        if let Some(value) = lookup("LS_INV_CHECK_PERIOD") {
            config.chain.inv_check_period = parse("LS_INV_CHECK_PERIOD", &value)?;
        }
        if let Some(value) = lookup("LS_HALT_HEIGHT") {
            config.chain.halt_height = parse("LS_HALT_HEIGHT", &value)?;
        }
        if let Some(value) = lookup("LS_SKIP_UPGRADE_HEIGHTS") {
            config.chain.skip_upgrade_heights = value
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(|h| parse("LS_SKIP_UPGRADE_HEIGHTS", h))
                .collect::<Result<_, _>>()?;
        }
        if let Some(value) = lookup("LS_MIN_GAS_PRICES") {
            config.mempool.min_gas_prices = parse("LS_MIN_GAS_PRICES", &value)?;
        }
        if let Some(home) = lookup("LS_HOME") {
            config.storage.home = Some(PathBuf::from(home));
        }
        if let Some(file) = lookup("LS_GENESIS_FILE") {
            config.storage.genesis_file = Some(PathBuf::from(file));
        }
        if let Some(value) = lookup("LS_BLOCK_INTERVAL_MS") {
            config.blocks.interval_ms = parse("LS_BLOCK_INTERVAL_MS", &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.chain_id.trim().is_empty() {
            return Err(ConfigError::EmptyChainId);
        }
        if self.blocks.interval_ms == 0 {
            return Err(ConfigError::ZeroBlockInterval);
        }
        Ok(())
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Chain identity and block-processing switches.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Chain id expected in every block header and signed by every tx.
    pub chain_id: String,
    /// Assert all registered invariants every this many blocks. 0 disables
    /// the periodic check.
    pub inv_check_period: u64,
    /// Stop after committing this height. 0 disables.
    pub halt_height: u64,
    /// Heights at which a scheduled upgrade is skipped instead of halting.
    pub skip_upgrade_heights: BTreeSet<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: "lockstep-devnet".to_string(),
            inv_check_period: 0,
            halt_height: 0,
            skip_upgrade_heights: BTreeSet::new(),
        }
    }
}

/// Local mempool admission.
#[derive(Debug, Clone, Default)]
pub struct MempoolConfig {
    /// Minimum gas prices checked in CheckTx. Empty accepts any fee.
    pub min_gas_prices: MinGasPrices,
}

/// Where committed state and the genesis document live.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Data directory for committed versions. `None` keeps state in memory.
    pub home: Option<PathBuf>,
    /// Genesis document. `None` makes the binary generate a devnet genesis.
    pub genesis_file: Option<PathBuf>,
}

/// Block production of the devnet binary.
#[derive(Debug, Clone)]
pub struct BlockConfig {
    /// Milliseconds between blocks.
    pub interval_ms: u64,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self { interval_ms: 1_000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain.chain_id, "lockstep-devnet");
        assert_eq!(config.chain.halt_height, 0);
        assert!(config.mempool.min_gas_prices.is_empty());
        assert!(config.storage.home.is_none());
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LS_CHAIN_ID", "lockstep-1"),
            ("LS_INV_CHECK_PERIOD", "5"),
            ("LS_HALT_HEIGHT", "100"),
            ("LS_SKIP_UPGRADE_HEIGHTS", "10, 20"),
            ("LS_MIN_GAS_PRICES", "0.025ubld"),
            ("LS_HOME", "/tmp/lockstep"),
        ]))
        .unwrap();

        assert_eq!(config.chain.chain_id, "lockstep-1");
        assert_eq!(config.chain.inv_check_period, 5);
        assert_eq!(config.chain.halt_height, 100);
        assert_eq!(
            config.chain.skip_upgrade_heights,
            BTreeSet::from([10, 20])
        );
        assert_eq!(config.mempool.min_gas_prices.to_string(), "0.025ubld");
        assert_eq!(config.storage.home, Some(PathBuf::from("/tmp/lockstep")));
    }

    #[test]
    fn test_malformed_number_names_the_variable() {
        let err = AppConfig::from_lookup(lookup(&[("LS_HALT_HEIGHT", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "LS_HALT_HEIGHT", .. }));
    }

    #[test]
    fn test_empty_chain_id_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("LS_CHAIN_ID", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::EmptyChainId);
    }

    #[test]
    fn test_zero_block_interval_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("LS_BLOCK_INTERVAL_MS", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroBlockInterval);
    }
}
