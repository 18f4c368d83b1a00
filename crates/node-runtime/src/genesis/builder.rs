//! # Genesis Document Builder
//!
//! Creates, validates and loads the genesis document the chain starts from.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ls_05_keepers::bank::{Balance, BankGenesis};
use ls_05_keepers::genutil::GenutilGenesis;
use ls_05_keepers::staking::StakingParams;
use shared_crypto::{sign_tx, Ed25519KeyPair, SignerInfo};
use shared_types::{
    names, Address, Coin, Coins, Fee, GenesisState, Msg, MsgCreateValidator, RequestInitChain, Tx,
};

/// Genesis creation errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// Genesis file could not be read or written.
    #[error("Genesis file {path}: {reason}")]
    Io { path: String, reason: String },

    /// Genesis document is not valid JSON of the expected shape.
    #[error("Malformed genesis document: {0}")]
    Parse(String),

    /// Invalid genesis configuration.
    #[error("Invalid genesis configuration: {0}")]
    InvalidConfig(String),

    /// A genesis transaction could not be signed.
    #[error("Failed to sign genesis transaction: {0}")]
    Signing(String),
}

/// The genesis document: chain identity plus every module's initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    /// Unix seconds.
    pub genesis_time: u64,
    #[serde(default)]
    pub app_state: GenesisState,
}

impl GenesisDoc {
    pub fn from_json(bytes: &[u8]) -> Result<Self, GenesisError> {
        let doc: GenesisDoc =
            serde_json::from_slice(bytes).map_err(|e| GenesisError::Parse(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, GenesisError> {
        serde_json::to_vec_pretty(self).map_err(|e| GenesisError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let bytes = std::fs::read(path).map_err(|e| GenesisError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&bytes)
    }

    pub fn save(&self, path: &Path) -> Result<(), GenesisError> {
        let bytes = self.to_json()?;
        std::fs::write(path, bytes).map_err(|e| GenesisError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.chain_id.trim().is_empty() {
            return Err(GenesisError::InvalidConfig("chain id must not be empty".into()));
        }
        Ok(())
    }

    /// The InitChain request for this document. The validator set is left
    /// empty so the application's (from the gentxs) is adopted.
    pub fn init_chain_request(&self) -> Result<RequestInitChain, GenesisError> {
        let app_state_bytes =
            serde_json::to_vec(&self.app_state).map_err(|e| GenesisError::Parse(e.to_string()))?;
        Ok(RequestInitChain {
            chain_id: self.chain_id.clone(),
            time: self.genesis_time,
            validators: Vec::new(),
            app_state_bytes,
        })
    }
}

/// Assembles a genesis document from funded accounts and signed gentxs.
///
/// Balances and gentxs land in the bank and genutil entries; every other
/// module starts from its default genesis unless `module_state` overrides it.
pub struct GenesisBuilder {
    chain_id: String,
    genesis_time: Option<u64>,
    bond_denom: String,
    balances: Vec<Balance>,
    gen_txs: Vec<Tx>,
    overrides: GenesisState,
}

impl GenesisBuilder {
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            genesis_time: None,
            bond_denom: StakingParams::default().bond_denom,
            balances: Vec::new(),
            gen_txs: Vec::new(),
            overrides: GenesisState::new(),
        }
    }

    /// Single funded validator, the layout the devnet binary starts from.
    pub fn devnet(chain_id: &str, validator: &Ed25519KeyPair) -> Result<GenesisDoc, GenesisError> {
        const DEVNET_BALANCE: u128 = 1_000_000_000_000;
        const DEVNET_STAKE: u128 = 100_000_000;

        let denom = StakingParams::default().bond_denom;
        Self::new(chain_id)
            .fund(validator.address(), Coins::single(&denom, DEVNET_BALANCE))
            .validator(validator, "devnet-validator", DEVNET_STAKE)?
            .build()
    }

    /// Genesis timestamp in Unix seconds. Defaults to the current time.
    pub fn genesis_time(mut self, time: u64) -> Self {
        self.genesis_time = Some(time);
        self
    }

    pub fn fund(mut self, address: Address, coins: Coins) -> Self {
        self.balances.push(Balance { address, coins });
        self
    }

    /// Replace a module's genesis entry.
    pub fn module_state(mut self, module: &str, state: serde_json::Value) -> Self {
        self.overrides.insert(module.to_string(), state);
        self
    }

    /// Add a gentx creating a validator operated by `key`, which also serves
    /// as its consensus key. The operator must be funded separately.
    pub fn validator(
        mut self,
        key: &Ed25519KeyPair,
        moniker: &str,
        self_delegation: u128,
    ) -> Result<Self, GenesisError> {
        let mut tx = Tx {
            msgs: vec![Msg::CreateValidator(MsgCreateValidator {
                operator: key.address(),
                pubkey: key.pub_key(),
                moniker: moniker.to_string(),
                self_delegation: Coin::new(&self.bond_denom, self_delegation),
            })],
            fee: Fee {
                amount: Coins::new(),
                gas_limit: 0,
            },
            memo: String::new(),
            timeout_height: 0,
            signatures: Vec::new(),
        };
        // Gentxs are signed with account number 0: accounts are numbered
        // while genesis runs, after the gentx was created.
        sign_tx(
            &mut tx,
            &self.chain_id,
            &[SignerInfo {
                key,
                account_number: 0,
                sequence: 0,
            }],
        )
        .map_err(|e| GenesisError::Signing(e.to_string()))?;
        self.gen_txs.push(tx);
        Ok(self)
    }

    pub fn build(self) -> Result<GenesisDoc, GenesisError> {
        self.validate()?;

        let mut app_state = GenesisState::new();
        let bank = BankGenesis {
            balances: self.balances,
            ..Default::default()
        };
        app_state.insert(names::BANK.to_string(), to_value(&bank)?);
        let genutil = GenutilGenesis {
            gen_txs: self.gen_txs,
        };
        app_state.insert(names::GENUTIL.to_string(), to_value(&genutil)?);
        app_state.extend(self.overrides);

        let doc = GenesisDoc {
            chain_id: self.chain_id,
            genesis_time: self.genesis_time.unwrap_or_else(unix_now),
            app_state,
        };
        doc.validate()?;
        Ok(doc)
    }

    /// Every gentx operator must hold its self-delegation.
    fn validate(&self) -> Result<(), GenesisError> {
        for tx in &self.gen_txs {
            for msg in &tx.msgs {
                let Msg::CreateValidator(create) = msg else {
                    continue;
                };
                let funded: u128 = self
                    .balances
                    .iter()
                    .filter(|b| b.address == create.operator)
                    .map(|b| b.coins.amount_of(&create.self_delegation.denom))
                    .sum();
                if funded < create.self_delegation.amount {
                    return Err(GenesisError::InvalidConfig(format!(
                        "validator {} self-delegates {} but is funded with {}",
                        create.operator, create.self_delegation.amount, funded
                    )));
                }
            }
        }
        Ok(())
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, GenesisError> {
    serde_json::to_value(value).map_err(|e| GenesisError::Parse(e.to_string()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
