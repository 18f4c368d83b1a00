//! # ABCI Types
//!
//! Requests from and responses to the consensus engine.

use crate::entities::{hex_bytes, BlockHeader, Event, Hash, ValidatorUpdate, VoteInfo};
use serde::{Deserialize, Serialize};

/// ABCI code of a successful transaction.
pub const CODE_OK: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInitChain {
    pub chain_id: String,
    pub time: u64,
    /// Validator set declared by the consensus engine. Empty means "take the
    /// application's".
    pub validators: Vec<ValidatorUpdate>,
    #[serde(with = "hex_bytes")]
    pub app_state_bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseInitChain {
    pub validators: Vec<ValidatorUpdate>,
    pub app_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RequestBeginBlock {
    pub header: BlockHeader,
    pub last_commit_votes: Vec<VoteInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseBeginBlock {
    pub events: Vec<Event>,
}

/// Result of DeliverTx and CheckTx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseDeliverTx {
    pub code: u32,
    pub codespace: String,
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub events: Vec<Event>,
}

impl ResponseDeliverTx {
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    pub fn error(codespace: &str, code: u32, log: impl Into<String>, gas_wanted: u64, gas_used: u64) -> Self {
        Self {
            code,
            codespace: codespace.to_string(),
            log: log.into(),
            gas_wanted,
            gas_used,
            events: Vec::new(),
        }
    }
}

pub type ResponseCheckTx = ResponseDeliverTx;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RequestEndBlock {
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseEndBlock {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseCommit {
    /// Application state hash after the commit.
    pub data: Hash,
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RequestQuery {
    /// `"<module>/<endpoint>"`.
    pub path: String,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResponseQuery {
    pub code: u32,
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    pub log: String,
    pub height: u64,
}
