//! JSON helpers shared by the module wrappers.

use ls_04_orchestrator::{ModuleError, ModuleResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared_types::Address;

pub fn decode_genesis<T: DeserializeOwned>(module: &str, genesis: &Value) -> ModuleResult<T> {
    serde_json::from_value(genesis.clone())
        .map_err(|e| ModuleError::InvalidGenesis(format!("{module}: {e}")))
}

pub fn encode_genesis<T: Serialize>(module: &str, genesis: &T) -> ModuleResult<Value> {
    serde_json::to_value(genesis).map_err(|e| ModuleError::InvalidGenesis(format!("{module}: {e}")))
}

/// Encode a query response.
pub fn to_json<T: Serialize>(value: &T) -> ModuleResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| ModuleError::InvalidRequest(e.to_string()))
}

/// Parse the address segment of a query path.
pub fn parse_address(segment: &str) -> ModuleResult<Address> {
    segment.parse::<Address>().map_err(ModuleError::from)
}

/// `<prefix>/<hex address>`.
pub fn address_key(prefix: &str, address: &Address) -> Vec<u8> {
    format!("{prefix}/{address}").into_bytes()
}

/// `<prefix>/<020-padded number>`, ordered numerically.
pub fn index_key(prefix: &str, index: u64) -> Vec<u8> {
    format!("{prefix}/{index:020}").into_bytes()
}
