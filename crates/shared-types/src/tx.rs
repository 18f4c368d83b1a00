//! # Transactions
//!
//! A transaction carries one or more messages, a fee, and one signature per
//! signer. Each signature covers the canonical JSON encoding of a `SignDoc`,
//! which binds the chain id, the signer's account number and its sequence.

use crate::coins::Coins;
use crate::entities::{hex_bytes, sha256, Address, Hash, PubKey};
use crate::errors::TypesError;
use crate::msgs::Msg;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Fee {
    pub amount: Coins,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    /// Required the first time an account signs; optional afterwards.
    #[serde(default)]
    pub pub_key: Option<PubKey>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub msgs: Vec<Msg>,
    pub fee: Fee,
    #[serde(default)]
    pub memo: String,
    /// Last height at which the transaction may be included. 0 disables.
    #[serde(default)]
    pub timeout_height: u64,
    pub signatures: Vec<TxSignature>,
}

impl Tx {
    /// Unique signers in first-appearance order. The first signer pays the fee.
    pub fn signers(&self) -> Vec<Address> {
        let mut out: Vec<Address> = Vec::new();
        for signer in self.msgs.iter().flat_map(Msg::signers) {
            if !out.contains(&signer) {
                out.push(signer);
            }
        }
        out
    }

    pub fn fee_payer(&self) -> Option<Address> {
        self.signers().into_iter().next()
    }

    pub fn encode(&self) -> Result<Vec<u8>, TypesError> {
        serde_json::to_vec(self).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TypesError> {
        serde_json::from_slice(bytes).map_err(|e| TypesError::Encoding(e.to_string()))
    }

    /// The document a signer with `account_number` at `sequence` must sign.
    pub fn sign_doc(&self, chain_id: &str, account_number: u64, sequence: u64) -> SignDoc {
        SignDoc {
            chain_id: chain_id.to_string(),
            account_number,
            sequence,
            fee: self.fee.clone(),
            msgs: self.msgs.clone(),
            memo: self.memo.clone(),
            timeout_height: self.timeout_height,
        }
    }
}

/// Hash identifying raw transaction bytes.
pub fn tx_hash(bytes: &[u8]) -> Hash {
    sha256(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignDoc {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub fee: Fee,
    pub msgs: Vec<Msg>,
    pub memo: String,
    pub timeout_height: u64,
}

impl SignDoc {
    /// Canonical bytes: struct fields serialize in declaration order and
    /// `Coins` serialize sorted by denom.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, TypesError> {
        serde_json::to_vec(self).map_err(|e| TypesError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::{MsgSend, MsgUnjail};

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn sample_tx() -> Tx {
        Tx {
            msgs: vec![
                Msg::Send(MsgSend {
                    from: addr(1),
                    to: addr(2),
                    amount: Coins::single("ubld", 5),
                }),
                Msg::Unjail(MsgUnjail { operator: addr(3) }),
                Msg::Send(MsgSend {
                    from: addr(1),
                    to: addr(3),
                    amount: Coins::single("ubld", 1),
                }),
            ],
            fee: Fee {
                amount: Coins::single("ubld", 10),
                gas_limit: 200_000,
            },
            memo: String::new(),
            timeout_height: 0,
            signatures: vec![],
        }
    }

    #[test]
    fn test_signers_are_unique_and_ordered() {
        let tx = sample_tx();
        assert_eq!(tx.signers(), vec![addr(1), addr(3)]);
        assert_eq!(tx.fee_payer(), Some(addr(1)));
    }

    #[test]
    fn test_encode_decode() {
        let tx = sample_tx();
        let bytes = tx.encode().unwrap();
        assert_eq!(Tx::decode(&bytes).unwrap(), tx);
        assert!(Tx::decode(b"not json").is_err());
    }

    #[test]
    fn test_sign_bytes_bind_chain_and_sequence() {
        let tx = sample_tx();
        let a = tx.sign_doc("chain-a", 0, 0).sign_bytes().unwrap();
        let b = tx.sign_doc("chain-b", 0, 0).sign_bytes().unwrap();
        let c = tx.sign_doc("chain-a", 0, 1).sign_bytes().unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
