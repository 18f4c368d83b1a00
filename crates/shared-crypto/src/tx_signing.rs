//! Building signed transactions.

use crate::{CryptoError, Ed25519KeyPair};
use shared_types::{Tx, TxSignature};

/// One signer of a transaction with its on-chain account number and sequence.
pub struct SignerInfo<'a> {
    /// Key of the signer.
    pub key: &'a Ed25519KeyPair,
    /// Account number assigned by the auth module.
    pub account_number: u64,
    /// Current account sequence.
    pub sequence: u64,
}

/// Replace `tx.signatures` with one signature per signer, in the order given.
///
/// The order must match `Tx::signers()`. Every signature carries its public
/// key so the ante handler can set it on first use.
pub fn sign_tx(tx: &mut Tx, chain_id: &str, signers: &[SignerInfo<'_>]) -> Result<(), CryptoError> {
    let mut signatures = Vec::with_capacity(signers.len());
    for signer in signers {
        let bytes = tx
            .sign_doc(chain_id, signer.account_number, signer.sequence)
            .sign_bytes()
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        signatures.push(TxSignature {
            pub_key: Some(signer.key.pub_key()),
            signature: signer.key.sign(&bytes).to_vec(),
            sequence: signer.sequence,
        });
    }
    tx.signatures = signatures;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify;
    use shared_types::{Coins, Fee, Msg, MsgSend};

    #[test]
    fn test_signature_verifies_against_sign_doc() {
        let key = Ed25519KeyPair::from_seed([9u8; 32]);
        let mut tx = Tx {
            msgs: vec![Msg::Send(MsgSend {
                from: key.address(),
                to: shared_types::Address([2; 20]),
                amount: Coins::single("ubld", 1),
            })],
            fee: Fee::default(),
            memo: String::new(),
            timeout_height: 0,
            signatures: vec![],
        };
        sign_tx(
            &mut tx,
            "lockstep-test",
            &[SignerInfo {
                key: &key,
                account_number: 4,
                sequence: 2,
            }],
        )
        .unwrap();

        let sig = &tx.signatures[0];
        assert_eq!(sig.sequence, 2);
        let bytes = tx.sign_doc("lockstep-test", 4, 2).sign_bytes().unwrap();
        assert!(verify(&key.pub_key(), &bytes, &sig.signature).is_ok());
        let other = tx.sign_doc("lockstep-test", 5, 2).sign_bytes().unwrap();
        assert!(verify(&key.pub_key(), &other, &sig.signature).is_err());
    }
}
