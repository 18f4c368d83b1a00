//! # Shared Crypto - Account Keys and Transaction Signing
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Account keys, signature verification in the ante handler |
//! | `tx_signing` | Ed25519 over `SignDoc` bytes | Building signed transactions (genesis txs, tooling, tests) |
//!
//! ## Security Properties
//!
//! - **Ed25519**: Deterministic nonces, no RNG dependency when signing
//! - Secret seeds are zeroized when a key pair is dropped

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod signatures;
pub mod tx_signing;

// Re-exports
pub use errors::CryptoError;
pub use signatures::{verify, Ed25519KeyPair, Ed25519Signature};
pub use tx_signing::{sign_tx, SignerInfo};
