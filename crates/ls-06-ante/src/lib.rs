//! # Ante Handler (ls-06)
//!
//! Checks every transaction before its messages run: structure, timeout,
//! memo size, gas for the encoded size and signatures, the mempool fee,
//! public keys, fee deduction, signature verification and the account
//! sequence. Relayer transactions whose packets were all received already
//! are kept out of the mempool.
//!
//! The handler itself is stateless. It reads and writes through the auth,
//! supply and ibc keepers, on whatever context the application hands it.

pub mod config;
pub mod decorators;
pub mod errors;
pub mod handler;

pub use config::MinGasPrices;
pub use decorators::{AnteDecorator, AnteTx};
pub use errors::{AnteError, AnteResult};
pub use handler::AnteHandler;
