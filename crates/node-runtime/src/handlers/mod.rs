//! # ABCI Handlers
//!
//! - `tx.rs` - runs a transaction through ante and the message router
//! - `query.rs` - answers queries against committed state

pub mod query;
pub mod tx;

pub use query::handle_query;
pub use tx::{RunTxMode, TxRunner};
