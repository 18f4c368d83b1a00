//! # Application Container
//!
//! Configuration and the keeper set the application is assembled from.
//!
//! - `config.rs` - `AppConfig` and its environment overrides
//! - `keepers.rs` - `AppKeepers`, every keeper built in dependency order

pub mod config;
pub mod keepers;

pub use config::{AppConfig, ConfigError};
pub use keepers::AppKeepers;
