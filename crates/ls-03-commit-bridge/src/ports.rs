//! # Outbound Port
//!
//! The external execution engine. Calls are synchronous: block processing
//! waits for the reply.

use crate::errors::EngineError;

pub trait ExternalEngine: Send + Sync {
    /// Send one JSON `payload`. `is_new_height` is false when the payload
    /// belongs to a height the engine has already acknowledged.
    fn call(&self, is_new_height: bool, payload: &str) -> Result<String, EngineError>;
}
