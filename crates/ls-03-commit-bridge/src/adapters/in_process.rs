//! In-process reference engine.
//!
//! Implements the engine side of the protocol well enough to run a node and
//! to observe the bridge from tests: it checkpoints committed heights, records
//! every call, and answers block messages with queued actions.
//!
//! Replies to block-phase calls are recorded per height. A call that is not
//! new (a replayed height) gets the recorded reply back in call order and has
//! no other effect, so a replayed block applies the same actions.
//!
//! | Message | Reply |
//! |---------|-------|
//! | `BEGIN_BLOCK` | `{"actions":[]}` |
//! | `DELIVER_INBOUND` | `{"actions":[]}`, records the highest ack per peer as a storage write for END_BLOCK |
//! | `IBC_EVENT` | `{"actions":[]}` |
//! | `END_BLOCK` | `{"actions":[...]}` with every queued action |
//! | `COMMIT_BLOCK` | `{}`; advances the checkpoint when `is_new_height` |

use crate::errors::EngineError;
use crate::ports::ExternalEngine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Checkpointed heights whose replies stay available for replay.
const REPLAY_WINDOW: u64 = 100;

/// A recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCall {
    pub is_new_height: bool,
    pub payload: Value,
}

impl EngineCall {
    pub fn kind(&self) -> &str {
        self.payload["type"].as_str().unwrap_or_default()
    }
}

#[derive(Default)]
struct EngineState {
    checkpoint: u64,
    calls: Vec<EngineCall>,
    queued: Vec<Value>,
    /// `(type, reply)` per height, in call order.
    replies: BTreeMap<u64, Vec<(String, Value)>>,
    /// Next recorded reply to serve for the height being replayed.
    replay_cursor: usize,
    fail_next: Option<String>,
}

#[derive(Default)]
pub struct InProcessEngine {
    state: Mutex<EngineState>,
}

impl InProcessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest height the engine has checkpointed.
    pub fn checkpoint_height(&self) -> u64 {
        self.state.lock().checkpoint
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    /// `(is_new_height, blockHeight)` of every COMMIT_BLOCK received.
    pub fn commit_notifications(&self) -> Vec<(bool, u64)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.kind() == "COMMIT_BLOCK")
            .map(|c| (c.is_new_height, c.payload["blockHeight"].as_u64().unwrap_or(0)))
            .collect()
    }

    /// Queue an action returned with the next END_BLOCK reply.
    pub fn queue_action(&self, action: Value) {
        self.state.lock().queued.push(action);
    }

    /// Make the next call fail with a transport error.
    pub fn fail_next(&self, reason: &str) {
        self.state.lock().fail_next = Some(reason.to_string());
    }

    fn handle(state: &mut EngineState, is_new_height: bool, msg: &Value) -> Result<Value, EngineError> {
        let kind = msg["type"]
            .as_str()
            .ok_or_else(|| EngineError::Malformed("missing type".into()))?;
        let height = msg["blockHeight"].as_u64();
        if kind == "COMMIT_BLOCK" {
            let height = height.ok_or_else(|| EngineError::Malformed("missing blockHeight".into()))?;
            return Self::commit_block(state, is_new_height, height);
        }
        match (is_new_height, height) {
            (false, Some(height)) => Self::replay(state, kind, height),
            (true, Some(height)) => {
                if kind == "BEGIN_BLOCK" {
                    state.replies.insert(height, Vec::new());
                }
                let reply = Self::execute(state, kind, msg)?;
                state
                    .replies
                    .entry(height)
                    .or_default()
                    .push((kind.to_string(), reply.clone()));
                Ok(reply)
            }
            (_, None) => Self::execute(state, kind, msg),
        }
    }

    fn execute(state: &mut EngineState, kind: &str, msg: &Value) -> Result<Value, EngineError> {
        match kind {
            "BEGIN_BLOCK" | "IBC_EVENT" => Ok(json!({ "actions": [] })),
            "DELIVER_INBOUND" => {
                let peer = msg["peer"].as_str().unwrap_or_default();
                let ack = msg["ack"].as_u64().unwrap_or(0);
                let last = msg["messages"]
                    .as_array()
                    .and_then(|m| m.iter().filter_map(|e| e[0].as_u64()).max())
                    .unwrap_or(ack);
                state.queued.push(json!({
                    "type": "setStorage",
                    "key": format!("inbound.{peer}"),
                    "value": last.to_string(),
                }));
                Ok(json!({ "actions": [] }))
            }
            "END_BLOCK" => {
                let actions = std::mem::take(&mut state.queued);
                Ok(json!({ "actions": actions }))
            }
            other => Err(EngineError::Rejected(format!("unknown message type {other}"))),
        }
    }

    fn replay(state: &mut EngineState, kind: &str, height: u64) -> Result<Value, EngineError> {
        if kind == "BEGIN_BLOCK" {
            state.replay_cursor = 0;
        }
        let recorded = state
            .replies
            .get(&height)
            .and_then(|replies| replies.get(state.replay_cursor))
            .ok_or_else(|| {
                EngineError::Rejected(format!("no recorded reply for replayed {kind} at height {height}"))
            })?;
        if recorded.0 != kind {
            return Err(EngineError::Rejected(format!(
                "replayed {kind} at height {height} does not match recorded {}",
                recorded.0
            )));
        }
        let reply = recorded.1.clone();
        state.replay_cursor += 1;
        Ok(reply)
    }

    fn commit_block(state: &mut EngineState, is_new_height: bool, height: u64) -> Result<Value, EngineError> {
        if is_new_height {
            if height <= state.checkpoint {
                return Err(EngineError::Rejected(format!(
                    "height {height} already checkpointed at {}",
                    state.checkpoint
                )));
            }
            state.checkpoint = height;
            state.replies = state.replies.split_off(&height.saturating_sub(REPLAY_WINDOW));
        }
        Ok(json!({}))
    }
}

impl ExternalEngine for InProcessEngine {
    fn call(&self, is_new_height: bool, payload: &str) -> Result<String, EngineError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next.take() {
            return Err(EngineError::Transport(reason));
        }
        let msg: Value =
            serde_json::from_str(payload).map_err(|e| EngineError::Malformed(e.to_string()))?;
        state.calls.push(EngineCall {
            is_new_height,
            payload: msg.clone(),
        });
        let reply = Self::handle(&mut state, is_new_height, &msg)?;
        debug!(kind = %msg["type"], is_new_height, "[engine] handled");
        Ok(reply.to_string())
    }
}
