//! # VM Bridge
//!
//! Connects the state machine to the external execution engine. Block
//! boundaries, inbound peer messages and IBC events on the `vm` port are
//! forwarded as JSON messages; the engine answers with a list of actions that
//! are applied to this module's storage or turned into outgoing packets.
//!
//! ```text
//! -> {"type":"BEGIN_BLOCK","blockHeight":H,"blockTime":T,"chainID":C}
//! <- {"actions":[{"type":"setStorage","key":"k","value":"v"}, ...]}
//! ```
//!
//! Engine calls are skipped while checking transactions, and every engine
//! failure is fatal for the block. Calls made while executing a height the
//! engine already acknowledged are sent as not new, so a replayed block gets
//! the engine's recorded answers instead of fresh ones.

use crate::codec::{decode_genesis, encode_genesis, to_json};
use crate::ibc::{
    capability_error, channel_capability_name, Acknowledgement, Channel, IbcKeeper, IbcModule,
};
use ls_01_store::{Context, ExecMode, StoreKey};
use ls_02_capability::{Capability, ScopedCapabilityKeeper};
use ls_03_commit_bridge::{AcknowledgedHeight, ExternalEngine};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{
    names, Event, Msg, MsgDeliverInbound, Packet, RequestBeginBlock, RequestEndBlock, ValidatorUpdate,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const PORT_ID: &str = "vm";
const STORAGE_PREFIX: &str = "storage";

/// Instruction returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    SetStorage { key: String, value: String },
    DeleteStorage { key: String },
    #[serde(rename_all = "camelCase")]
    SendPacket {
        port: String,
        channel: String,
        data: String,
        #[serde(default)]
        timeout_height: u64,
    },
}

#[derive(Debug, Default, Deserialize)]
struct EngineReply {
    #[serde(default)]
    actions: Vec<Action>,
    /// Acknowledgement for a received packet; success when absent.
    #[serde(default)]
    ack: Option<Acknowledgement>,
}

pub struct VmBridgeKeeper {
    key: StoreKey,
    scope: ScopedCapabilityKeeper,
    ibc: Arc<IbcKeeper>,
    engine: Arc<dyn ExternalEngine>,
    acknowledged: AcknowledgedHeight,
}

impl VmBridgeKeeper {
    pub fn new(
        key: StoreKey,
        scope: ScopedCapabilityKeeper,
        ibc: Arc<IbcKeeper>,
        engine: Arc<dyn ExternalEngine>,
        acknowledged: AcknowledgedHeight,
    ) -> Self {
        Self {
            key,
            scope,
            ibc,
            engine,
            acknowledged,
        }
    }

    pub fn bind_port(&self, ctx: &mut Context) -> ModuleResult<()> {
        if self.ibc.is_bound(ctx, PORT_ID)? {
            return Ok(());
        }
        self.ibc.bind_port(ctx, PORT_ID, &self.scope).map(|_| ())
    }

    fn storage_key(key: &str) -> Vec<u8> {
        format!("{STORAGE_PREFIX}/{key}").into_bytes()
    }

    pub fn storage(&self, ctx: &mut Context, key: &str) -> ModuleResult<Option<String>> {
        Ok(ctx.kv(&self.key)?.get_json(&Self::storage_key(key))?)
    }

    pub fn set_storage(&self, ctx: &mut Context, key: &str, value: &str) -> ModuleResult<()> {
        ctx.kv(&self.key)?.set_json(&Self::storage_key(key), &value)?;
        Ok(())
    }

    pub fn all_storage(&self, ctx: &mut Context) -> ModuleResult<BTreeMap<String, String>> {
        let prefix = format!("{STORAGE_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<String>(prefix.as_bytes())?
            .into_iter()
            .map(|(key, value)| (String::from_utf8_lossy(&key[prefix.len()..]).into_owned(), value))
            .collect())
    }

    /// Send `payload` to the engine. `None` in check mode.
    fn call_engine(&self, ctx: &Context, payload: Value) -> ModuleResult<Option<EngineReply>> {
        if ctx.is_check() {
            return Ok(None);
        }
        let kind = payload["type"].as_str().unwrap_or_default().to_string();
        let is_new_height =
            ctx.mode() == ExecMode::Genesis || self.acknowledged.is_new(ctx.height());
        let reply = self
            .engine
            .call(is_new_height, &payload.to_string())
            .map_err(|e| ModuleError::Engine(format!("{kind}: {e}")))?;
        let reply: EngineReply = serde_json::from_str(&reply)
            .map_err(|e| ModuleError::Engine(format!("{kind}: malformed reply: {e}")))?;
        debug!(
            kind = %kind,
            is_new_height,
            actions = reply.actions.len(),
            "[vmbridge] engine replied"
        );
        Ok(Some(reply))
    }

    fn apply_actions(&self, ctx: &mut Context, actions: Vec<Action>) -> ModuleResult<()> {
        for action in actions {
            match action {
                Action::SetStorage { key, value } => self.set_storage(ctx, &key, &value)?,
                Action::DeleteStorage { key } => {
                    ctx.kv(&self.key)?.delete(&Self::storage_key(&key))?;
                }
                Action::SendPacket {
                    port,
                    channel,
                    data,
                    timeout_height,
                } => {
                    let cap = self.channel_capability(ctx, &port, &channel)?;
                    self.ibc
                        .send_packet(ctx, &cap, &port, &channel, data.into_bytes(), timeout_height)?;
                }
            }
        }
        Ok(())
    }

    fn channel_capability(&self, ctx: &mut Context, port: &str, channel: &str) -> ModuleResult<Capability> {
        self.scope
            .lookup_capability(ctx, &channel_capability_name(port, channel))
            .map_err(capability_error)?
            .ok_or_else(|| {
                ModuleError::Unauthorized(format!("vm bridge does not own channel {port}/{channel}"))
            })
    }

    fn block_payload(ctx: &Context, kind: &str) -> Value {
        json!({
            "type": kind,
            "blockHeight": ctx.height(),
            "blockTime": ctx.block_time(),
            "chainID": ctx.chain_id(),
        })
    }

    pub fn begin_blocker(&self, ctx: &mut Context) -> ModuleResult<()> {
        if let Some(reply) = self.call_engine(ctx, Self::block_payload(ctx, "BEGIN_BLOCK"))? {
            self.apply_actions(ctx, reply.actions)?;
        }
        Ok(())
    }

    pub fn end_blocker(&self, ctx: &mut Context) -> ModuleResult<()> {
        if let Some(reply) = self.call_engine(ctx, Self::block_payload(ctx, "END_BLOCK"))? {
            let applied = reply.actions.len();
            self.apply_actions(ctx, reply.actions)?;
            if applied > 0 {
                info!(height = ctx.height(), applied, "[vmbridge] engine actions applied");
            }
        }
        Ok(())
    }

    pub fn deliver_inbound(&self, ctx: &mut Context, msg: &MsgDeliverInbound) -> ModuleResult<()> {
        let payload = json!({
            "type": "DELIVER_INBOUND",
            "peer": msg.peer,
            "messages": msg.messages,
            "ack": msg.ack,
            "blockHeight": ctx.height(),
            "blockTime": ctx.block_time(),
        });
        if let Some(reply) = self.call_engine(ctx, payload)? {
            self.apply_actions(ctx, reply.actions)?;
        }
        ctx.emit(
            Event::new("deliver_inbound")
                .attr("peer", &msg.peer)
                .attr("messages", msg.messages.len())
                .attr("ack", msg.ack),
        );
        Ok(())
    }

    fn ibc_event(&self, ctx: &mut Context, event: &str, body: Value) -> ModuleResult<Option<EngineReply>> {
        let mut payload = json!({
            "type": "IBC_EVENT",
            "event": event,
            "blockHeight": ctx.height(),
            "blockTime": ctx.block_time(),
        });
        if let (Value::Object(payload), Value::Object(body)) = (&mut payload, body) {
            payload.extend(body);
        }
        let reply = self.call_engine(ctx, payload)?;
        Ok(reply)
    }
}

impl IbcModule for VmBridgeKeeper {
    fn on_chan_open_init(&self, ctx: &mut Context, channel: &Channel, capability: &Capability) -> ModuleResult<()> {
        self.scope
            .claim_capability(
                ctx,
                capability,
                &channel_capability_name(&channel.port_id, &channel.channel_id),
            )
            .map_err(capability_error)?;
        let body = json!({ "channel": channel });
        if let Some(reply) = self.ibc_event(ctx, "channelOpenInit", body)? {
            self.apply_actions(ctx, reply.actions)?;
        }
        Ok(())
    }

    fn on_recv_packet(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<Vec<u8>> {
        let body = json!({ "packet": packet_json(packet) });
        let ack = match self.ibc_event(ctx, "receivePacket", body)? {
            Some(reply) => {
                self.apply_actions(ctx, reply.actions)?;
                reply.ack.unwrap_or_else(Acknowledgement::success)
            }
            None => Acknowledgement::success(),
        };
        ack.to_bytes()
    }

    fn on_acknowledgement_packet(
        &self,
        ctx: &mut Context,
        packet: &Packet,
        acknowledgement: &Acknowledgement,
    ) -> ModuleResult<()> {
        let body = json!({
            "packet": packet_json(packet),
            "acknowledgement": acknowledgement,
        });
        if let Some(reply) = self.ibc_event(ctx, "acknowledgementPacket", body)? {
            self.apply_actions(ctx, reply.actions)?;
        }
        Ok(())
    }

    fn on_timeout_packet(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<()> {
        let body = json!({ "packet": packet_json(packet) });
        if let Some(reply) = self.ibc_event(ctx, "timeoutPacket", body)? {
            self.apply_actions(ctx, reply.actions)?;
        }
        Ok(())
    }
}

fn packet_json(packet: &Packet) -> Value {
    json!({
        "sequence": packet.sequence,
        "source_port": packet.source_port,
        "source_channel": packet.source_channel,
        "destination_port": packet.destination_port,
        "destination_channel": packet.destination_channel,
        "data": String::from_utf8_lossy(&packet.data),
        "timeout_height": packet.timeout_height,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmBridgeGenesis {
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
}

pub struct VmBridgeModule {
    keeper: Arc<VmBridgeKeeper>,
}

impl VmBridgeModule {
    pub fn new(keeper: Arc<VmBridgeKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for VmBridgeModule {
    fn name(&self) -> &'static str {
        names::VM_BRIDGE
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::VM_BRIDGE, &VmBridgeGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: VmBridgeGenesis = decode_genesis(names::VM_BRIDGE, genesis)?;
        if genesis.storage.keys().any(|k| k.is_empty()) {
            return Err(ModuleError::InvalidGenesis("empty vm storage key".into()));
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: VmBridgeGenesis = decode_genesis(names::VM_BRIDGE, genesis)?;
        self.keeper.bind_port(ctx)?;
        for (key, value) in &genesis.storage {
            self.keeper.set_storage(ctx, key, value)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = VmBridgeGenesis {
            storage: self.keeper.all_storage(ctx)?,
        };
        encode_genesis(names::VM_BRIDGE, &genesis)
    }

    fn has_begin_blocker(&self) -> bool {
        true
    }

    fn begin_block(&self, ctx: &mut Context, _req: &RequestBeginBlock) -> ModuleResult<()> {
        self.keeper.begin_blocker(ctx)
    }

    fn has_end_blocker(&self) -> bool {
        true
    }

    fn end_block(&self, ctx: &mut Context, _req: &RequestEndBlock) -> ModuleResult<Vec<ValidatorUpdate>> {
        self.keeper.end_blocker(ctx)?;
        Ok(Vec::new())
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::VM_BRIDGE)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::DeliverInbound(m) => self.keeper.deliver_inbound(ctx, m),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::VM_BRIDGE)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path.split_once('/') {
            Some(("storage", key)) => to_json(&self.keeper.storage(ctx, key)?),
            None if path == "storage" => to_json(&self.keeper.all_storage(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("vmbridge/{path}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, TestKeepers};
    use ls_01_store::ExecMode;
    use shared_types::MsgChannelOpenInit;

    fn open_channel(k: &TestKeepers, ctx: &mut Context, port: &str, version: &str) -> String {
        k.ibc
            .channel_open_init(
                ctx,
                &MsgChannelOpenInit {
                    signer: addr(1),
                    port_id: port.into(),
                    counterparty_port_id: port.into(),
                    counterparty_channel_id: "channel-3".into(),
                    version: version.into(),
                },
            )
            .unwrap()
    }

    fn inbound(peer: &str, sequences: &[u64]) -> MsgDeliverInbound {
        MsgDeliverInbound {
            submitter: addr(1),
            peer: peer.into(),
            messages: sequences.iter().map(|s| (*s, format!("msg-{s}"))).collect(),
            ack: 0,
        }
    }

    #[test]
    fn test_block_boundaries_reach_engine() {
        let (k, mut ctx) = TestKeepers::new();
        k.vmbridge.begin_blocker(&mut ctx).unwrap();
        k.vmbridge.end_blocker(&mut ctx).unwrap();
        let calls = k.engine.calls();
        let kinds: Vec<&str> = calls.iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["BEGIN_BLOCK", "END_BLOCK"]);
        assert_eq!(calls[0].payload["blockHeight"], 1);
        assert_eq!(calls[0].payload["chainID"], "lockstep-test");
    }

    #[test]
    fn test_inbound_ack_lands_in_storage_at_end_block() {
        let (k, mut ctx) = TestKeepers::new();
        k.vmbridge
            .deliver_inbound(&mut ctx, &inbound("peer1", &[1, 2, 3]))
            .unwrap();
        assert_eq!(k.vmbridge.storage(&mut ctx, "inbound.peer1").unwrap(), None);
        k.vmbridge.end_blocker(&mut ctx).unwrap();
        assert_eq!(
            k.vmbridge.storage(&mut ctx, "inbound.peer1").unwrap(),
            Some("3".to_string())
        );
    }

    #[test]
    fn test_storage_actions() {
        let (k, mut ctx) = TestKeepers::new();
        k.vmbridge.set_storage(&mut ctx, "old", "x").unwrap();
        k.engine
            .queue_action(json!({"type": "setStorage", "key": "a", "value": "1"}));
        k.engine.queue_action(json!({"type": "deleteStorage", "key": "old"}));
        k.vmbridge.end_blocker(&mut ctx).unwrap();

        let storage = k.vmbridge.all_storage(&mut ctx).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_send_packet_action_uses_owned_channel() {
        let (k, mut ctx) = TestKeepers::new();
        let channel = open_channel(&k, &mut ctx, PORT_ID, "vm-1");
        k.engine.queue_action(json!({
            "type": "sendPacket",
            "port": PORT_ID,
            "channel": channel,
            "data": "hello",
            "timeoutHeight": 0,
        }));
        k.vmbridge.end_blocker(&mut ctx).unwrap();
        assert!(k
            .ibc
            .packet_commitment(&mut ctx, PORT_ID, &channel, 1)
            .unwrap()
            .is_some());
        let opened = k
            .engine
            .calls()
            .iter()
            .any(|c| c.kind() == "IBC_EVENT" && c.payload["event"] == "channelOpenInit");
        assert!(opened);
    }

    #[test]
    fn test_send_packet_on_foreign_channel_refused() {
        let (k, mut ctx) = TestKeepers::new();
        let channel = open_channel(&k, &mut ctx, "transfer", "ics20-1");
        k.engine.queue_action(json!({
            "type": "sendPacket",
            "port": "transfer",
            "channel": channel,
            "data": "steal",
        }));
        assert!(matches!(
            k.vmbridge.end_blocker(&mut ctx),
            Err(ModuleError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_engine_failure_is_fatal() {
        let (k, mut ctx) = TestKeepers::new();
        k.engine.fail_next("socket closed");
        let err = k.vmbridge.begin_blocker(&mut ctx).unwrap_err();
        assert!(matches!(err, ModuleError::Engine(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_check_mode_skips_engine() {
        let (k, mut ctx) = TestKeepers::new();
        ctx.set_mode(ExecMode::Check);
        k.vmbridge
            .deliver_inbound(&mut ctx, &inbound("peer1", &[1]))
            .unwrap();
        assert!(k.engine.calls().is_empty());
    }

    #[test]
    fn test_packet_outcomes_forwarded_to_engine() {
        let (k, mut ctx) = TestKeepers::new();
        let channel = open_channel(&k, &mut ctx, PORT_ID, "vm-1");
        k.engine.queue_action(json!({
            "type": "sendPacket",
            "port": PORT_ID,
            "channel": channel,
            "data": "first",
            "timeoutHeight": 0,
        }));
        k.engine.queue_action(json!({
            "type": "sendPacket",
            "port": PORT_ID,
            "channel": channel,
            "data": "second",
            "timeoutHeight": 9,
        }));
        k.vmbridge.end_blocker(&mut ctx).unwrap();
        let sent = |sequence: u64, data: &str, timeout_height: u64| Packet {
            sequence,
            source_port: PORT_ID.into(),
            source_channel: channel.clone(),
            destination_port: PORT_ID.into(),
            destination_channel: "channel-3".into(),
            data: data.as_bytes().to_vec(),
            timeout_height,
        };

        let ack = Acknowledgement::Error("bad".into()).to_bytes().unwrap();
        k.ibc.acknowledge_packet(&mut ctx, &sent(1, "first", 0), &ack).unwrap();
        k.ibc.timeout_packet(&mut ctx, &sent(2, "second", 9), 9).unwrap();

        let events: Vec<(String, Value)> = k
            .engine
            .calls()
            .into_iter()
            .filter(|c| c.kind() == "IBC_EVENT")
            .map(|c| (c.payload["event"].as_str().unwrap_or_default().to_string(), c.payload))
            .collect();
        let ack_event = events.iter().find(|(e, _)| e == "acknowledgementPacket").unwrap();
        assert_eq!(ack_event.1["acknowledgement"]["error"], "bad");
        assert_eq!(ack_event.1["packet"]["data"], "first");
        let timeout_event = events.iter().find(|(e, _)| e == "timeoutPacket").unwrap();
        assert_eq!(timeout_event.1["packet"]["sequence"], 2);
    }

    #[test]
    fn test_received_packet_forwarded_and_acknowledged() {
        let (k, mut ctx) = TestKeepers::new();
        let channel = open_channel(&k, &mut ctx, PORT_ID, "vm-1");
        let packet = Packet {
            sequence: 1,
            source_port: PORT_ID.into(),
            source_channel: "channel-3".into(),
            destination_port: PORT_ID.into(),
            destination_channel: channel,
            data: b"ping".to_vec(),
            timeout_height: 0,
        };
        let ack: Acknowledgement =
            serde_json::from_slice(&k.ibc.recv_packet(&mut ctx, &packet).unwrap()).unwrap();
        assert!(ack.is_success());
        let forwarded = k
            .engine
            .calls()
            .into_iter()
            .find(|c| c.payload["event"] == "receivePacket")
            .unwrap();
        assert_eq!(forwarded.payload["packet"]["data"], "ping");
    }
}
