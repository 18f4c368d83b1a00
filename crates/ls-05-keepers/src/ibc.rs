//! # IBC
//!
//! Ports, channels and packets shared by `transfer` and `vmbridge`. Every
//! port and channel is guarded by a capability: the module that bound a port
//! owns `ports/<port>`, and the module that opened a channel owns
//! `capabilities/ports/<port>/channels/<channel>`. Sending on a channel
//! requires presenting that channel capability.
//!
//! Light clients and handshake proofs are out of scope: `ChannelOpenInit`
//! opens the channel immediately, and relayed packets are accepted on the
//! relayer's word. Replay protection comes from packet receipts on the
//! receiving side and from packet commitments on the sending side: an
//! acknowledgement or a timeout consumes the commitment, so each sent packet
//! is settled once.
//!
//! ```text
//! next_channel_sequence                 -> u64
//! channels/<port>/<channel>             -> Channel
//! seq_send/<port>/<channel>             -> u64
//! commitments/<port>/<channel>/<seq>    -> hex sha256(data)
//! receipts/<port>/<channel>/<seq>       -> hex sha256(data)
//! acks/<port>/<channel>/<seq>           -> hex sha256(ack)
//! ```

use crate::codec::{decode_genesis, encode_genesis, to_json};
use ls_01_store::{Context, StoreKey};
use ls_02_capability::{Capability, CapabilityError, ScopedCapabilityKeeper};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, sha256, Event, Msg, MsgChannelOpenInit, Packet, ValidatorUpdate};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

const NEXT_CHANNEL_SEQUENCE: &[u8] = b"next_channel_sequence";
const CHANNEL_PREFIX: &str = "channels";
const SEQ_SEND_PREFIX: &str = "seq_send";
const COMMITMENT_PREFIX: &str = "commitments";
const RECEIPT_PREFIX: &str = "receipts";
const ACK_PREFIX: &str = "acks";

pub fn port_capability_name(port: &str) -> String {
    format!("ports/{port}")
}

pub fn channel_capability_name(port: &str, channel: &str) -> String {
    format!("capabilities/ports/{port}/channels/{channel}")
}

pub(crate) fn capability_error(e: CapabilityError) -> ModuleError {
    match e {
        CapabilityError::Store(store) => ModuleError::Store(store),
        other => ModuleError::Unauthorized(other.to_string()),
    }
}

fn ibc_error(code: u32, message: impl Into<String>) -> ModuleError {
    ModuleError::custom(names::IBC, code, message)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub port_id: String,
    pub channel_id: String,
    pub counterparty_port_id: String,
    pub counterparty_channel_id: String,
    pub version: String,
}

/// Acknowledgement written for a received packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acknowledgement {
    Result(String),
    Error(String),
}

impl Acknowledgement {
    pub fn success() -> Self {
        Acknowledgement::Result("AQ==".to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Acknowledgement::Result(_))
    }

    pub fn to_bytes(&self) -> ModuleResult<Vec<u8>> {
        to_json(self)
    }
}

/// Callbacks of a module that owns ports.
pub trait IbcModule: Send + Sync {
    /// Claim `capability` for the new channel, or refuse it.
    fn on_chan_open_init(
        &self,
        ctx: &mut Context,
        channel: &Channel,
        capability: &Capability,
    ) -> ModuleResult<()>;

    /// Process a packet and return the acknowledgement bytes.
    fn on_recv_packet(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<Vec<u8>>;

    /// The counterparty acknowledged a packet this module sent.
    fn on_acknowledgement_packet(
        &self,
        ctx: &mut Context,
        packet: &Packet,
        acknowledgement: &Acknowledgement,
    ) -> ModuleResult<()>;

    /// A packet this module sent was not received before its timeout.
    fn on_timeout_packet(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<()>;
}

pub struct IbcKeeper {
    key: StoreKey,
    scope: ScopedCapabilityKeeper,
    router: OnceLock<BTreeMap<&'static str, Arc<dyn IbcModule>>>,
}

impl IbcKeeper {
    pub fn new(key: StoreKey, scope: ScopedCapabilityKeeper) -> Self {
        Self {
            key,
            scope,
            router: OnceLock::new(),
        }
    }

    /// Install the module callbacks, keyed by module name. Allowed once.
    pub fn set_router(&self, routes: Vec<(&'static str, Arc<dyn IbcModule>)>) -> ModuleResult<()> {
        let routes: BTreeMap<_, _> = routes.into_iter().collect();
        self.router
            .set(routes)
            .map_err(|_| ModuleError::InvalidRequest("ibc router already set".into()))
    }

    fn route(&self, module: &str) -> ModuleResult<&Arc<dyn IbcModule>> {
        self.router
            .get()
            .and_then(|r| r.get(module))
            .ok_or_else(|| ibc_error(8, format!("no ibc callbacks for module {module}")))
    }

    /// Callbacks of the module bound to `port`, with its name.
    fn port_callbacks(&self, ctx: &mut Context, port: &str) -> ModuleResult<(String, Arc<dyn IbcModule>)> {
        let owner = self
            .port_owner(ctx, port)?
            .ok_or_else(|| ibc_error(3, format!("port {port} is not bound")))?;
        let callbacks = Arc::clone(self.route(&owner)?);
        Ok((owner, callbacks))
    }

    // ---- ports --------------------------------------------------------------

    /// Bind `port` to the module behind `owner`. The owner also takes over
    /// the capabilities of channels already open on the port, which is how
    /// channels restored from genesis get their owner back.
    pub fn bind_port(
        &self,
        ctx: &mut Context,
        port: &str,
        owner: &ScopedCapabilityKeeper,
    ) -> ModuleResult<Capability> {
        let name = port_capability_name(port);
        if self.scope.lookup_capability(ctx, &name).map_err(capability_error)?.is_some() {
            return Err(ibc_error(2, format!("port {port} is already bound")));
        }
        let cap = self.scope.new_capability(ctx, &name).map_err(capability_error)?;
        owner.claim_capability(ctx, &cap, &name).map_err(capability_error)?;

        for channel in self.channels(ctx)?.into_iter().filter(|c| c.port_id == port) {
            let chan_name = channel_capability_name(port, &channel.channel_id);
            let Some(chan_cap) = self.scope.lookup_capability(ctx, &chan_name).map_err(capability_error)? else {
                continue;
            };
            if owner.lookup_capability(ctx, &chan_name).map_err(capability_error)?.is_none() {
                owner.claim_capability(ctx, &chan_cap, &chan_name).map_err(capability_error)?;
            }
        }
        info!(port, module = owner.module(), "[ibc] port bound");
        Ok(cap)
    }

    pub fn is_bound(&self, ctx: &mut Context, port: &str) -> ModuleResult<bool> {
        Ok(self
            .scope
            .lookup_capability(ctx, &port_capability_name(port))
            .map_err(capability_error)?
            .is_some())
    }

    /// The module that bound `port`.
    pub fn port_owner(&self, ctx: &mut Context, port: &str) -> ModuleResult<Option<String>> {
        let owners = self
            .scope
            .owners(ctx, &port_capability_name(port))
            .map_err(capability_error)?;
        Ok(owners.and_then(|(_, owners)| {
            owners
                .into_iter()
                .map(|o| o.module)
                .find(|m| m.as_str() != self.scope.module())
        }))
    }

    // ---- channels -----------------------------------------------------------

    fn channel_key(port: &str, channel: &str) -> Vec<u8> {
        format!("{CHANNEL_PREFIX}/{port}/{channel}").into_bytes()
    }

    pub fn channel(&self, ctx: &mut Context, port: &str, channel: &str) -> ModuleResult<Option<Channel>> {
        Ok(ctx.kv(&self.key)?.get_json(&Self::channel_key(port, channel))?)
    }

    fn require_channel(&self, ctx: &mut Context, port: &str, channel: &str) -> ModuleResult<Channel> {
        self.channel(ctx, port, channel)?
            .ok_or_else(|| ibc_error(4, format!("channel {port}/{channel} not found")))
    }

    pub fn channels(&self, ctx: &mut Context) -> ModuleResult<Vec<Channel>> {
        let prefix = format!("{CHANNEL_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<Channel>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, c)| c)
            .collect())
    }

    fn set_channel(&self, ctx: &mut Context, channel: &Channel) -> ModuleResult<()> {
        ctx.kv(&self.key)?
            .set_json(&Self::channel_key(&channel.port_id, &channel.channel_id), channel)?;
        Ok(())
    }

    /// Open a channel on a bound port and hand its capability to the port
    /// owner. Returns the new channel id.
    pub fn channel_open_init(&self, ctx: &mut Context, msg: &MsgChannelOpenInit) -> ModuleResult<String> {
        let owner = self
            .port_owner(ctx, &msg.port_id)?
            .ok_or_else(|| ibc_error(3, format!("port {} is not bound", msg.port_id)))?;
        let callbacks = Arc::clone(self.route(&owner)?);

        let sequence: u64 = ctx.kv(&self.key)?.get_json(NEXT_CHANNEL_SEQUENCE)?.unwrap_or(0);
        ctx.kv(&self.key)?.set_json(NEXT_CHANNEL_SEQUENCE, &(sequence + 1))?;
        let channel = Channel {
            port_id: msg.port_id.clone(),
            channel_id: format!("channel-{sequence}"),
            counterparty_port_id: msg.counterparty_port_id.clone(),
            counterparty_channel_id: msg.counterparty_channel_id.clone(),
            version: msg.version.clone(),
        };
        self.set_channel(ctx, &channel)?;
        let cap = self
            .scope
            .new_capability(ctx, &channel_capability_name(&channel.port_id, &channel.channel_id))
            .map_err(capability_error)?;
        callbacks.on_chan_open_init(ctx, &channel, &cap)?;

        ctx.emit(
            Event::new("channel_open_init")
                .attr("port_id", &channel.port_id)
                .attr("channel_id", &channel.channel_id)
                .attr("counterparty_port_id", &channel.counterparty_port_id)
                .attr("counterparty_channel_id", &channel.counterparty_channel_id),
        );
        info!(
            port = %channel.port_id,
            channel = %channel.channel_id,
            module = %owner,
            "[ibc] channel opened"
        );
        Ok(channel.channel_id)
    }

    // ---- packets ------------------------------------------------------------

    fn packet_key(prefix: &str, port: &str, channel: &str, sequence: u64) -> Vec<u8> {
        format!("{prefix}/{port}/{channel}/{sequence:020}").into_bytes()
    }

    pub fn next_sequence_send(&self, ctx: &mut Context, port: &str, channel: &str) -> ModuleResult<u64> {
        let key = format!("{SEQ_SEND_PREFIX}/{port}/{channel}");
        Ok(ctx.kv(&self.key)?.get_json(key.as_bytes())?.unwrap_or(1))
    }

    /// Commit an outgoing packet. `capability` must be the channel
    /// capability the caller was handed when the channel opened.
    pub fn send_packet(
        &self,
        ctx: &mut Context,
        capability: &Capability,
        port: &str,
        channel: &str,
        data: Vec<u8>,
        timeout_height: u64,
    ) -> ModuleResult<Packet> {
        let authorized = self
            .scope
            .authenticate_capability(ctx, capability, &channel_capability_name(port, channel))
            .map_err(capability_error)?;
        if !authorized {
            return Err(ModuleError::Unauthorized(format!(
                "capability does not authorize channel {port}/{channel}"
            )));
        }
        let chan = self.require_channel(ctx, port, channel)?;
        let sequence = self.next_sequence_send(ctx, port, channel)?;
        let packet = Packet {
            sequence,
            source_port: port.to_string(),
            source_channel: channel.to_string(),
            destination_port: chan.counterparty_port_id,
            destination_channel: chan.counterparty_channel_id,
            data,
            timeout_height,
        };

        let mut kv = ctx.kv(&self.key)?;
        kv.set_json(
            format!("{SEQ_SEND_PREFIX}/{port}/{channel}").as_bytes(),
            &(sequence + 1),
        )?;
        kv.set_json(
            &Self::packet_key(COMMITMENT_PREFIX, port, channel, sequence),
            &hex::encode(sha256(&packet.data)),
        )?;

        ctx.emit(packet_event("send_packet", &packet));
        debug!(port, channel, sequence, "[ibc] packet sent");
        Ok(packet)
    }

    pub fn packet_commitment(
        &self,
        ctx: &mut Context,
        port: &str,
        channel: &str,
        sequence: u64,
    ) -> ModuleResult<Option<String>> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&Self::packet_key(COMMITMENT_PREFIX, port, channel, sequence))?)
    }

    pub fn has_receipt(&self, ctx: &mut Context, port: &str, channel: &str, sequence: u64) -> ModuleResult<bool> {
        Ok(ctx
            .kv(&self.key)?
            .has(&Self::packet_key(RECEIPT_PREFIX, port, channel, sequence))?)
    }

    pub fn acknowledgement(
        &self,
        ctx: &mut Context,
        port: &str,
        channel: &str,
        sequence: u64,
    ) -> ModuleResult<Option<String>> {
        Ok(ctx
            .kv(&self.key)?
            .get_json(&Self::packet_key(ACK_PREFIX, port, channel, sequence))?)
    }

    /// Deliver a relayed packet to the module owning its destination port.
    pub fn recv_packet(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<Vec<u8>> {
        let port = packet.destination_port.as_str();
        let channel = packet.destination_channel.as_str();
        let chan = self.require_channel(ctx, port, channel)?;
        if chan.counterparty_port_id != packet.source_port
            || chan.counterparty_channel_id != packet.source_channel
        {
            return Err(ibc_error(
                7,
                format!(
                    "packet source {}/{} is not the counterparty of {port}/{channel}",
                    packet.source_port, packet.source_channel
                ),
            ));
        }
        if packet.timeout_height != 0 && ctx.height() >= packet.timeout_height {
            return Err(ibc_error(
                5,
                format!("packet timed out at height {}", packet.timeout_height),
            ));
        }
        if self.has_receipt(ctx, port, channel, packet.sequence)? {
            return Err(ibc_error(
                6,
                format!("packet {port}/{channel}/{} already received", packet.sequence),
            ));
        }
        ctx.kv(&self.key)?.set_json(
            &Self::packet_key(RECEIPT_PREFIX, port, channel, packet.sequence),
            &hex::encode(sha256(&packet.data)),
        )?;

        let (owner, callbacks) = self.port_callbacks(ctx, port)?;
        let ack = callbacks.on_recv_packet(ctx, packet)?;

        ctx.kv(&self.key)?.set_json(
            &Self::packet_key(ACK_PREFIX, port, channel, packet.sequence),
            &hex::encode(sha256(&ack)),
        )?;
        ctx.emit(packet_event("recv_packet", packet));
        ctx.emit(
            Event::new("write_acknowledgement")
                .attr("packet_sequence", packet.sequence)
                .attr("packet_ack", String::from_utf8_lossy(&ack)),
        );
        debug!(port, channel, sequence = packet.sequence, module = %owner, "[ibc] packet received");
        Ok(ack)
    }

    /// Check that `packet` is one this chain sent on its source channel and
    /// has not been settled yet.
    fn verify_sent(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<()> {
        let port = packet.source_port.as_str();
        let channel = packet.source_channel.as_str();
        let chan = self.require_channel(ctx, port, channel)?;
        if chan.counterparty_port_id != packet.destination_port
            || chan.counterparty_channel_id != packet.destination_channel
        {
            return Err(ibc_error(
                7,
                format!(
                    "packet destination {}/{} is not the counterparty of {port}/{channel}",
                    packet.destination_port, packet.destination_channel
                ),
            ));
        }
        let commitment = self
            .packet_commitment(ctx, port, channel, packet.sequence)?
            .ok_or_else(|| {
                ibc_error(
                    9,
                    format!("no commitment for packet {port}/{channel}/{}", packet.sequence),
                )
            })?;
        if commitment != hex::encode(sha256(&packet.data)) {
            return Err(ibc_error(
                10,
                format!("packet {port}/{channel}/{} does not match its commitment", packet.sequence),
            ));
        }
        Ok(())
    }

    fn delete_commitment(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<()> {
        ctx.kv(&self.key)?.delete(&Self::packet_key(
            COMMITMENT_PREFIX,
            &packet.source_port,
            &packet.source_channel,
            packet.sequence,
        ))?;
        Ok(())
    }

    /// Settle a sent packet with the acknowledgement the counterparty wrote.
    pub fn acknowledge_packet(
        &self,
        ctx: &mut Context,
        packet: &Packet,
        acknowledgement: &[u8],
    ) -> ModuleResult<()> {
        self.verify_sent(ctx, packet)?;
        let ack: Acknowledgement = serde_json::from_slice(acknowledgement)
            .map_err(|e| ibc_error(12, format!("malformed acknowledgement: {e}")))?;
        self.delete_commitment(ctx, packet)?;

        let (owner, callbacks) = self.port_callbacks(ctx, &packet.source_port)?;
        callbacks.on_acknowledgement_packet(ctx, packet, &ack)?;
        ctx.emit(packet_event("acknowledge_packet", packet).attr("success", ack.is_success()));
        debug!(
            port = %packet.source_port,
            channel = %packet.source_channel,
            sequence = packet.sequence,
            success = ack.is_success(),
            module = %owner,
            "[ibc] packet acknowledged"
        );
        Ok(())
    }

    /// Settle a sent packet the counterparty never received.
    /// `proof_height` is the counterparty height the relayer vouches for.
    pub fn timeout_packet(&self, ctx: &mut Context, packet: &Packet, proof_height: u64) -> ModuleResult<()> {
        self.verify_sent(ctx, packet)?;
        if packet.timeout_height == 0 || proof_height < packet.timeout_height {
            return Err(ibc_error(
                11,
                format!(
                    "packet timeout height {} not reached at counterparty height {proof_height}",
                    packet.timeout_height
                ),
            ));
        }
        self.delete_commitment(ctx, packet)?;

        let (owner, callbacks) = self.port_callbacks(ctx, &packet.source_port)?;
        callbacks.on_timeout_packet(ctx, packet)?;
        ctx.emit(packet_event("timeout_packet", packet));
        info!(
            port = %packet.source_port,
            channel = %packet.source_channel,
            sequence = packet.sequence,
            module = %owner,
            "[ibc] packet timed out"
        );
        Ok(())
    }

    fn packet_states(&self, ctx: &mut Context, prefix: &str) -> ModuleResult<Vec<PacketState>> {
        let scan = format!("{prefix}/");
        ctx.kv(&self.key)?
            .prefix_iter_json::<String>(scan.as_bytes())?
            .into_iter()
            .map(|(key, hash)| {
                let rest = String::from_utf8_lossy(&key[scan.len()..]).into_owned();
                let mut parts = rest.splitn(3, '/');
                let (Some(port_id), Some(channel_id), Some(sequence)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(ModuleError::InvalidRequest(format!("malformed packet key {rest}")));
                };
                let sequence = sequence
                    .parse()
                    .map_err(|_| ModuleError::InvalidRequest(format!("malformed packet key {rest}")))?;
                Ok(PacketState {
                    port_id: port_id.to_string(),
                    channel_id: channel_id.to_string(),
                    sequence,
                    hash,
                })
            })
            .collect()
    }
}

fn packet_event(kind: &str, packet: &Packet) -> Event {
    Event::new(kind)
        .attr("packet_src_port", &packet.source_port)
        .attr("packet_src_channel", &packet.source_channel)
        .attr("packet_dst_port", &packet.destination_port)
        .attr("packet_dst_channel", &packet.destination_channel)
        .attr("packet_sequence", packet.sequence)
        .attr("packet_timeout_height", packet.timeout_height)
        .attr("packet_data", String::from_utf8_lossy(&packet.data))
}

// =============================================================================
// MODULE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketState {
    pub port_id: String,
    pub channel_id: String,
    pub sequence: u64,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    pub port_id: String,
    pub channel_id: String,
    pub sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbcGenesis {
    #[serde(default)]
    pub next_channel_sequence: u64,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub send_sequences: Vec<SequenceState>,
    #[serde(default)]
    pub commitments: Vec<PacketState>,
    #[serde(default)]
    pub receipts: Vec<PacketState>,
    #[serde(default)]
    pub acknowledgements: Vec<PacketState>,
}

pub struct IbcCoreModule {
    keeper: Arc<IbcKeeper>,
}

impl IbcCoreModule {
    pub fn new(keeper: Arc<IbcKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for IbcCoreModule {
    fn name(&self) -> &'static str {
        names::IBC
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::IBC, &IbcGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: IbcGenesis = decode_genesis(names::IBC, genesis)?;
        for channel in &genesis.channels {
            if channel.port_id.is_empty() || channel.channel_id.is_empty() {
                return Err(ModuleError::InvalidGenesis("channel with empty identifier".into()));
            }
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: IbcGenesis = decode_genesis(names::IBC, genesis)?;
        let keeper = &self.keeper;
        ctx.kv(&keeper.key)?
            .set_json(NEXT_CHANNEL_SEQUENCE, &genesis.next_channel_sequence)?;
        for channel in &genesis.channels {
            keeper.set_channel(ctx, channel)?;
            keeper
                .scope
                .new_capability(ctx, &channel_capability_name(&channel.port_id, &channel.channel_id))
                .map_err(capability_error)?;
        }
        let mut kv = ctx.kv(&keeper.key)?;
        for seq in &genesis.send_sequences {
            kv.set_json(
                format!("{SEQ_SEND_PREFIX}/{}/{}", seq.port_id, seq.channel_id).as_bytes(),
                &seq.sequence,
            )?;
        }
        for (prefix, states) in [
            (COMMITMENT_PREFIX, &genesis.commitments),
            (RECEIPT_PREFIX, &genesis.receipts),
            (ACK_PREFIX, &genesis.acknowledgements),
        ] {
            for state in states {
                kv.set_json(
                    &IbcKeeper::packet_key(prefix, &state.port_id, &state.channel_id, state.sequence),
                    &state.hash,
                )?;
            }
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let keeper = &self.keeper;
        let channels = keeper.channels(ctx)?;
        let mut send_sequences = Vec::new();
        for channel in &channels {
            send_sequences.push(SequenceState {
                port_id: channel.port_id.clone(),
                channel_id: channel.channel_id.clone(),
                sequence: keeper.next_sequence_send(ctx, &channel.port_id, &channel.channel_id)?,
            });
        }
        let genesis = IbcGenesis {
            next_channel_sequence: ctx.kv(&keeper.key)?.get_json(NEXT_CHANNEL_SEQUENCE)?.unwrap_or(0),
            channels,
            send_sequences,
            commitments: keeper.packet_states(ctx, COMMITMENT_PREFIX)?,
            receipts: keeper.packet_states(ctx, RECEIPT_PREFIX)?,
            acknowledgements: keeper.packet_states(ctx, ACK_PREFIX)?,
        };
        encode_genesis(names::IBC, &genesis)
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::IBC)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::ChannelOpenInit(m) => self.keeper.channel_open_init(ctx, m).map(|_| ()),
            Msg::RecvPacket(m) => self.keeper.recv_packet(ctx, &m.packet).map(|_| ()),
            Msg::Acknowledgement(m) => self.keeper.acknowledge_packet(ctx, &m.packet, &m.acknowledgement),
            Msg::Timeout(m) => self.keeper.timeout_packet(ctx, &m.packet, m.proof_height),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::IBC)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["channels"] => to_json(&self.keeper.channels(ctx)?),
            ["channel", port, channel] => to_json(&self.keeper.channel(ctx, port, channel)?),
            ["port_owner", port] => to_json(&self.keeper.port_owner(ctx, port)?),
            _ => Err(ModuleError::UnknownRoute(format!("ibc/{path}"))),
        }
    }
}
