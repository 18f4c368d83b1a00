//! # Transfer
//!
//! Fungible token transfer over IBC channels bound to the `transfer` port.
//!
//! A token leaving the chain where it originated is escrowed in a per-channel
//! escrow account; a voucher returning home is burned. On receipt the
//! reverse happens: returning tokens are released from escrow, foreign tokens
//! are minted as vouchers named `ibc/<sha256(trace)>` where the trace is
//! `<port>/<channel>/<denom>` as seen from this chain.
//!
//! A sent packet that comes back with an error acknowledgement, or times
//! out, refunds the sender: escrowed tokens are released and burned
//! vouchers are minted again.

use crate::bank::BankKeeper;
use crate::codec::{decode_genesis, encode_genesis, to_json};
use crate::ibc::{
    capability_error, channel_capability_name, Acknowledgement, Channel, IbcKeeper, IbcModule,
};
use crate::supply::SupplyKeeper;
use ls_01_store::{Context, StoreKey};
use ls_02_capability::{Capability, ScopedCapabilityKeeper};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::coins::amount_string;
use shared_types::{names, sha256, Address, Coin, Coins, Event, Msg, MsgTransfer, Packet, ValidatorUpdate};
use std::sync::Arc;
use tracing::{info, warn};

pub const PORT_ID: &str = "transfer";
pub const VERSION: &str = "ics20-1";
const TRACE_PREFIX: &str = "denom_traces";

/// Wire payload of a transfer packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleTokenPacketData {
    /// Full trace of the token as known by the sender.
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
    pub sender: String,
    pub receiver: String,
}

/// Local denom of the voucher for `trace`.
pub fn voucher_denom(trace: &str) -> String {
    format!("ibc/{}", hex::encode(sha256(trace.as_bytes())))
}

/// Account holding tokens escrowed on `port/channel`.
pub fn escrow_address(port: &str, channel: &str) -> Address {
    Address::module(&format!("{PORT_ID}/escrow/{port}/{channel}"))
}

pub struct TransferKeeper {
    key: StoreKey,
    scope: ScopedCapabilityKeeper,
    ibc: Arc<IbcKeeper>,
    bank: Arc<BankKeeper>,
    supply: Arc<SupplyKeeper>,
}

impl TransferKeeper {
    pub fn new(
        key: StoreKey,
        scope: ScopedCapabilityKeeper,
        ibc: Arc<IbcKeeper>,
        bank: Arc<BankKeeper>,
        supply: Arc<SupplyKeeper>,
    ) -> Self {
        Self {
            key,
            scope,
            ibc,
            bank,
            supply,
        }
    }

    /// Bind the transfer port unless it already is.
    pub fn bind_port(&self, ctx: &mut Context) -> ModuleResult<()> {
        if self.ibc.is_bound(ctx, PORT_ID)? {
            return Ok(());
        }
        self.ibc.bind_port(ctx, PORT_ID, &self.scope).map(|_| ())
    }

    fn trace_key(denom: &str) -> Vec<u8> {
        format!("{TRACE_PREFIX}/{denom}").into_bytes()
    }

    /// Full trace behind a voucher denom.
    pub fn denom_trace(&self, ctx: &mut Context, denom: &str) -> ModuleResult<Option<String>> {
        Ok(ctx.kv(&self.key)?.get_json(&Self::trace_key(denom))?)
    }

    fn set_denom_trace(&self, ctx: &mut Context, trace: &str) -> ModuleResult<String> {
        let denom = voucher_denom(trace);
        ctx.kv(&self.key)?.set_json(&Self::trace_key(&denom), &trace)?;
        Ok(denom)
    }

    pub fn denom_traces(&self, ctx: &mut Context) -> ModuleResult<Vec<String>> {
        let prefix = format!("{TRACE_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<String>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, trace)| trace)
            .collect())
    }

    fn channel_capability(&self, ctx: &mut Context, port: &str, channel: &str) -> ModuleResult<Capability> {
        self.scope
            .lookup_capability(ctx, &channel_capability_name(port, channel))
            .map_err(capability_error)?
            .ok_or_else(|| {
                ModuleError::Unauthorized(format!("transfer does not own channel {port}/{channel}"))
            })
    }

    /// Escrow or burn the token, then send the packet.
    pub fn send_transfer(&self, ctx: &mut Context, msg: &MsgTransfer) -> ModuleResult<Packet> {
        let port = msg.source_port.as_str();
        let channel = msg.source_channel.as_str();
        let cap = self.channel_capability(ctx, port, channel)?;

        let trace = if msg.token.denom.starts_with("ibc/") {
            self.denom_trace(ctx, &msg.token.denom)?.ok_or_else(|| {
                ModuleError::custom(names::TRANSFER, 2, format!("unknown voucher {}", msg.token.denom))
            })?
        } else {
            msg.token.denom.clone()
        };
        let coins = Coins::from_coin(msg.token.clone());

        if trace.starts_with(&format!("{port}/{channel}/")) {
            // Voucher going back to where it came from.
            self.supply
                .send_coins_from_account_to_module(ctx, msg.sender, names::TRANSFER, &coins)?;
            self.supply.burn_coins(ctx, names::TRANSFER, &coins)?;
        } else {
            self.bank
                .send_coins(ctx, msg.sender, escrow_address(port, channel), &coins)?;
        }

        let data = FungibleTokenPacketData {
            denom: trace,
            amount: msg.token.amount,
            sender: msg.sender.to_string(),
            receiver: msg.receiver.clone(),
        };
        let bytes = serde_json::to_vec(&data).map_err(|e| ModuleError::InvalidRequest(e.to_string()))?;
        let packet = self
            .ibc
            .send_packet(ctx, &cap, port, channel, bytes, msg.timeout_height)?;
        ctx.emit(
            Event::new("ibc_transfer")
                .attr("sender", msg.sender)
                .attr("receiver", &msg.receiver)
                .attr("amount", &msg.token),
        );
        info!(
            sender = %msg.sender,
            port,
            channel,
            token = %msg.token,
            sequence = packet.sequence,
            "[transfer] tokens sent"
        );
        Ok(packet)
    }

    /// Undo the escrow or burn of a sent packet.
    fn refund(&self, ctx: &mut Context, packet: &Packet, reason: &str) -> ModuleResult<()> {
        let data: FungibleTokenPacketData = serde_json::from_slice(&packet.data).map_err(|e| {
            ModuleError::custom(names::TRANSFER, 4, format!("malformed packet data: {e}"))
        })?;
        let sender: Address = data
            .sender
            .parse()
            .map_err(|_| ModuleError::UnknownAddress(data.sender.clone()))?;
        let port = packet.source_port.as_str();
        let channel = packet.source_channel.as_str();

        if data.denom.starts_with(&format!("{port}/{channel}/")) {
            let coins = Coins::from_coin(Coin::new(voucher_denom(&data.denom), data.amount));
            self.supply.mint_coins(ctx, names::TRANSFER, &coins)?;
            self.supply
                .send_coins_from_module_to_account(ctx, names::TRANSFER, sender, &coins)?;
        } else {
            let denom = if data.denom.contains('/') {
                voucher_denom(&data.denom)
            } else {
                data.denom.clone()
            };
            let coins = Coins::from_coin(Coin::new(denom, data.amount));
            self.bank
                .send_coins(ctx, escrow_address(port, channel), sender, &coins)?;
        }

        ctx.emit(
            Event::new("fungible_token_refund")
                .attr("sender", sender)
                .attr("denom", &data.denom)
                .attr("amount", data.amount)
                .attr("reason", reason),
        );
        info!(
            sender = %sender,
            port,
            channel,
            sequence = packet.sequence,
            reason,
            "[transfer] tokens refunded"
        );
        Ok(())
    }

    fn receive(&self, ctx: &mut Context, packet: &Packet, data: &FungibleTokenPacketData) -> ModuleResult<()> {
        let receiver: Address = data
            .receiver
            .parse()
            .map_err(|_| ModuleError::UnknownAddress(data.receiver.clone()))?;
        if self.bank.is_blocked(&receiver) {
            return Err(ModuleError::Unauthorized(format!("{receiver} cannot receive transfers")));
        }

        let source_prefix = format!("{}/{}/", packet.source_port, packet.source_channel);
        if let Some(unprefixed) = data.denom.strip_prefix(&source_prefix) {
            // The token originated here: release it from escrow.
            let denom = if unprefixed.contains('/') {
                voucher_denom(unprefixed)
            } else {
                unprefixed.to_string()
            };
            let coins = Coins::from_coin(Coin::new(denom, data.amount));
            let escrow = escrow_address(&packet.destination_port, &packet.destination_channel);
            self.bank.send_coins(ctx, escrow, receiver, &coins)
        } else {
            let trace = format!(
                "{}/{}/{}",
                packet.destination_port, packet.destination_channel, data.denom
            );
            let denom = self.set_denom_trace(ctx, &trace)?;
            let coins = Coins::from_coin(Coin::new(denom, data.amount));
            self.supply.mint_coins(ctx, names::TRANSFER, &coins)?;
            self.supply
                .send_coins_from_module_to_account(ctx, names::TRANSFER, receiver, &coins)
        }
    }
}

impl IbcModule for TransferKeeper {
    fn on_chan_open_init(&self, ctx: &mut Context, channel: &Channel, capability: &Capability) -> ModuleResult<()> {
        if channel.version != VERSION {
            return Err(ModuleError::custom(
                names::TRANSFER,
                3,
                format!("channel version must be {VERSION}, got {}", channel.version),
            ));
        }
        self.scope
            .claim_capability(
                ctx,
                capability,
                &channel_capability_name(&channel.port_id, &channel.channel_id),
            )
            .map_err(capability_error)
    }

    /// A failed receipt is acknowledged with an error instead of failing the
    /// relay, and leaves no state behind.
    fn on_recv_packet(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<Vec<u8>> {
        let data: FungibleTokenPacketData = match serde_json::from_slice(&packet.data) {
            Ok(data) => data,
            Err(e) => return Acknowledgement::Error(format!("malformed packet data: {e}")).to_bytes(),
        };
        let mut branch = ctx.branch();
        let ack = match self.receive(&mut branch, packet, &data) {
            Ok(()) => {
                ctx.write_branch(branch);
                Acknowledgement::success()
            }
            Err(e) if e.is_out_of_gas() => return Err(e),
            Err(e) => {
                ctx.discard_branch(branch);
                warn!(sequence = packet.sequence, error = %e, "[transfer] receive failed");
                Acknowledgement::Error(e.to_string())
            }
        };
        ctx.emit(
            Event::new("fungible_token_packet")
                .attr("receiver", &data.receiver)
                .attr("denom", &data.denom)
                .attr("amount", data.amount)
                .attr("success", ack.is_success()),
        );
        ack.to_bytes()
    }

    fn on_acknowledgement_packet(
        &self,
        ctx: &mut Context,
        packet: &Packet,
        acknowledgement: &Acknowledgement,
    ) -> ModuleResult<()> {
        match acknowledgement {
            Acknowledgement::Result(_) => Ok(()),
            Acknowledgement::Error(reason) => {
                warn!(sequence = packet.sequence, %reason, "[transfer] counterparty rejected packet");
                self.refund(ctx, packet, "error acknowledgement")
            }
        }
    }

    fn on_timeout_packet(&self, ctx: &mut Context, packet: &Packet) -> ModuleResult<()> {
        self.refund(ctx, packet, "timeout")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferGenesis {
    pub port_id: String,
    #[serde(default)]
    pub denom_traces: Vec<String>,
}

impl Default for TransferGenesis {
    fn default() -> Self {
        Self {
            port_id: PORT_ID.to_string(),
            denom_traces: Vec::new(),
        }
    }
}

pub struct TransferModule {
    keeper: Arc<TransferKeeper>,
}

impl TransferModule {
    pub fn new(keeper: Arc<TransferKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for TransferModule {
    fn name(&self) -> &'static str {
        names::TRANSFER
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::TRANSFER, &TransferGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: TransferGenesis = decode_genesis(names::TRANSFER, genesis)?;
        if genesis.port_id != PORT_ID {
            return Err(ModuleError::InvalidGenesis(format!(
                "transfer port must be {PORT_ID}, got {}",
                genesis.port_id
            )));
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: TransferGenesis = decode_genesis(names::TRANSFER, genesis)?;
        self.keeper.bind_port(ctx)?;
        for trace in &genesis.denom_traces {
            self.keeper.set_denom_trace(ctx, trace)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = TransferGenesis {
            port_id: PORT_ID.to_string(),
            denom_traces: self.keeper.denom_traces(ctx)?,
        };
        encode_genesis(names::TRANSFER, &genesis)
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::TRANSFER)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::Transfer(m) => self.keeper.send_transfer(ctx, m).map(|_| ()),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::TRANSFER)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        let parts: Vec<&str> = path.split('/').collect();
        match parts.as_slice() {
            ["denom_trace", "ibc", hash] => {
                to_json(&self.keeper.denom_trace(ctx, &format!("ibc/{hash}"))?)
            }
            ["denom_traces"] => to_json(&self.keeper.denom_traces(ctx)?),
            ["escrow_address", port, channel] => to_json(&escrow_address(port, channel)),
            _ => Err(ModuleError::UnknownRoute(format!("transfer/{path}"))),
        }
    }
}
