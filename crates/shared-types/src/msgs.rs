//! # Messages
//!
//! Every state-changing message the application accepts. `Msg` is a tagged
//! enum so the wire form names its type (`"bank/MsgSend"`), and each variant
//! knows its route (the owning module), its signers, and its stateless checks.

use crate::coins::{valid_denom, Coin, Coins};
use crate::entities::{hex_bytes, Address, PubKey};
use crate::errors::TypesError;
use crate::names;
use serde::{Deserialize, Serialize};

/// Maximum length of free-form text fields (monikers, titles, descriptions).
pub const MAX_TEXT_LEN: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Msg {
    #[serde(rename = "bank/MsgSend")]
    Send(MsgSend),
    #[serde(rename = "staking/MsgCreateValidator")]
    CreateValidator(MsgCreateValidator),
    #[serde(rename = "staking/MsgDelegate")]
    Delegate(MsgDelegate),
    #[serde(rename = "staking/MsgUndelegate")]
    Undelegate(MsgUndelegate),
    #[serde(rename = "distribution/MsgWithdrawValidatorRewards")]
    WithdrawValidatorRewards(MsgWithdrawValidatorRewards),
    #[serde(rename = "slashing/MsgUnjail")]
    Unjail(MsgUnjail),
    #[serde(rename = "gov/MsgSubmitProposal")]
    SubmitProposal(MsgSubmitProposal),
    #[serde(rename = "gov/MsgDeposit")]
    Deposit(MsgDeposit),
    #[serde(rename = "gov/MsgVote")]
    Vote(MsgVote),
    #[serde(rename = "crisis/MsgVerifyInvariant")]
    VerifyInvariant(MsgVerifyInvariant),
    #[serde(rename = "evidence/MsgSubmitEvidence")]
    SubmitEvidence(MsgSubmitEvidence),
    #[serde(rename = "transfer/MsgTransfer")]
    Transfer(MsgTransfer),
    #[serde(rename = "ibc/MsgChannelOpenInit")]
    ChannelOpenInit(MsgChannelOpenInit),
    #[serde(rename = "ibc/MsgRecvPacket")]
    RecvPacket(MsgRecvPacket),
    #[serde(rename = "ibc/MsgAcknowledgement")]
    Acknowledgement(MsgAcknowledgement),
    #[serde(rename = "ibc/MsgTimeout")]
    Timeout(MsgTimeout),
    #[serde(rename = "vmbridge/MsgDeliverInbound")]
    DeliverInbound(MsgDeliverInbound),
}

impl Msg {
    /// Name of the module whose handler processes this message.
    pub fn route(&self) -> &'static str {
        match self {
            Msg::Send(_) => names::BANK,
            Msg::CreateValidator(_) | Msg::Delegate(_) | Msg::Undelegate(_) => names::STAKING,
            Msg::WithdrawValidatorRewards(_) => names::DISTRIBUTION,
            Msg::Unjail(_) => names::SLASHING,
            Msg::SubmitProposal(_) | Msg::Deposit(_) | Msg::Vote(_) => names::GOV,
            Msg::VerifyInvariant(_) => names::CRISIS,
            Msg::SubmitEvidence(_) => names::EVIDENCE,
            Msg::Transfer(_) => names::TRANSFER,
            Msg::ChannelOpenInit(_)
            | Msg::RecvPacket(_)
            | Msg::Acknowledgement(_)
            | Msg::Timeout(_) => names::IBC,
            Msg::DeliverInbound(_) => names::VM_BRIDGE,
        }
    }

    /// Short type name used in events and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Msg::Send(_) => "send",
            Msg::CreateValidator(_) => "create_validator",
            Msg::Delegate(_) => "delegate",
            Msg::Undelegate(_) => "undelegate",
            Msg::WithdrawValidatorRewards(_) => "withdraw_validator_rewards",
            Msg::Unjail(_) => "unjail",
            Msg::SubmitProposal(_) => "submit_proposal",
            Msg::Deposit(_) => "deposit",
            Msg::Vote(_) => "vote",
            Msg::VerifyInvariant(_) => "verify_invariant",
            Msg::SubmitEvidence(_) => "submit_evidence",
            Msg::Transfer(_) => "transfer",
            Msg::ChannelOpenInit(_) => "channel_open_init",
            Msg::RecvPacket(_) => "recv_packet",
            Msg::Acknowledgement(_) => "acknowledge_packet",
            Msg::Timeout(_) => "timeout_packet",
            Msg::DeliverInbound(_) => "deliver_inbound",
        }
    }

    /// Addresses that must sign a transaction carrying this message.
    pub fn signers(&self) -> Vec<Address> {
        let signer = match self {
            Msg::Send(m) => m.from,
            Msg::CreateValidator(m) => m.operator,
            Msg::Delegate(m) => m.delegator,
            Msg::Undelegate(m) => m.delegator,
            Msg::WithdrawValidatorRewards(m) => m.operator,
            Msg::Unjail(m) => m.operator,
            Msg::SubmitProposal(m) => m.proposer,
            Msg::Deposit(m) => m.depositor,
            Msg::Vote(m) => m.voter,
            Msg::VerifyInvariant(m) => m.sender,
            Msg::SubmitEvidence(m) => m.submitter,
            Msg::Transfer(m) => m.sender,
            Msg::ChannelOpenInit(m) => m.signer,
            Msg::RecvPacket(m) => m.relayer,
            Msg::Acknowledgement(m) => m.relayer,
            Msg::Timeout(m) => m.relayer,
            Msg::DeliverInbound(m) => m.submitter,
        };
        vec![signer]
    }

    /// Stateless validation performed before any state is read.
    pub fn validate_basic(&self) -> Result<(), TypesError> {
        match self {
            Msg::Send(m) => {
                require_positive(&m.amount, "send amount")?;
                Ok(())
            }
            Msg::CreateValidator(m) => {
                require_text(&m.moniker, "moniker")?;
                require_coin(&m.self_delegation, "self delegation")
            }
            Msg::Delegate(m) => require_coin(&m.amount, "delegation amount"),
            Msg::Undelegate(m) => require_coin(&m.amount, "undelegation amount"),
            Msg::WithdrawValidatorRewards(_) | Msg::Unjail(_) => Ok(()),
            Msg::SubmitProposal(m) => m.content.validate_basic(),
            Msg::Deposit(m) => require_positive(&m.amount, "deposit"),
            Msg::Vote(_) => Ok(()),
            Msg::VerifyInvariant(m) => {
                if m.module.is_empty() || m.route.is_empty() {
                    return Err(invalid("invariant module and route must be set"));
                }
                Ok(())
            }
            Msg::SubmitEvidence(m) => {
                if m.evidence.height == 0 {
                    return Err(invalid("evidence height must be positive"));
                }
                Ok(())
            }
            Msg::Transfer(m) => {
                require_coin(&m.token, "transfer token")?;
                require_identifier(&m.source_port, "source port")?;
                require_identifier(&m.source_channel, "source channel")?;
                if m.receiver.is_empty() {
                    return Err(invalid("receiver must be set"));
                }
                Ok(())
            }
            Msg::ChannelOpenInit(m) => {
                require_identifier(&m.port_id, "port")?;
                require_identifier(&m.counterparty_port_id, "counterparty port")
            }
            Msg::RecvPacket(m) => {
                if m.packet.sequence == 0 {
                    return Err(invalid("packet sequence must be positive"));
                }
                require_identifier(&m.packet.destination_port, "destination port")?;
                require_identifier(&m.packet.destination_channel, "destination channel")
            }
            Msg::Acknowledgement(m) => {
                require_outgoing(&m.packet)?;
                if m.acknowledgement.is_empty() {
                    return Err(invalid("acknowledgement must be set"));
                }
                Ok(())
            }
            Msg::Timeout(m) => {
                require_outgoing(&m.packet)?;
                if m.packet.timeout_height == 0 {
                    return Err(invalid("packet without a timeout height cannot time out"));
                }
                Ok(())
            }
            Msg::DeliverInbound(m) => {
                if m.peer.is_empty() {
                    return Err(invalid("peer must be set"));
                }
                if m.messages.is_empty() {
                    return Err(invalid("at least one inbound message is required"));
                }
                Ok(())
            }
        }
    }

    /// True for messages a relayer submits on behalf of another chain.
    pub fn is_relay(&self) -> bool {
        matches!(
            self,
            Msg::RecvPacket(_) | Msg::Acknowledgement(_) | Msg::Timeout(_)
        )
    }
}

fn invalid(reason: impl Into<String>) -> TypesError {
    TypesError::InvalidMsg(reason.into())
}

fn require_positive(coins: &Coins, what: &str) -> Result<(), TypesError> {
    if coins.is_zero() {
        return Err(invalid(format!("{what} must be positive")));
    }
    Ok(())
}

fn require_coin(coin: &Coin, what: &str) -> Result<(), TypesError> {
    if coin.amount == 0 || !valid_denom(&coin.denom) {
        return Err(invalid(format!("{what} must be a positive amount of a valid denom")));
    }
    Ok(())
}

fn require_text(text: &str, what: &str) -> Result<(), TypesError> {
    if text.trim().is_empty() || text.len() > MAX_TEXT_LEN {
        return Err(invalid(format!("{what} must be non-empty and at most {MAX_TEXT_LEN} bytes")));
    }
    Ok(())
}

/// A packet this chain sent, coming back with its outcome.
fn require_outgoing(packet: &Packet) -> Result<(), TypesError> {
    if packet.sequence == 0 {
        return Err(invalid("packet sequence must be positive"));
    }
    require_identifier(&packet.source_port, "source port")?;
    require_identifier(&packet.source_channel, "source channel")
}

fn require_identifier(id: &str, what: &str) -> Result<(), TypesError> {
    let ok = (2..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !ok {
        return Err(invalid(format!("{what} identifier {id:?} is malformed")));
    }
    Ok(())
}

// =============================================================================
// BANK / STAKING / DISTRIBUTION / SLASHING
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from: Address,
    pub to: Address,
    pub amount: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateValidator {
    pub operator: Address,
    /// Consensus public key of the new validator.
    pub pubkey: PubKey,
    pub moniker: String,
    pub self_delegation: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegate {
    pub delegator: Address,
    pub validator: Address,
    pub amount: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUndelegate {
    pub delegator: Address,
    pub validator: Address,
    pub amount: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdrawValidatorRewards {
    pub operator: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUnjail {
    pub operator: Address,
}

// =============================================================================
// GOVERNANCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitProposal {
    pub proposer: Address,
    pub content: ProposalContent,
    pub initial_deposit: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeposit {
    pub depositor: Address,
    pub proposal_id: u64,
    pub amount: Coins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVote {
    pub voter: Address,
    pub proposal_id: u64,
    pub option: VoteOption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOption {
    Yes,
    Abstain,
    No,
    NoWithVeto,
}

/// A single parameter change carried by a parameter-change proposal. `value`
/// is the JSON encoding of the new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamChange {
    pub subspace: String,
    pub key: String,
    pub value: String,
}

/// A software upgrade scheduled at a block height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub height: u64,
    #[serde(default)]
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalContent {
    Text {
        title: String,
        description: String,
    },
    ParameterChange {
        title: String,
        description: String,
        changes: Vec<ParamChange>,
    },
    SoftwareUpgrade {
        title: String,
        description: String,
        plan: Plan,
    },
    CancelSoftwareUpgrade {
        title: String,
        description: String,
    },
    CommunityPoolSpend {
        title: String,
        description: String,
        recipient: Address,
        amount: Coins,
    },
}

impl ProposalContent {
    /// Route of the governance handler that executes a passed proposal.
    pub fn route(&self) -> &'static str {
        match self {
            ProposalContent::Text { .. } => names::GOV,
            ProposalContent::ParameterChange { .. } => names::PARAMS,
            ProposalContent::SoftwareUpgrade { .. }
            | ProposalContent::CancelSoftwareUpgrade { .. } => names::UPGRADE,
            ProposalContent::CommunityPoolSpend { .. } => names::DISTRIBUTION,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ProposalContent::Text { title, .. }
            | ProposalContent::ParameterChange { title, .. }
            | ProposalContent::SoftwareUpgrade { title, .. }
            | ProposalContent::CancelSoftwareUpgrade { title, .. }
            | ProposalContent::CommunityPoolSpend { title, .. } => title,
        }
    }

    fn description(&self) -> &str {
        match self {
            ProposalContent::Text { description, .. }
            | ProposalContent::ParameterChange { description, .. }
            | ProposalContent::SoftwareUpgrade { description, .. }
            | ProposalContent::CancelSoftwareUpgrade { description, .. }
            | ProposalContent::CommunityPoolSpend { description, .. } => description,
        }
    }

    pub fn validate_basic(&self) -> Result<(), TypesError> {
        require_text(self.title(), "proposal title")?;
        require_text(self.description(), "proposal description")?;
        match self {
            ProposalContent::ParameterChange { changes, .. } if changes.is_empty() => {
                Err(invalid("parameter change proposal has no changes"))
            }
            ProposalContent::SoftwareUpgrade { plan, .. }
                if plan.name.is_empty() || plan.height == 0 =>
            {
                Err(invalid("upgrade plan needs a name and a positive height"))
            }
            ProposalContent::CommunityPoolSpend { amount, .. } if amount.is_zero() => {
                Err(invalid("community pool spend amount must be positive"))
            }
            _ => Ok(()),
        }
    }
}

// =============================================================================
// CRISIS / EVIDENCE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVerifyInvariant {
    pub sender: Address,
    pub module: String,
    pub route: String,
}

/// A validator signed two conflicting blocks at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equivocation {
    pub height: u64,
    /// Voting power at the infraction height.
    pub power: u64,
    pub consensus_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitEvidence {
    pub submitter: Address,
    pub evidence: Equivocation,
}

// =============================================================================
// IBC / TRANSFER / VM BRIDGE
// =============================================================================

/// A cross-chain packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sequence: u64,
    pub source_port: String,
    pub source_channel: String,
    pub destination_port: String,
    pub destination_channel: String,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Height after which the packet may no longer be received. 0 disables.
    pub timeout_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTransfer {
    pub sender: Address,
    pub source_port: String,
    pub source_channel: String,
    pub token: Coin,
    /// Receiver on the counterparty chain, opaque to this chain.
    pub receiver: String,
    pub timeout_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgChannelOpenInit {
    pub signer: Address,
    pub port_id: String,
    pub counterparty_port_id: String,
    pub counterparty_channel_id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRecvPacket {
    pub relayer: Address,
    pub packet: Packet,
}

/// Outcome of a packet this chain sent, as written by the counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAcknowledgement {
    pub relayer: Address,
    pub packet: Packet,
    #[serde(with = "hex_bytes")]
    pub acknowledgement: Vec<u8>,
}

/// Claim that a packet this chain sent was never received before its
/// timeout height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTimeout {
    pub relayer: Address,
    pub packet: Packet,
    /// Counterparty height at which the packet was still unreceived.
    pub proof_height: u64,
}

/// Messages relayed from an off-chain peer into the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDeliverInbound {
    pub submitter: Address,
    pub peer: String,
    /// `(sequence number, body)` pairs.
    pub messages: Vec<(u64, String)>,
    pub ack: u64,
}
