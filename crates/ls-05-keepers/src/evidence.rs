//! # Evidence
//!
//! Stores submitted misbehaviour and punishes it. An `Equivocation` (double
//! sign) slashes the validator by the double-sign fraction, jails it and
//! tombstones its signing info. Evidence is keyed by its hash, so the same
//! equivocation cannot be submitted twice.

use crate::codec::{decode_genesis, encode_genesis, to_json};
use crate::slashing::SlashingKeeper;
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, sha256, Equivocation, Event, Msg, ValidatorUpdate};
use std::sync::Arc;
use tracing::info;

const EVIDENCE_PREFIX: &str = "evidence";

/// Evidence older than this many blocks is rejected.
pub const MAX_EVIDENCE_AGE: u64 = 100_000;

pub fn evidence_hash(evidence: &Equivocation) -> ModuleResult<String> {
    let bytes = serde_json::to_vec(evidence).map_err(|e| ModuleError::InvalidRequest(e.to_string()))?;
    Ok(hex::encode(sha256(&bytes)))
}

pub struct EvidenceKeeper {
    key: StoreKey,
    slashing: Arc<SlashingKeeper>,
}

impl EvidenceKeeper {
    pub fn new(key: StoreKey, slashing: Arc<SlashingKeeper>) -> Self {
        Self { key, slashing }
    }

    fn evidence_key(hash: &str) -> Vec<u8> {
        format!("{EVIDENCE_PREFIX}/{hash}").into_bytes()
    }

    pub fn evidence(&self, ctx: &mut Context, hash: &str) -> ModuleResult<Option<Equivocation>> {
        Ok(ctx.kv(&self.key)?.get_json(&Self::evidence_key(hash))?)
    }

    pub fn all_evidence(&self, ctx: &mut Context) -> ModuleResult<Vec<Equivocation>> {
        let prefix = format!("{EVIDENCE_PREFIX}/");
        Ok(ctx
            .kv(&self.key)?
            .prefix_iter_json::<Equivocation>(prefix.as_bytes())?
            .into_iter()
            .map(|(_, e)| e)
            .collect())
    }

    fn store(&self, ctx: &mut Context, hash: &str, evidence: &Equivocation) -> ModuleResult<()> {
        ctx.kv(&self.key)?.set_json(&Self::evidence_key(hash), evidence)?;
        Ok(())
    }

    /// Record and punish an equivocation. Returns the evidence hash.
    pub fn submit_evidence(&self, ctx: &mut Context, evidence: &Equivocation) -> ModuleResult<String> {
        let hash = evidence_hash(evidence)?;
        if self.evidence(ctx, &hash)?.is_some() {
            return Err(ModuleError::custom(
                names::EVIDENCE,
                3,
                format!("evidence {hash} already submitted"),
            ));
        }
        if evidence.height > ctx.height() {
            return Err(ModuleError::custom(
                names::EVIDENCE,
                4,
                format!("evidence height {} is in the future", evidence.height),
            ));
        }
        if ctx.height() - evidence.height > MAX_EVIDENCE_AGE {
            return Err(ModuleError::custom(
                names::EVIDENCE,
                5,
                format!("evidence from height {} is too old", evidence.height),
            ));
        }
        let consensus = evidence.consensus_address;
        if self
            .slashing
            .staking()
            .validator_by_consensus(ctx, &consensus)?
            .is_none()
        {
            return Err(ModuleError::custom(
                names::EVIDENCE,
                6,
                format!("no validator with consensus address {consensus}"),
            ));
        }

        self.store(ctx, &hash, evidence)?;
        let punished = self
            .slashing
            .slash_double_sign(ctx, consensus, evidence.height, evidence.power)?;
        ctx.emit(
            Event::new("submit_evidence")
                .attr("evidence_hash", &hash)
                .attr("validator", consensus)
                .attr("punished", punished),
        );
        info!(%consensus, height = evidence.height, %hash, punished, "[evidence] equivocation handled");
        Ok(hash)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceGenesis {
    #[serde(default)]
    pub evidence: Vec<Equivocation>,
}

pub struct EvidenceModule {
    keeper: Arc<EvidenceKeeper>,
}

impl EvidenceModule {
    pub fn new(keeper: Arc<EvidenceKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for EvidenceModule {
    fn name(&self) -> &'static str {
        names::EVIDENCE
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::EVIDENCE, &EvidenceGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: EvidenceGenesis = decode_genesis(names::EVIDENCE, genesis)?;
        if genesis.evidence.iter().any(|e| e.height == 0) {
            return Err(ModuleError::InvalidGenesis("evidence height must be positive".into()));
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: EvidenceGenesis = decode_genesis(names::EVIDENCE, genesis)?;
        for evidence in &genesis.evidence {
            let hash = evidence_hash(evidence)?;
            self.keeper.store(ctx, &hash, evidence)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = EvidenceGenesis {
            evidence: self.keeper.all_evidence(ctx)?,
        };
        encode_genesis(names::EVIDENCE, &genesis)
    }

    fn route(&self) -> Option<&'static str> {
        Some(names::EVIDENCE)
    }

    fn handle_msg(&self, ctx: &mut Context, msg: &Msg) -> ModuleResult<()> {
        match msg {
            Msg::SubmitEvidence(m) => self.keeper.submit_evidence(ctx, &m.evidence).map(|_| ()),
            other => Err(ModuleError::UnknownRoute(other.type_name().to_string())),
        }
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::EVIDENCE)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path.split_once('/') {
            Some(("evidence", hash)) => to_json(&self.keeper.evidence(ctx, hash)?),
            None if path == "all" => to_json(&self.keeper.all_evidence(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("evidence/{path}"))),
        }
    }
}
