//! # Lockstep Node
//!
//! Runs the Lockstep application as a single-validator devnet: the binary
//! plays the consensus engine, producing an empty block every
//! `LS_BLOCK_INTERVAL_MS` and driving BeginBlock, EndBlock and Commit.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging, metrics)
//! 2. Load configuration from `LS_*` variables
//! 3. Open the commit store (`LS_HOME`, or memory)
//! 4. Build the application and load the latest committed version
//! 5. InitChain from the genesis document when nothing is committed yet
//! 6. Produce blocks until Ctrl+C or the halt height

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use lockstep_telemetry::{init_telemetry, TelemetryConfig};
use ls_01_store::{CommitStore, FileCommitStore, InMemoryCommitStore};
use ls_03_commit_bridge::InProcessEngine;
use node_runtime::{AppConfig, AppError, GenesisBuilder, GenesisDoc, LockstepApp};
use shared_crypto::Ed25519KeyPair;
use shared_types::{sha256, Address, BlockHeader, RequestBeginBlock, RequestEndBlock};

/// The devnet validator key is derived from the chain id so restarts of the
/// same chain reuse it.
fn devnet_key(chain_id: &str) -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed(sha256(chain_id.as_bytes()))
}

fn load_genesis(config: &AppConfig, validator: &Ed25519KeyPair) -> Result<GenesisDoc> {
    match &config.storage.genesis_file {
        Some(path) => {
            let doc = GenesisDoc::load(path)
                .with_context(|| format!("Failed to load genesis from {}", path.display()))?;
            if doc.chain_id != config.chain.chain_id {
                anyhow::bail!(
                    "genesis chain id {} does not match configured {}",
                    doc.chain_id,
                    config.chain.chain_id
                );
            }
            Ok(doc)
        }
        None => {
            let doc = GenesisBuilder::devnet(&config.chain.chain_id, validator)
                .context("Failed to build devnet genesis")?;
            if let Some(home) = &config.storage.home {
                let path = home.join("genesis.json");
                doc.save(&path).context("Failed to write devnet genesis")?;
                info!(path = %path.display(), "[node] devnet genesis written");
            }
            Ok(doc)
        }
    }
}

fn open_commit_store(config: &AppConfig) -> Result<Arc<dyn CommitStore>> {
    match &config.storage.home {
        Some(home) => {
            let store = FileCommitStore::open(home.join("data"))
                .with_context(|| format!("Failed to open commit store under {}", home.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("[node] LS_HOME not set, committed state is kept in memory");
            Ok(Arc::new(InMemoryCommitStore::new()))
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Drives the application the way a consensus engine would.
struct NodeRuntime {
    app: LockstepApp,
    proposer: Address,
    interval: Duration,
}

impl NodeRuntime {
    fn new(config: AppConfig) -> Result<Self> {
        let validator = devnet_key(&config.chain.chain_id);
        let interval = Duration::from_millis(config.blocks.interval_ms);
        let store = open_commit_store(&config)?;
        let engine = Arc::new(InProcessEngine::new());

        let mut app = LockstepApp::new(config.clone(), engine, store, true)
            .context("Failed to build application")?;

        if app.last_block_height() == 0 {
            let genesis = load_genesis(&config, &validator)?;
            let request = genesis.init_chain_request()?;
            let response = app.init_chain(&request).context("InitChain failed")?;
            info!(
                validators = response.validators.len(),
                app_hash = %hex::encode(response.app_hash),
                "[node] chain initialized"
            );
        }

        Ok(Self {
            app,
            proposer: validator.address(),
            interval,
        })
    }

    fn produce_block(&mut self) -> Result<u64, AppError> {
        let height = self.app.last_block_height() + 1;
        let header = BlockHeader {
            chain_id: self.app.chain_id().to_string(),
            height,
            time: unix_now(),
            proposer: self.proposer,
        };
        self.app.begin_block(&RequestBeginBlock {
            header,
            last_commit_votes: Vec::new(),
        })?;
        let end = self.app.end_block(&RequestEndBlock { height })?;
        if !end.validator_updates.is_empty() {
            info!(height, updates = end.validator_updates.len(), "[node] validator set changed");
        }
        Ok(self.app.commit()?.height)
    }

    async fn run(&mut self) -> Result<()> {
        info!("===========================================");
        info!("  Lockstep Node v{}", env!("CARGO_PKG_VERSION"));
        info!("  Chain: {}", self.app.chain_id());
        info!("  Height: {}", self.app.last_block_height());
        info!("  Modules: {}", self.app.manager().module_names().len());
        info!("  Invariants: {}", self.app.invariants().len());
        info!("===========================================");

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.produce_block() {
                        Ok(_) => {}
                        Err(AppError::HaltHeightReached { height }) => {
                            info!(height, "[node] halt height reached, stopping");
                            return Ok(());
                        }
                        Err(e) => {
                            error!(error = %e, "[node] block production stopped");
                            return Err(e.into());
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(height = self.app.last_block_height(), "[node] shutdown requested");
                    return Ok(());
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(&TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let mut runtime = NodeRuntime::new(config)?;
    runtime.run().await?;

    info!("Shutdown complete");
    Ok(())
}
