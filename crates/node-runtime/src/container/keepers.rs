//! # Keeper Container
//!
//! Builds every keeper of the application and wires them together.
//!
//! ## Construction Order
//!
//! Keepers are constructed leaves first. Each constructor only receives
//! keepers that already exist, so the dependency graph is a plain sequence:
//!
//! ```text
//! Level 0: params (subspaces), capability (scopes, then sealed)
//! Level 1: auth
//! Level 2: bank
//! Level 3: supply
//! Level 4: staking
//! Level 5: mint, distribution, slashing, crisis, upgrade
//! Level 6: gov (proposal router), evidence
//! Level 7: ibc, transfer, vmbridge
//! ```
//!
//! Edges that point back up the graph are installed afterwards: staking
//! hooks (distribution, slashing) and the ibc port router (transfer,
//! vmbridge). The crisis invariants and the genesis transaction deliverer
//! need the module manager and the ante handler and are installed by the
//! application.

use std::sync::Arc;

use tracing::{info, instrument};

use ls_01_store::{StoreKeyRegistry, TransientStoreKey};
use ls_02_capability::CapabilityKeeper;
use ls_03_commit_bridge::{AcknowledgedHeight, ExternalEngine};
use ls_04_orchestrator::AppModule;
use ls_05_keepers::auth::AuthParams;
use ls_05_keepers::bank::BankParams;
use ls_05_keepers::crisis::CrisisParams;
use ls_05_keepers::distribution::DistributionParams;
use ls_05_keepers::gov::GovParams;
use ls_05_keepers::mint::MintParams;
use ls_05_keepers::slashing::SlashingParams;
use ls_05_keepers::staking::StakingParams;
use ls_05_keepers::*;
use shared_types::names;

use crate::container::config::ChainConfig;
use crate::errors::AppResult;
use crate::wiring::module_account_permissions;

/// Every keeper of the application, each shared by `Arc`.
pub struct AppKeepers {
    pub params: Arc<ParamsKeeper>,
    pub capability: Arc<CapabilityKeeper>,
    pub auth: Arc<AuthKeeper>,
    pub bank: Arc<BankKeeper>,
    pub supply: Arc<SupplyKeeper>,
    pub staking: Arc<StakingKeeper>,
    pub mint: Arc<MintKeeper>,
    pub distribution: Arc<DistributionKeeper>,
    pub slashing: Arc<SlashingKeeper>,
    pub crisis: Arc<CrisisKeeper>,
    pub upgrade: Arc<UpgradeKeeper>,
    pub gov: Arc<GovKeeper>,
    pub evidence: Arc<EvidenceKeeper>,
    pub ibc: Arc<IbcKeeper>,
    pub transfer: Arc<TransferKeeper>,
    pub vmbridge: Arc<VmBridgeKeeper>,
    /// Module accounts and their permissions.
    pub permissions: Arc<ModuleAccountPermissions>,
    /// Transient key the params keeper stages changes under.
    pub transient_params: TransientStoreKey,
}

impl AppKeepers {
    #[instrument(name = "keeper_init", skip_all)]
    pub fn new(
        registry: &StoreKeyRegistry,
        chain: &ChainConfig,
        engine: Arc<dyn ExternalEngine>,
        acknowledged: AcknowledgedHeight,
    ) -> AppResult<Self> {
        info!("[keepers] building keepers");

        // Level 0
        let transient_params = registry.require_transient_key(names::TRANSIENT_PARAMS)?;
        let mut params = ParamsKeeper::new(
            registry.require_key(names::PARAMS)?,
            transient_params.clone(),
        );
        let auth_space = params.add_subspace::<AuthParams>(names::AUTH)?;
        let bank_space = params.add_subspace::<BankParams>(names::BANK)?;
        let staking_space = params.add_subspace::<StakingParams>(names::STAKING)?;
        let mint_space = params.add_subspace::<MintParams>(names::MINT)?;
        let distr_space = params.add_subspace::<DistributionParams>(names::DISTRIBUTION)?;
        let slashing_space = params.add_subspace::<SlashingParams>(names::SLASHING)?;
        let gov_space = params.add_subspace::<GovParams>(names::GOV)?;
        let crisis_space = params.add_subspace::<CrisisParams>(names::CRISIS)?;
        let params = Arc::new(params);

        let capability = CapabilityKeeper::new(registry.require_key(names::CAPABILITY)?);
        let ibc_scope = capability.scope_to_module(names::IBC)?;
        let transfer_scope = capability.scope_to_module(names::TRANSFER)?;
        let vmbridge_scope = capability.scope_to_module(names::VM_BRIDGE)?;
        capability.seal();

        // Levels 1-3
        let permissions = Arc::new(module_account_permissions());
        let auth = Arc::new(AuthKeeper::new(
            registry.require_key(names::AUTH)?,
            auth_space,
            Arc::clone(&permissions),
        ));
        let bank = Arc::new(BankKeeper::new(
            registry.require_key(names::BANK)?,
            bank_space,
            Arc::clone(&auth),
            permissions.addresses(),
        ));
        let supply = Arc::new(SupplyKeeper::new(
            registry.require_key(names::SUPPLY)?,
            Arc::clone(&auth),
            Arc::clone(&bank),
            Arc::clone(&permissions),
        ));

        // Level 4
        let staking = Arc::new(StakingKeeper::new(
            registry.require_key(names::STAKING)?,
            staking_space,
            Arc::clone(&supply),
        ));

        // Level 5
        let mint = Arc::new(MintKeeper::new(
            registry.require_key(names::MINT)?,
            mint_space,
            Arc::clone(&supply),
        ));
        let distribution = Arc::new(DistributionKeeper::new(
            registry.require_key(names::DISTRIBUTION)?,
            distr_space,
            Arc::clone(&supply),
            Arc::clone(&staking),
        ));
        let slashing = Arc::new(SlashingKeeper::new(
            registry.require_key(names::SLASHING)?,
            slashing_space,
            Arc::clone(&staking),
        ));
        let crisis = Arc::new(CrisisKeeper::new(
            crisis_space,
            Arc::clone(&supply),
            chain.inv_check_period,
        ));
        let upgrade = Arc::new(UpgradeKeeper::new(
            registry.require_key(names::UPGRADE)?,
            chain.skip_upgrade_heights.clone(),
        ));

        let distribution_hooks: Arc<dyn StakingHooks> = distribution.clone();
        let slashing_hooks: Arc<dyn StakingHooks> = slashing.clone();
        staking.set_hooks(vec![distribution_hooks, slashing_hooks])?;

        // Level 6
        let gov_router = GovRouter::new()
            .add_route(names::GOV, Arc::new(TextProposalHandler))?
            .add_route(names::PARAMS, params.clone())?
            .add_route(names::UPGRADE, upgrade.clone())?
            .add_route(names::DISTRIBUTION, distribution.clone())?;
        let gov = Arc::new(GovKeeper::new(
            registry.require_key(names::GOV)?,
            gov_space,
            Arc::clone(&supply),
            Arc::clone(&staking),
            gov_router,
        ));
        let evidence = Arc::new(EvidenceKeeper::new(
            registry.require_key(names::EVIDENCE)?,
            Arc::clone(&slashing),
        ));

        // Level 7
        let ibc = Arc::new(IbcKeeper::new(registry.require_key(names::IBC)?, ibc_scope));
        let transfer = Arc::new(TransferKeeper::new(
            registry.require_key(names::TRANSFER)?,
            transfer_scope,
            Arc::clone(&ibc),
            Arc::clone(&bank),
            Arc::clone(&supply),
        ));
        let vmbridge = Arc::new(VmBridgeKeeper::new(
            registry.require_key(names::VM_BRIDGE)?,
            vmbridge_scope,
            Arc::clone(&ibc),
            engine,
            acknowledged,
        ));
        let transfer_cb: Arc<dyn IbcModule> = transfer.clone();
        let vmbridge_cb: Arc<dyn IbcModule> = vmbridge.clone();
        ibc.set_router(vec![
            (names::TRANSFER, transfer_cb),
            (names::VM_BRIDGE, vmbridge_cb),
        ])?;

        info!("[keepers] all keepers wired");
        Ok(Self {
            params,
            capability,
            auth,
            bank,
            supply,
            staking,
            mint,
            distribution,
            slashing,
            crisis,
            upgrade,
            gov,
            evidence,
            ibc,
            transfer,
            vmbridge,
            permissions,
            transient_params,
        })
    }

    /// The module wrappers registered with the module manager. Capability
    /// has no lifecycle of its own; genutil is returned separately because
    /// the application installs its deliverer.
    pub fn modules(&self, genutil: Arc<GenutilModule>) -> Vec<Arc<dyn AppModule>> {
        vec![
            Arc::new(AuthModule::new(Arc::clone(&self.auth))),
            Arc::new(BankModule::new(Arc::clone(&self.bank))),
            Arc::new(SupplyModule::new(Arc::clone(&self.supply))),
            Arc::new(StakingModule::new(Arc::clone(&self.staking))),
            Arc::new(MintModule::new(Arc::clone(&self.mint))),
            Arc::new(DistributionModule::new(Arc::clone(&self.distribution))),
            Arc::new(SlashingModule::new(Arc::clone(&self.slashing))),
            Arc::new(GovModule::new(Arc::clone(&self.gov))),
            Arc::new(CrisisModule::new(Arc::clone(&self.crisis))),
            Arc::new(ParamsModule),
            Arc::new(UpgradeModule::new(Arc::clone(&self.upgrade))),
            Arc::new(EvidenceModule::new(Arc::clone(&self.evidence))),
            Arc::new(IbcCoreModule::new(Arc::clone(&self.ibc))),
            Arc::new(TransferModule::new(Arc::clone(&self.transfer))),
            Arc::new(VmBridgeModule::new(Arc::clone(&self.vmbridge))),
            genutil,
        ]
    }
}
