//! Keeper fixtures for unit tests.

use crate::auth::{AuthKeeper, AuthParams, ModuleAccountPermissions, Permission};
use crate::bank::{BankKeeper, BankParams};
use crate::crisis::CrisisParams;
use crate::distribution::{DistributionKeeper, DistributionParams};
use crate::evidence::EvidenceKeeper;
use crate::gov::{GovKeeper, GovParams, GovRouter, TextProposalHandler};
use crate::ibc::{IbcKeeper, IbcModule};
use crate::mint::{MintKeeper, MintParams};
use crate::params::{ParamsKeeper, Subspace};
use crate::slashing::{SlashingKeeper, SlashingParams};
use crate::staking::{StakingKeeper, StakingParams};
use crate::supply::SupplyKeeper;
use crate::transfer::TransferKeeper;
use crate::vmbridge::VmBridgeKeeper;
use ls_01_store::{Context, ExecMode, Snapshot, StateView, StoreKeyRegistry};
use ls_02_capability::CapabilityKeeper;
use ls_03_commit_bridge::{AcknowledgedHeight, InProcessEngine};
use shared_types::{names, Address, BlockHeader, Coin, Coins, MsgCreateValidator, PubKey};
use std::sync::{Arc, OnceLock};

/// One token of consensus power.
pub const POWER: u128 = 1_000_000;

const PERSISTENT: &[&str] = &[
    names::MAIN_STORE,
    names::CAPABILITY,
    names::AUTH,
    names::BANK,
    names::SUPPLY,
    names::STAKING,
    names::MINT,
    names::DISTRIBUTION,
    names::SLASHING,
    names::GOV,
    names::PARAMS,
    names::UPGRADE,
    names::EVIDENCE,
    names::IBC,
    names::TRANSFER,
    names::VM_BRIDGE,
];

pub fn registry() -> Arc<StoreKeyRegistry> {
    static REGISTRY: OnceLock<Arc<StoreKeyRegistry>> = OnceLock::new();
    Arc::clone(REGISTRY.get_or_init(|| {
        Arc::new(StoreKeyRegistry::new(PERSISTENT, &[names::TRANSIENT_PARAMS]).unwrap())
    }))
}

/// Deliver-mode context at height 1 over empty state.
pub fn context() -> Context {
    let header = BlockHeader {
        chain_id: "lockstep-test".into(),
        height: 1,
        time: 1_000,
        proposer: Address::default(),
    };
    Context::new(
        header,
        ExecMode::Deliver,
        StateView::new(Arc::new(Snapshot::default())),
        registry(),
    )
}

pub fn addr(n: u8) -> Address {
    Address([n; 20])
}

pub fn pubkey(n: u8) -> PubKey {
    PubKey([n; 32])
}

pub fn coins(amount: u128) -> Coins {
    Coins::single("ubld", amount)
}

pub fn permissions() -> ModuleAccountPermissions {
    ModuleAccountPermissions::new([
        (names::FEE_COLLECTOR, vec![]),
        (names::DISTRIBUTION, vec![]),
        (names::MINT, vec![Permission::Minter]),
        (names::BONDED_POOL, vec![Permission::Burner, Permission::Staking]),
        (names::NOT_BONDED_POOL, vec![Permission::Burner, Permission::Staking]),
        (names::GOV, vec![Permission::Burner]),
        (names::TRANSFER, vec![Permission::Minter, Permission::Burner]),
    ])
}

/// Every keeper wired the way the application wires them, minus staking
/// hooks and invariants.
pub struct TestKeepers {
    pub params: ParamsKeeper,
    pub capability: Arc<CapabilityKeeper>,
    pub auth: Arc<AuthKeeper>,
    pub bank: Arc<BankKeeper>,
    pub supply: Arc<SupplyKeeper>,
    pub staking: Arc<StakingKeeper>,
    pub mint: Arc<MintKeeper>,
    pub distribution: Arc<DistributionKeeper>,
    pub slashing: Arc<SlashingKeeper>,
    pub gov: Arc<GovKeeper>,
    pub evidence: Arc<EvidenceKeeper>,
    pub ibc: Arc<IbcKeeper>,
    pub transfer: Arc<TransferKeeper>,
    pub vmbridge: Arc<VmBridgeKeeper>,
    pub engine: Arc<InProcessEngine>,
}

impl TestKeepers {
    pub fn new() -> (TestKeepers, Context) {
        let registry = registry();
        let key = |name: &str| registry.key(name).unwrap();

        let mut params = ParamsKeeper::new(
            key(names::PARAMS),
            registry.transient_key(names::TRANSIENT_PARAMS).unwrap(),
        );
        let auth_space = params.add_subspace::<AuthParams>(names::AUTH).unwrap();
        let bank_space = params.add_subspace::<BankParams>(names::BANK).unwrap();
        let staking_space = params.add_subspace::<StakingParams>(names::STAKING).unwrap();
        let mint_space = params.add_subspace::<MintParams>(names::MINT).unwrap();
        let distr_space = params
            .add_subspace::<DistributionParams>(names::DISTRIBUTION)
            .unwrap();
        let slashing_space = params.add_subspace::<SlashingParams>(names::SLASHING).unwrap();
        let gov_space = params.add_subspace::<GovParams>(names::GOV).unwrap();
        params.add_subspace::<CrisisParams>(names::CRISIS).unwrap();

        let perms = Arc::new(permissions());
        let auth = Arc::new(AuthKeeper::new(key(names::AUTH), auth_space, Arc::clone(&perms)));
        let bank = Arc::new(BankKeeper::new(
            key(names::BANK),
            bank_space,
            Arc::clone(&auth),
            perms.addresses(),
        ));
        let supply = Arc::new(SupplyKeeper::new(
            key(names::SUPPLY),
            Arc::clone(&auth),
            Arc::clone(&bank),
            perms,
        ));
        let staking = Arc::new(StakingKeeper::new(
            key(names::STAKING),
            staking_space,
            Arc::clone(&supply),
        ));
        let mint = Arc::new(MintKeeper::new(key(names::MINT), mint_space, Arc::clone(&supply)));
        let distribution = Arc::new(DistributionKeeper::new(
            key(names::DISTRIBUTION),
            distr_space,
            Arc::clone(&supply),
            Arc::clone(&staking),
        ));
        let slashing = Arc::new(SlashingKeeper::new(
            key(names::SLASHING),
            slashing_space,
            Arc::clone(&staking),
        ));
        let router = GovRouter::new()
            .add_route(names::GOV, Arc::new(TextProposalHandler))
            .unwrap();
        let gov = Arc::new(GovKeeper::new(
            key(names::GOV),
            gov_space,
            Arc::clone(&supply),
            Arc::clone(&staking),
            router,
        ));
        let evidence = Arc::new(EvidenceKeeper::new(key(names::EVIDENCE), Arc::clone(&slashing)));

        let capability = CapabilityKeeper::new(key(names::CAPABILITY));
        let ibc = Arc::new(IbcKeeper::new(
            key(names::IBC),
            capability.scope_to_module(names::IBC).unwrap(),
        ));
        let transfer = Arc::new(TransferKeeper::new(
            key(names::TRANSFER),
            capability.scope_to_module(names::TRANSFER).unwrap(),
            Arc::clone(&ibc),
            Arc::clone(&bank),
            Arc::clone(&supply),
        ));
        let engine = Arc::new(InProcessEngine::new());
        let vmbridge = Arc::new(VmBridgeKeeper::new(
            key(names::VM_BRIDGE),
            capability.scope_to_module(names::VM_BRIDGE).unwrap(),
            Arc::clone(&ibc),
            engine.clone(),
            AcknowledgedHeight::default(),
        ));
        capability.seal();
        let transfer_cb: Arc<dyn IbcModule> = transfer.clone();
        let vm_cb: Arc<dyn IbcModule> = vmbridge.clone();
        ibc.set_router(vec![(names::TRANSFER, transfer_cb), (names::VM_BRIDGE, vm_cb)])
            .unwrap();

        let mut ctx = context();
        transfer.bind_port(&mut ctx).unwrap();
        vmbridge.bind_port(&mut ctx).unwrap();

        let keepers = TestKeepers {
            params,
            capability,
            auth,
            bank,
            supply,
            staking,
            mint,
            distribution,
            slashing,
            gov,
            evidence,
            ibc,
            transfer,
            vmbridge,
            engine,
        };
        (keepers, ctx)
    }

    pub fn subspace(&self, name: &str) -> Subspace {
        self.params.subspace(name).cloned().unwrap()
    }
}

/// Mint `amount` ubld into account `n`, keeping the supply consistent.
pub fn fund(k: &TestKeepers, ctx: &mut Context, n: u8, amount: u128) {
    k.supply.mint_coins(ctx, names::MINT, &coins(amount)).unwrap();
    k.supply
        .send_coins_from_module_to_account(ctx, names::MINT, addr(n), &coins(amount))
        .unwrap();
}

/// Fund operator `n` and self-delegate `tokens` to a new validator.
pub fn create_validator(k: &TestKeepers, ctx: &mut Context, n: u8, tokens: u128) {
    fund(k, ctx, n, tokens);
    k.staking
        .create_validator(
            ctx,
            &MsgCreateValidator {
                operator: addr(n),
                pubkey: pubkey(n),
                moniker: format!("validator-{n}"),
                self_delegation: Coin::new("ubld", tokens),
            },
        )
        .unwrap();
}
