//! # Genutil
//!
//! Genesis transactions. Validators join the initial set by signing a
//! `MsgCreateValidator` transaction that is embedded in the genesis file.
//! Genutil runs last in InitGenesis: every account is funded by then, so each
//! gentx goes through the same ante checks and message routing as a block
//! transaction. The resulting validator set is taken from staking.

use crate::codec::{decode_genesis, encode_genesis};
use crate::staking::StakingKeeper;
use ls_01_store::Context;
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, Msg, Tx, ValidatorUpdate};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Runs a genesis transaction through ante and the message router. Provided
/// by the application, which owns both.
pub trait GenesisTxDeliverer: Send + Sync {
    fn deliver_gen_tx(&self, ctx: &mut Context, tx: &Tx) -> ModuleResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenutilGenesis {
    #[serde(default)]
    pub gen_txs: Vec<Tx>,
}

pub struct GenutilModule {
    staking: Arc<StakingKeeper>,
    deliverer: OnceLock<Arc<dyn GenesisTxDeliverer>>,
}

impl GenutilModule {
    pub fn new(staking: Arc<StakingKeeper>) -> Self {
        Self {
            staking,
            deliverer: OnceLock::new(),
        }
    }

    pub fn set_deliverer(&self, deliverer: Arc<dyn GenesisTxDeliverer>) -> ModuleResult<()> {
        self.deliverer
            .set(deliverer)
            .map_err(|_| ModuleError::InvalidRequest("gentx deliverer already set".into()))
    }
}

impl AppModule for GenutilModule {
    fn name(&self) -> &'static str {
        names::GENUTIL
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::GENUTIL, &GenutilGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: GenutilGenesis = decode_genesis(names::GENUTIL, genesis)?;
        for (i, tx) in genesis.gen_txs.iter().enumerate() {
            let creates = tx
                .msgs
                .iter()
                .any(|m| matches!(m, Msg::CreateValidator(_)));
            if !creates {
                return Err(ModuleError::InvalidGenesis(format!(
                    "gentx {i} does not create a validator"
                )));
            }
        }
        Ok(())
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: GenutilGenesis = decode_genesis(names::GENUTIL, genesis)?;
        if genesis.gen_txs.is_empty() {
            return Ok(Vec::new());
        }
        let deliverer = self
            .deliverer
            .get()
            .ok_or_else(|| ModuleError::InvalidGenesis("no gentx deliverer installed".into()))?;
        for (i, tx) in genesis.gen_txs.iter().enumerate() {
            deliverer
                .deliver_gen_tx(ctx, tx)
                .map_err(|e| ModuleError::InvalidGenesis(format!("gentx {i}: {e}")))?;
        }
        let updates = self.staking.apply_validator_set_updates(ctx)?;
        info!(gen_txs = genesis.gen_txs.len(), validators = updates.len(), "[genutil] gentxs delivered");
        Ok(updates)
    }

    /// Gentxs are consumed at genesis; an export carries the resulting
    /// staking state instead.
    fn export_genesis(&self, _ctx: &mut Context) -> ModuleResult<Value> {
        Ok(self.default_genesis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, fund, pubkey, TestKeepers, POWER};
    use shared_types::{Coin, Coins, Fee, MsgCreateValidator, MsgSend};

    /// Routes create-validator messages straight to staking.
    struct DirectDeliverer(Arc<StakingKeeper>);

    impl GenesisTxDeliverer for DirectDeliverer {
        fn deliver_gen_tx(&self, ctx: &mut Context, tx: &Tx) -> ModuleResult<()> {
            for msg in &tx.msgs {
                match msg {
                    Msg::CreateValidator(m) => self.0.create_validator(ctx, m)?,
                    other => return Err(ModuleError::UnknownRoute(other.type_name().into())),
                }
            }
            Ok(())
        }
    }

    fn gentx(id: u8) -> Tx {
        Tx {
            msgs: vec![Msg::CreateValidator(MsgCreateValidator {
                operator: addr(id),
                pubkey: pubkey(id),
                moniker: format!("val-{id}"),
                self_delegation: Coin::new("ubld", 10 * POWER),
            })],
            fee: Fee {
                amount: Coins::new(),
                gas_limit: 200_000,
            },
            memo: String::new(),
            timeout_height: 0,
            signatures: Vec::new(),
        }
    }

    fn genesis(txs: Vec<Tx>) -> Value {
        serde_json::to_value(GenutilGenesis { gen_txs: txs }).unwrap()
    }

    #[test]
    fn test_gentxs_produce_validator_set() {
        let (k, mut ctx) = TestKeepers::new();
        fund(&k, &mut ctx, 1, 10 * POWER);
        fund(&k, &mut ctx, 2, 10 * POWER);
        let module = GenutilModule::new(Arc::clone(&k.staking));
        module
            .set_deliverer(Arc::new(DirectDeliverer(Arc::clone(&k.staking))))
            .unwrap();

        let updates = module
            .init_genesis(&mut ctx, &genesis(vec![gentx(1), gentx(2)]))
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.power == 10));
    }

    #[test]
    fn test_empty_genesis_returns_no_updates() {
        let (k, mut ctx) = TestKeepers::new();
        let module = GenutilModule::new(Arc::clone(&k.staking));
        assert!(module
            .init_genesis(&mut ctx, &module.default_genesis())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_failing_gentx_aborts_genesis() {
        let (k, mut ctx) = TestKeepers::new();
        let module = GenutilModule::new(Arc::clone(&k.staking));
        module
            .set_deliverer(Arc::new(DirectDeliverer(Arc::clone(&k.staking))))
            .unwrap();
        // Operator 3 has no funds to self-delegate.
        assert!(matches!(
            module.init_genesis(&mut ctx, &genesis(vec![gentx(3)])),
            Err(ModuleError::InvalidGenesis(_))
        ));
    }

    #[test]
    fn test_validate_rejects_gentx_without_validator() {
        let (k, _ctx) = TestKeepers::new();
        let module = GenutilModule::new(Arc::clone(&k.staking));
        let mut tx = gentx(1);
        tx.msgs = vec![Msg::Send(MsgSend {
            from: addr(1),
            to: addr(2),
            amount: Coins::single("ubld", 1),
        })];
        assert!(module.validate_genesis(&genesis(vec![tx])).is_err());
    }
}
