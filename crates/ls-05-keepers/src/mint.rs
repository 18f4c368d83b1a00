//! # Mint
//!
//! Block rewards. Every BeginBlock moves inflation toward the bonded-ratio
//! goal, then mints `annual_provisions / blocks_per_year` of the bond denom
//! into the fee collector, where distribution picks it up with the fees.

use crate::codec::{decode_genesis, encode_genesis, to_json};
use crate::params::{ParamSet, Subspace};
use crate::supply::SupplyKeeper;
use ls_01_store::{Context, StoreKey};
use ls_04_orchestrator::{AppModule, ModuleError, ModuleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{names, Coins, Decimal, Event, RequestBeginBlock, ValidatorUpdate};
use std::sync::Arc;
use tracing::debug;

const MINTER_KEY: &[u8] = b"minter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minter {
    pub inflation: Decimal,
    pub annual_provisions: Decimal,
}

impl Default for Minter {
    fn default() -> Self {
        Self {
            inflation: "0.13".parse().unwrap_or(Decimal::ZERO),
            annual_provisions: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    pub mint_denom: String,
    /// Maximum yearly change of the inflation rate.
    pub inflation_rate_change: Decimal,
    pub inflation_max: Decimal,
    pub inflation_min: Decimal,
    pub goal_bonded: Decimal,
    pub blocks_per_year: u64,
}

impl Default for MintParams {
    fn default() -> Self {
        let dec = |s: &str| s.parse().unwrap_or(Decimal::ZERO);
        Self {
            mint_denom: "ubld".to_string(),
            inflation_rate_change: dec("0.13"),
            inflation_max: dec("0.20"),
            inflation_min: dec("0.07"),
            goal_bonded: dec("0.67"),
            blocks_per_year: 6_311_520,
        }
    }
}

impl ParamSet for MintParams {
    fn validate(&self) -> Result<(), String> {
        if self.inflation_min > self.inflation_max {
            return Err("inflation_min exceeds inflation_max".into());
        }
        if self.goal_bonded.is_zero() || self.goal_bonded > Decimal::ONE {
            return Err("goal_bonded must be in (0, 1]".into());
        }
        if self.blocks_per_year == 0 {
            return Err("blocks_per_year must be positive".into());
        }
        Ok(())
    }
}

impl Minter {
    /// Inflation for the next block given the current bonded ratio.
    pub fn next_inflation(&self, params: &MintParams, bonded_ratio: Decimal) -> Decimal {
        let per_block = |delta: Decimal| {
            delta
                .mul(params.inflation_rate_change)
                .quo_int(u128::from(params.blocks_per_year))
        };
        let relative = bonded_ratio.quo(params.goal_bonded);
        let next = match Decimal::ONE.checked_sub(relative) {
            // Under the goal: raise inflation.
            Some(shortfall) => self.inflation.saturating_add(per_block(shortfall)),
            None => {
                let excess = relative.checked_sub(Decimal::ONE).unwrap_or(Decimal::ZERO);
                self.inflation
                    .checked_sub(per_block(excess))
                    .unwrap_or(Decimal::ZERO)
            }
        };
        next.clamp(params.inflation_min, params.inflation_max)
    }

    pub fn block_provision(&self, params: &MintParams) -> u128 {
        // mul_int(1) truncates to whole tokens.
        self.annual_provisions
            .quo_int(u128::from(params.blocks_per_year))
            .mul_int(1)
    }
}

pub struct MintKeeper {
    key: StoreKey,
    subspace: Subspace,
    supply: Arc<SupplyKeeper>,
}

impl MintKeeper {
    pub fn new(key: StoreKey, subspace: Subspace, supply: Arc<SupplyKeeper>) -> Self {
        Self { key, subspace, supply }
    }

    pub fn params(&self, ctx: &mut Context) -> ModuleResult<MintParams> {
        self.subspace.get_params(ctx)
    }

    pub fn minter(&self, ctx: &mut Context) -> ModuleResult<Minter> {
        Ok(ctx.kv(&self.key)?.get_json(MINTER_KEY)?.unwrap_or_default())
    }

    pub fn set_minter(&self, ctx: &mut Context, minter: &Minter) -> ModuleResult<()> {
        ctx.kv(&self.key)?.set_json(MINTER_KEY, minter)?;
        Ok(())
    }

    /// Bonded pool balance over the total supply of the mint denom.
    pub fn bonded_ratio(&self, ctx: &mut Context, denom: &str) -> ModuleResult<Decimal> {
        let total = self.supply.supply(ctx)?.amount_of(denom);
        let bonded = self
            .supply
            .module_balance(ctx, names::BONDED_POOL)?
            .amount_of(denom);
        Ok(Decimal::from_ratio(bonded, total))
    }

    /// Update the minter and mint this block's provision into the fee
    /// collector. Returns the minted amount.
    pub fn mint_block_provision(&self, ctx: &mut Context) -> ModuleResult<Coins> {
        let params = self.params(ctx)?;
        let mut minter = self.minter(ctx)?;
        let ratio = self.bonded_ratio(ctx, &params.mint_denom)?;
        minter.inflation = minter.next_inflation(&params, ratio);
        let total = self.supply.supply(ctx)?.amount_of(&params.mint_denom);
        minter.annual_provisions = Decimal::from_int(minter.inflation.mul_int(total));
        self.set_minter(ctx, &minter)?;

        let minted = Coins::single(&params.mint_denom, minter.block_provision(&params));
        if minted.is_zero() {
            return Ok(minted);
        }
        self.supply.mint_coins(ctx, names::MINT, &minted)?;
        self.supply
            .send_coins_from_module_to_module(ctx, names::MINT, names::FEE_COLLECTOR, &minted)?;
        ctx.emit(
            Event::new("mint")
                .attr("bonded_ratio", ratio)
                .attr("inflation", minter.inflation)
                .attr("annual_provisions", minter.annual_provisions)
                .attr("amount", &minted),
        );
        debug!(height = ctx.height(), %minted, inflation = %minter.inflation, "[mint] block provision");
        Ok(minted)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintGenesis {
    #[serde(default)]
    pub minter: Minter,
    #[serde(default)]
    pub params: MintParams,
}

pub struct MintModule {
    keeper: Arc<MintKeeper>,
}

impl MintModule {
    pub fn new(keeper: Arc<MintKeeper>) -> Self {
        Self { keeper }
    }
}

impl AppModule for MintModule {
    fn name(&self) -> &'static str {
        names::MINT
    }

    fn default_genesis(&self) -> Value {
        encode_genesis(names::MINT, &MintGenesis::default()).unwrap_or(Value::Null)
    }

    fn validate_genesis(&self, genesis: &Value) -> ModuleResult<()> {
        let genesis: MintGenesis = decode_genesis(names::MINT, genesis)?;
        genesis.params.validate().map_err(ModuleError::InvalidGenesis)
    }

    fn init_genesis(&self, ctx: &mut Context, genesis: &Value) -> ModuleResult<Vec<ValidatorUpdate>> {
        let genesis: MintGenesis = decode_genesis(names::MINT, genesis)?;
        self.keeper.subspace.set_params(ctx, &genesis.params)?;
        self.keeper.set_minter(ctx, &genesis.minter)?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> ModuleResult<Value> {
        let genesis = MintGenesis {
            minter: self.keeper.minter(ctx)?,
            params: self.keeper.params(ctx)?,
        };
        encode_genesis(names::MINT, &genesis)
    }

    fn has_begin_blocker(&self) -> bool {
        true
    }

    fn begin_block(&self, ctx: &mut Context, _req: &RequestBeginBlock) -> ModuleResult<()> {
        self.keeper.mint_block_provision(ctx).map(|_| ())
    }

    fn query_route(&self) -> Option<&'static str> {
        Some(names::MINT)
    }

    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> ModuleResult<Vec<u8>> {
        match path {
            "inflation" => to_json(&self.keeper.minter(ctx)?.inflation),
            "annual_provisions" => to_json(&self.keeper.minter(ctx)?.annual_provisions),
            "params" => to_json(&self.keeper.params(ctx)?),
            _ => Err(ModuleError::UnknownRoute(format!("mint/{path}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fund, TestKeepers};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_inflation_moves_toward_goal_and_stays_in_bounds() {
        let params = MintParams {
            blocks_per_year: 1,
            ..MintParams::default()
        };
        let minter = Minter::default();

        // Nothing bonded: full yearly change applied in one "block".
        let up = minter.next_inflation(&params, Decimal::ZERO);
        assert_eq!(up, params.inflation_max);

        // Over the goal: inflation falls, but never below the floor.
        let down = minter.next_inflation(&params, Decimal::ONE);
        assert!(down < minter.inflation);
        assert!(down >= params.inflation_min);

        // Exactly at the goal: unchanged.
        assert_eq!(minter.next_inflation(&params, params.goal_bonded), minter.inflation);
    }

    #[test]
    fn test_block_provision_goes_to_fee_collector() {
        let (k, mut ctx) = TestKeepers::new();
        fund(&k, &mut ctx, 1, 1_000_000_000);
        let params = MintParams {
            blocks_per_year: 100,
            inflation_rate_change: Decimal::ZERO,
            ..MintParams::default()
        };
        k.mint.subspace.set_params(&mut ctx, &params).unwrap();
        k.mint
            .set_minter(
                &mut ctx,
                &Minter {
                    inflation: dec("0.1"),
                    annual_provisions: Decimal::ZERO,
                },
            )
            .unwrap();

        let minted = k.mint.mint_block_provision(&mut ctx).unwrap();
        // 10% of 1e9 per year over 100 blocks.
        assert_eq!(minted, Coins::single("ubld", 1_000_000));
        assert_eq!(
            k.supply.module_balance(&mut ctx, names::FEE_COLLECTOR).unwrap(),
            minted
        );
        assert_eq!(k.supply.total_supply_violation(&mut ctx).unwrap(), None);
    }
}
