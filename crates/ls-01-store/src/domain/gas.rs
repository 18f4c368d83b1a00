//! Gas accounting for store access.

use crate::domain::errors::{StoreError, StoreResult};

/// Flat and per-byte costs charged by a `KvStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasConfig {
    pub has_cost: u64,
    pub delete_cost: u64,
    pub read_cost_flat: u64,
    pub read_cost_per_byte: u64,
    pub write_cost_flat: u64,
    pub write_cost_per_byte: u64,
    pub iter_next_cost_flat: u64,
}

/// Costs for persistent partitions.
pub const KV_GAS: GasConfig = GasConfig {
    has_cost: 1_000,
    delete_cost: 1_000,
    read_cost_flat: 1_000,
    read_cost_per_byte: 3,
    write_cost_flat: 2_000,
    write_cost_per_byte: 30,
    iter_next_cost_flat: 30,
};

/// Costs for transient partitions.
pub const TRANSIENT_GAS: GasConfig = GasConfig {
    has_cost: 100,
    delete_cost: 100,
    read_cost_flat: 100,
    read_cost_per_byte: 0,
    write_cost_flat: 200,
    write_cost_per_byte: 3,
    iter_next_cost_flat: 3,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasMeter {
    limit: Option<u64>,
    consumed: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
        }
    }

    /// Meter for block-level phases: counts consumption, never runs out.
    pub fn infinite() -> Self {
        Self {
            limit: None,
            consumed: 0,
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Charge `amount`. Consumption is recorded even when the limit is
    /// exceeded so the reported gas used reflects the failed attempt.
    pub fn consume(&mut self, amount: u64, descriptor: &str) -> StoreResult<()> {
        self.consumed = self.consumed.saturating_add(amount);
        match self.limit {
            Some(limit) if self.consumed > limit => Err(StoreError::OutOfGas {
                descriptor: descriptor.to_string(),
                limit,
                consumed: self.consumed,
            }),
            _ => Ok(()),
        }
    }

    pub fn is_past_limit(&self) -> bool {
        matches!(self.limit, Some(limit) if self.consumed > limit)
    }
}
