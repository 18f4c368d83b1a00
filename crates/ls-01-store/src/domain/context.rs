//! # Execution Context
//!
//! Everything a module call may touch: the block header, the execution mode,
//! the gas meter, the event sink and the working state. Store access goes
//! through `kv` / `transient`, which reject keys the registry did not mint.

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::gas::{GasConfig, GasMeter, KV_GAS, TRANSIENT_GAS};
use crate::domain::keys::{StoreKey, StoreKeyRegistry, TransientStoreKey};
use crate::domain::state::StateView;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Address, BlockHeader, Event};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Mempool admission against the check state.
    Check,
    /// Block execution.
    Deliver,
    /// Chain initialization.
    Genesis,
    /// Read-only query against committed state.
    Query,
}

impl ExecMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecMode::Check => "check",
            ExecMode::Deliver => "deliver",
            ExecMode::Genesis => "genesis",
            ExecMode::Query => "query",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    header: BlockHeader,
    mode: ExecMode,
    gas: GasMeter,
    events: Vec<Event>,
    state: StateView,
    registry: Arc<StoreKeyRegistry>,
}

impl Context {
    pub fn new(
        header: BlockHeader,
        mode: ExecMode,
        state: StateView,
        registry: Arc<StoreKeyRegistry>,
    ) -> Self {
        Self {
            header,
            mode,
            gas: GasMeter::infinite(),
            events: Vec::new(),
            state,
            registry,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn set_header(&mut self, header: BlockHeader) {
        self.header = header;
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn block_time(&self) -> u64 {
        self.header.time
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    pub fn proposer(&self) -> Address {
        self.header.proposer
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExecMode) {
        self.mode = mode;
    }

    pub fn is_check(&self) -> bool {
        self.mode == ExecMode::Check
    }

    pub fn gas_meter(&self) -> &GasMeter {
        &self.gas
    }

    pub fn set_gas_meter(&mut self, meter: GasMeter) {
        self.gas = meter;
    }

    pub fn consume_gas(&mut self, amount: u64, descriptor: &str) -> StoreResult<()> {
        self.gas.consume(amount, descriptor)
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> &StateView {
        &self.state
    }

    pub fn into_state(self) -> StateView {
        self.state
    }

    pub fn registry(&self) -> &Arc<StoreKeyRegistry> {
        &self.registry
    }

    /// Gas-metered view of the persistent partition behind `key`.
    pub fn kv(&mut self, key: &StoreKey) -> StoreResult<KvStore<'_>> {
        if !self.registry.owns(key) {
            return Err(StoreError::UnauthorizedKey(key.name().to_string()));
        }
        Ok(KvStore {
            partition: key.name().to_string(),
            transient: false,
            costs: KV_GAS,
            state: &mut self.state,
            gas: &mut self.gas,
        })
    }

    /// Gas-metered view of the per-block partition behind `key`.
    pub fn transient(&mut self, key: &TransientStoreKey) -> StoreResult<KvStore<'_>> {
        if !self.registry.owns_transient(key) {
            return Err(StoreError::UnauthorizedKey(key.name().to_string()));
        }
        Ok(KvStore {
            partition: key.name().to_string(),
            transient: true,
            costs: TRANSIENT_GAS,
            state: &mut self.state,
            gas: &mut self.gas,
        })
    }

    /// A child context over a copy of the working state. Events start empty.
    pub fn branch(&self) -> Context {
        Context {
            header: self.header.clone(),
            mode: self.mode,
            gas: self.gas.clone(),
            events: Vec::new(),
            state: self.state.clone(),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Adopt a child's writes, events and gas consumption.
    pub fn write_branch(&mut self, child: Context) {
        self.state = child.state;
        self.events.extend(child.events);
        self.gas = child.gas;
    }

    /// Drop a child's writes and events but keep the gas it consumed.
    pub fn discard_branch(&mut self, child: Context) {
        self.gas = child.gas;
    }

    /// Clear transient partitions at the start of a block.
    pub fn reset_transient(&mut self) {
        self.state.reset_transient();
    }
}

/// A partition view that charges gas on every access.
pub struct KvStore<'a> {
    partition: String,
    transient: bool,
    costs: GasConfig,
    state: &'a mut StateView,
    gas: &'a mut GasMeter,
}

impl<'a> KvStore<'a> {
    pub fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.gas.consume(self.costs.read_cost_flat, "ReadFlat")?;
        let value = if self.transient {
            self.state.transient_get(&self.partition, key)
        } else {
            self.state.get(&self.partition, key)
        };
        let len = value.as_ref().map(|v| v.len()).unwrap_or(0) as u64;
        self.gas
            .consume(self.costs.read_cost_per_byte.saturating_mul(len), "ReadPerByte")?;
        Ok(value)
    }

    pub fn has(&mut self, key: &[u8]) -> StoreResult<bool> {
        self.gas.consume(self.costs.has_cost, "Has")?;
        Ok(if self.transient {
            self.state.transient_get(&self.partition, key).is_some()
        } else {
            self.state.get(&self.partition, key).is_some()
        })
    }

    pub fn set(&mut self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.gas.consume(self.costs.write_cost_flat, "WriteFlat")?;
        let len = (key.len() + value.len()) as u64;
        self.gas
            .consume(self.costs.write_cost_per_byte.saturating_mul(len), "WritePerByte")?;
        if self.transient {
            self.state.transient_set(&self.partition, key.to_vec(), value);
        } else {
            self.state.set(&self.partition, key.to_vec(), value);
        }
        Ok(())
    }

    pub fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        self.gas.consume(self.costs.delete_cost, "Delete")?;
        if self.transient {
            self.state.transient_delete(&self.partition, key);
        } else {
            self.state.delete(&self.partition, key);
        }
        Ok(())
    }

    /// Pairs under `prefix` in key order.
    pub fn prefix_iter(&mut self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let items = if self.transient {
            self.state.transient_prefix_scan(&self.partition, prefix)
        } else {
            self.state.prefix_scan(&self.partition, prefix)
        };
        for (k, v) in &items {
            self.gas.consume(self.costs.iter_next_cost_flat, "IterNextFlat")?;
            let len = (k.len() + v.len()) as u64;
            self.gas
                .consume(self.costs.read_cost_per_byte.saturating_mul(len), "ValuePerByte")?;
        }
        Ok(items)
    }

    /// Typed read. Values are stored as JSON.
    pub fn get_json<T: DeserializeOwned>(&mut self, key: &[u8]) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Codec(e.to_string())),
            None => Ok(None),
        }
    }

    /// Typed write. Values are stored as JSON.
    pub fn set_json<T: Serialize>(&mut self, key: &[u8], value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.set(key, bytes)
    }

    /// Typed prefix iteration.
    pub fn prefix_iter_json<T: DeserializeOwned>(
        &mut self,
        prefix: &[u8],
    ) -> StoreResult<Vec<(Vec<u8>, T)>> {
        self.prefix_iter(prefix)?
            .into_iter()
            .map(|(k, v)| {
                serde_json::from_slice(&v)
                    .map(|t| (k, t))
                    .map_err(|e| StoreError::Codec(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::Snapshot;

    fn ctx() -> (Context, Arc<StoreKeyRegistry>) {
        let registry =
            Arc::new(StoreKeyRegistry::new(&["bank", "staking"], &["transient_params"]).unwrap());
        let ctx = Context::new(
            BlockHeader::default(),
            ExecMode::Deliver,
            StateView::new(Arc::new(Snapshot::default())),
            Arc::clone(&registry),
        );
        (ctx, registry)
    }

    #[test]
    fn test_foreign_key_is_unauthorized() {
        let (mut ctx, _) = ctx();
        let other = StoreKeyRegistry::new(&["bank"], &[]).unwrap();
        let foreign = other.key("bank").unwrap();
        assert!(matches!(ctx.kv(&foreign), Err(StoreError::UnauthorizedKey(_))));
    }

    #[test]
    fn test_branch_write_and_discard() {
        let (mut ctx, registry) = ctx();
        let bank = registry.key("bank").unwrap();

        let mut child = ctx.branch();
        child.kv(&bank).unwrap().set(b"a", vec![1]).unwrap();
        child.emit(Event::new("kept"));
        ctx.write_branch(child);
        assert_eq!(ctx.kv(&bank).unwrap().get(b"a").unwrap(), Some(vec![1]));
        assert_eq!(ctx.events().len(), 1);

        let mut failed = ctx.branch();
        failed.kv(&bank).unwrap().set(b"b", vec![2]).unwrap();
        failed.emit(Event::new("dropped"));
        let gas_after_failed = failed.gas_meter().consumed();
        ctx.discard_branch(failed);
        assert_eq!(ctx.kv(&bank).unwrap().get(b"b").unwrap(), None);
        assert_eq!(ctx.events().len(), 1);
        assert!(ctx.gas_meter().consumed() >= gas_after_failed);
    }

    #[test]
    fn test_reads_and_writes_charge_gas() {
        let (mut ctx, registry) = ctx();
        let bank = registry.key("bank").unwrap();
        ctx.set_gas_meter(GasMeter::new(2_500));
        assert!(ctx.kv(&bank).unwrap().set(b"k", vec![0; 10]).is_ok());
        assert!(matches!(
            ctx.kv(&bank).unwrap().get(b"k"),
            Err(StoreError::OutOfGas { .. })
        ));
    }

    #[test]
    fn test_transient_partition_is_separate() {
        let (mut ctx, registry) = ctx();
        let tkey = registry.transient_key("transient_params").unwrap();
        ctx.transient(&tkey).unwrap().set(b"changed", vec![1]).unwrap();
        assert!(ctx.transient(&tkey).unwrap().has(b"changed").unwrap());
        ctx.reset_transient();
        assert!(!ctx.transient(&tkey).unwrap().has(b"changed").unwrap());
    }

    #[test]
    fn test_json_values() {
        let (mut ctx, registry) = ctx();
        let staking = registry.key("staking").unwrap();
        let mut kv = ctx.kv(&staking).unwrap();
        kv.set_json(b"v/1", &vec![1u64, 2, 3]).unwrap();
        kv.set_json(b"v/2", &vec![4u64]).unwrap();
        let all: Vec<(Vec<u8>, Vec<u64>)> = kv.prefix_iter_json(b"v/").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1, vec![4]);
    }
}
