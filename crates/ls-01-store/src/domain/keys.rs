//! # Store-Key Registry
//!
//! A `StoreKey` names a persistent partition; a `TransientStoreKey` names a
//! partition that is cleared at the start of every block. Keys can only be
//! minted here and compare by identity: two keys with the same name from
//! different registries are not equal.

use crate::domain::errors::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct StoreKey(Arc<str>);

impl StoreKey {
    pub(crate) fn mint(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for StoreKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for StoreKey {}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({})", self.0)
    }
}

#[derive(Clone)]
pub struct TransientStoreKey(Arc<str>);

impl TransientStoreKey {
    pub(crate) fn mint(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for TransientStoreKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TransientStoreKey {}

impl fmt::Debug for TransientStoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransientStoreKey({})", self.0)
    }
}

/// Owner of every store key in the application. Immutable after construction.
#[derive(Debug)]
pub struct StoreKeyRegistry {
    persistent: BTreeMap<String, StoreKey>,
    transient: BTreeMap<String, TransientStoreKey>,
}

impl StoreKeyRegistry {
    /// Mint one key per name. Names must be unique across both kinds.
    pub fn new(persistent: &[&str], transient: &[&str]) -> StoreResult<Self> {
        let mut registry = Self {
            persistent: BTreeMap::new(),
            transient: BTreeMap::new(),
        };
        for name in persistent {
            if registry.contains(name) {
                return Err(StoreError::DuplicateKey(name.to_string()));
            }
            registry
                .persistent
                .insert(name.to_string(), StoreKey::mint(name));
        }
        for name in transient {
            if registry.contains(name) {
                return Err(StoreError::DuplicateKey(name.to_string()));
            }
            registry
                .transient
                .insert(name.to_string(), TransientStoreKey::mint(name));
        }
        Ok(registry)
    }

    fn contains(&self, name: &str) -> bool {
        self.persistent.contains_key(name) || self.transient.contains_key(name)
    }

    /// The persistent key named `name`; the same instance on every call.
    pub fn key(&self, name: &str) -> Option<StoreKey> {
        self.persistent.get(name).cloned()
    }

    /// The transient key named `name`; the same instance on every call.
    pub fn transient_key(&self, name: &str) -> Option<TransientStoreKey> {
        self.transient.get(name).cloned()
    }

    /// Like `key`, but a missing name is a wiring error.
    pub fn require_key(&self, name: &str) -> StoreResult<StoreKey> {
        self.key(name)
            .ok_or_else(|| StoreError::UnknownKey(name.to_string()))
    }

    /// Like `transient_key`, but a missing name is a wiring error.
    pub fn require_transient_key(&self, name: &str) -> StoreResult<TransientStoreKey> {
        self.transient_key(name)
            .ok_or_else(|| StoreError::UnknownKey(name.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &StoreKey> {
        self.persistent.values()
    }

    pub fn transient_keys(&self) -> impl Iterator<Item = &TransientStoreKey> {
        self.transient.values()
    }

    /// True when `key` is the instance this registry minted.
    pub fn owns(&self, key: &StoreKey) -> bool {
        self.persistent.get(key.name()) == Some(key)
    }

    /// True when `key` is the instance this registry minted.
    pub fn owns_transient(&self, key: &TransientStoreKey) -> bool {
        self.transient.get(key.name()) == Some(key)
    }
}
