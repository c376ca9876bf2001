//! Multi-version in-memory state
//!
//! Gives each transaction a view of state as of its position in the batch:
//! a read by transaction `i` sees the latest write from any transaction with
//! a lower index, falling back to the base state. Writes of one transaction
//! never leak to lower-index readers, so concurrently executing tasks only
//! race on versions the validator can detect.

use crate::state_key::{Incarnation, StateKey, TxIndex, Version};
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};

/// Value written by one incarnation of a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedValue<V> {
    /// Incarnation that wrote the value
    pub incarnation: Incarnation,
    /// Written value
    pub value: V,
}

/// Result of a versioned read
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MvRead<V> {
    /// Written by a lower-index transaction
    Versioned(Version, V),
    /// Not written in this batch, taken from the base state
    Base(V),
    /// Not present anywhere
    Missing,
}

impl<V> MvRead<V> {
    /// The value read, if any
    pub fn into_value(self) -> Option<V> {
        match self {
            MvRead::Versioned(_, v) | MvRead::Base(v) => Some(v),
            MvRead::Missing => None,
        }
    }

    /// Version the value came from, if written in this batch
    pub fn version(&self) -> Option<Version> {
        match self {
            MvRead::Versioned(version, _) => Some(*version),
            _ => None,
        }
    }
}

/// Multi-version store over a base state
///
/// Structure: StateKey -> BTreeMap<TxIndex -> VersionedValue>
pub struct MvMemory<V> {
    base: HashMap<StateKey, V>,
    versions: DashMap<StateKey, BTreeMap<TxIndex, VersionedValue<V>>>,
}

impl<V: Clone> MvMemory<V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_base(HashMap::new())
    }

    /// Create a store over an initial state
    pub fn with_base(base: HashMap<StateKey, V>) -> Self {
        Self {
            base,
            versions: DashMap::new(),
        }
    }

    /// Read `key` as seen by transaction `reader`
    pub fn read(&self, key: &StateKey, reader: TxIndex) -> MvRead<V> {
        if let Some(versions) = self.versions.get(key) {
            if let Some((&index, entry)) = versions.range(..reader).next_back() {
                let version = Version::new(index, entry.incarnation);
                return MvRead::Versioned(version, entry.value.clone());
            }
        }
        match self.base.get(key) {
            Some(value) => MvRead::Base(value.clone()),
            None => MvRead::Missing,
        }
    }

    /// Record a write by `version`.
    ///
    /// Returns false, leaving the store unchanged, if a newer incarnation of
    /// the same transaction already wrote the key.
    pub fn write(&self, key: StateKey, version: Version, value: V) -> bool {
        let mut versions = self.versions.entry(key).or_default();
        if let Some(existing) = versions.get(&version.index) {
            if existing.incarnation > version.incarnation {
                return false;
            }
        }
        versions.insert(
            version.index,
            VersionedValue {
                incarnation: version.incarnation,
                value,
            },
        );
        true
    }

    /// Discard every write of transaction `index`
    pub fn clear(&self, index: TxIndex) {
        for mut versions in self.versions.iter_mut() {
            versions.remove(&index);
        }
        self.versions.retain(|_, versions| !versions.is_empty());
    }

    /// Final state: base overlaid with the highest-index write of each key
    pub fn snapshot(&self) -> HashMap<StateKey, V> {
        let mut state = self.base.clone();
        for entry in self.versions.iter() {
            if let Some((_, latest)) = entry.value().iter().next_back() {
                state.insert(entry.key().clone(), latest.value.clone());
            }
        }
        state
    }
}

impl<V: Clone> Default for MvMemory<V> {
    fn default() -> Self {
        Self::new()
    }
}
