//! Value store: state carried between evaluation cycles
//!
//! Entries are keyed by host, check, item and a counter name so that two
//! items of the same check never share state. Checks never touch the
//! store directly; they get an [`ItemValueStore`] scoped to their own
//! service, which the driver commits back after the check returned.

mod file;

pub use file::FileValueStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fully qualified value store key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueStoreKey {
    pub host: String,
    pub check: String,
    pub item: Option<String>,
    pub name: String,
}

/// The (host, check, item) part of a key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreScope {
    pub host: String,
    pub check: String,
    pub item: Option<String>,
}

impl StoreScope {
    pub fn new(host: impl Into<String>, check: impl Into<String>, item: Option<&str>) -> Self {
        Self {
            host: host.into(),
            check: check.into(),
            item: item.map(str::to_string),
        }
    }

    pub fn key(&self, name: impl Into<String>) -> ValueStoreKey {
        ValueStoreKey {
            host: self.host.clone(),
            check: self.check.clone(),
            item: self.item.clone(),
            name: name.into(),
        }
    }

    pub fn contains(&self, key: &ValueStoreKey) -> bool {
        key.host == self.host && key.check == self.check && key.item == self.item
    }
}

/// Persisted key-value state
///
/// Implementations only need `get`/`set` semantics; a single `set` must
/// replace the whole value of a key.
pub trait ValueStore {
    fn get(&self, key: &ValueStoreKey) -> Option<&Value>;

    fn set(&mut self, key: ValueStoreKey, value: Value);

    /// All entries of one scope, keyed by counter name
    fn scope_entries(&self, scope: &StoreScope) -> BTreeMap<String, Value>;
}

/// In-memory value store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryValueStore {
    entries: BTreeMap<ValueStoreKey, Value>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValueStoreKey, &Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(ValueStoreKey, Value)> for MemoryValueStore {
    fn from_iter<T: IntoIterator<Item = (ValueStoreKey, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl ValueStore for MemoryValueStore {
    fn get(&self, key: &ValueStoreKey) -> Option<&Value> {
        self.entries.get(key)
    }

    fn set(&mut self, key: ValueStoreKey, value: Value) {
        self.entries.insert(key, value);
    }

    fn scope_entries(&self, scope: &StoreScope) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .filter(|(key, _)| scope.contains(key))
            .map(|(key, value)| (key.name.clone(), value.clone()))
            .collect()
    }
}

/// Value store view of one service during one evaluation
///
/// Reads see the state loaded at the start of the evaluation plus the
/// writes made so far; writes are staged and only reach the underlying
/// store through [`ItemValueStore::commit`].
#[derive(Debug, Clone)]
pub struct ItemValueStore {
    scope: StoreScope,
    values: BTreeMap<String, Value>,
    staged: BTreeMap<String, Value>,
}

impl ItemValueStore {
    /// Load the scope's current entries from a store
    pub fn load(store: &dyn ValueStore, scope: StoreScope) -> Self {
        let values = store.scope_entries(&scope);
        Self {
            scope,
            values,
            staged: BTreeMap::new(),
        }
    }

    /// An empty view that is not backed by any store
    pub fn detached(scope: StoreScope) -> Self {
        Self {
            scope,
            values: BTreeMap::new(),
            staged: BTreeMap::new(),
        }
    }

    pub fn scope(&self) -> &StoreScope {
        &self.scope
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.staged.get(name).or_else(|| self.values.get(name))
    }

    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.get(name).cloned().unwrap_or(default)
    }

    /// Typed read; entries that do not deserialize are treated as missing
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.staged.insert(name.into(), value);
    }

    pub fn set_as<T: Serialize>(&mut self, name: impl Into<String>, value: &T) {
        // Serializing plain numbers and tuples cannot fail
        if let Ok(value) = serde_json::to_value(value) {
            self.set(name, value);
        }
    }

    /// Number of writes waiting for commit
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Write staged entries to the store, one key at a time
    pub fn commit(self, store: &mut dyn ValueStore) -> usize {
        let count = self.staged.len();
        for (name, value) in self.staged {
            store.set(self.scope.key(name), value);
        }
        count
    }
}
