//! Entity tables (C4): indexed in-memory stores with secondary-key lookup.
//!
//! A uniform `get`/`put`/`remove`/`clear` contract (§4.4) sits in front of
//! the association table, the ISL table, and the three static config
//! tables, implemented once here as [`Store`] and specialized per entity by
//! the filter closure each caller supplies — matching §4.4's "filters are
//! equality conjunctions on any subset of the entry's attributes" without
//! needing a query DSL.

pub mod association;
pub mod config;
pub mod isl;

pub use association::{Association, AssociationStatus, AssociationTable};
pub use config::{
    FastpathLink, IslSide, RfConfig, RfConfigEntry, RfFpConf, RfFpConfEntry, RfIslConf, RfIslConfEntry,
};
pub use isl::{IslEntry, IslStatus, IslTable};

/// First id assigned by [`Store::put`] when an entry has none yet (§4.4).
pub const FIRST_ID: u64 = 1001;

/// In-memory backend for entity storage. A document-store backend would
/// implement the same shape; the coordinator always uses this one (§4.4,
/// §6 "Persisted state: None required").
#[derive(Debug, Clone, Default)]
pub struct Store<T> {
    entries: std::collections::BTreeMap<u64, T>,
    next_id: u64,
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Store {
            entries: std::collections::BTreeMap::new(),
            next_id: FIRST_ID,
        }
    }

    /// Inserts `entry` under `id` if given, otherwise assigns the next
    /// monotonically increasing id (§4.4). Overwrites on a given id that
    /// already exists.
    pub fn put(&mut self, id: Option<u64>, entry: T) -> u64 {
        let id = id.unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        });
        if id >= self.next_id {
            self.next_id = id + 1;
        }
        self.entries.insert(id, entry);
        id
    }

    pub fn get(&self, id: u64) -> std::option::Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> std::option::Option<&mut T> {
        self.entries.get_mut(&id)
    }

    pub fn remove(&mut self, id: u64) -> std::option::Option<T> {
        self.entries.remove(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_id = FIRST_ID;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &T)> {
        self.entries.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.values_mut()
    }

    /// Equality-conjunction lookup: returns every entry for which `filter`
    /// holds, preserving the uniform `get(**filters)` contract of §4.4.
    pub fn find<F>(&self, filter: F) -> Vec<(u64, &T)>
    where
        F: Fn(&T) -> bool,
    {
        self.entries.iter().filter(|(_, v)| filter(v)).map(|(k, v)| (*k, v)).collect()
    }

    pub fn find_one<F>(&self, filter: F) -> std::option::Option<(u64, &T)>
    where
        F: Fn(&T) -> bool,
    {
        self.entries.iter().find(|(_, v)| filter(v)).map(|(k, v)| (*k, v))
    }

    pub fn find_one_mut<F>(&mut self, filter: F) -> std::option::Option<(u64, &mut T)>
    where
        F: Fn(&T) -> bool,
    {
        self.entries.iter_mut().find(|(_, v)| filter(v)).map(|(k, v)| (*k, v))
    }
}
