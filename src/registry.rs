//! Runtime dispatch table for compiled partials.
//!
//! Each entry is the source of one callable unit, keyed by partial name. The
//! assembly stage splices `entries()` into the name → callable table of the
//! generated program.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialTable {
    units: IndexMap<String, String>,
}

impl PartialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `unit` under `name` unless the name is already taken.
    /// Returns `true` when the entry was inserted.
    pub fn insert_if_absent(&mut self, name: &str, unit: String) -> bool {
        if self.units.contains_key(name) {
            return false;
        }
        self.units.insert(name.to_string(), unit);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.units.get(name).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(|k| k.as_str())
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.units.values().map(|v| v.as_str())
    }

    /// Adds every entry of `other` this table does not already hold.
    pub fn absorb(&mut self, other: PartialTable) {
        for (name, unit) in other.units {
            self.units.entry(name).or_insert(unit);
        }
    }
}
