//! Ownership ledger: which live connections this engine created itself.
//!
//! Any connection not recorded here belongs to someone else and must never be torn
//! down by a reconciliation pass.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipLedger {
    owned: BTreeMap<String, BTreeSet<String>>,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, destination: &str, source: &str) {
        self.owned
            .entry(destination.to_string())
            .or_default()
            .insert(source.to_string());
    }

    pub fn release(&mut self, destination: &str, source: &str) -> bool {
        let Some(set) = self.owned.get_mut(destination) else {
            return false;
        };
        let removed = set.remove(source);
        if set.is_empty() {
            self.owned.remove(destination);
        }
        removed
    }

    pub fn owns(&self, destination: &str, source: &str) -> bool {
        self.owned
            .get(destination)
            .is_some_and(|set| set.contains(source))
    }

    pub fn sources_of(&self, destination: &str) -> Vec<String> {
        self.owned
            .get(destination)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget entries whose connection no longer exists (torn down by a third party
    /// or by the port vanishing), so they are not mistaken for ours later.
    pub fn retain_live(&mut self, destination: &str, live: &[String]) {
        if let Some(set) = self.owned.get_mut(destination) {
            set.retain(|s| live.contains(s));
            if set.is_empty() {
                self.owned.remove(destination);
            }
        }
    }

    /// Drop destinations for which `keep` returns false.
    pub fn retain_destinations(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.owned.retain(|dest, _| keep(dest));
    }

    pub fn len(&self) -> usize {
        self.owned.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    pub fn clear(&mut self) {
        self.owned.clear();
    }
}
