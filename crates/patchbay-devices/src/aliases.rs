//! User-assigned friendly names, keyed by stable uid.
//!
//! The table lives as long as the process. It is serialized as a flat
//! `uid -> name` map so an outer configuration layer can persist and restore it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    names: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uid: &str) -> Option<&str> {
        self.names.get(uid).map(String::as_str)
    }

    /// Set the friendly name for `uid`. An empty name removes the entry.
    ///
    /// Returns the previous name.
    pub fn set(&mut self, uid: impl Into<String>, name: impl Into<String>) -> Option<String> {
        let uid = uid.into();
        let name = name.into();
        if name.trim().is_empty() {
            return self.names.remove(&uid);
        }
        self.names.insert(uid, name)
    }

    pub fn remove(&mut self, uid: &str) -> Option<String> {
        self.names.remove(uid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl From<BTreeMap<String, String>> for AliasTable {
    fn from(mut names: BTreeMap<String, String>) -> Self {
        names.retain(|_, v| !v.trim().is_empty());
        Self { names }
    }
}

impl From<AliasTable> for BTreeMap<String, String> {
    fn from(table: AliasTable) -> Self {
        table.names
    }
}

impl FromIterator<(String, String)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        BTreeMap::from_iter(iter).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut table = AliasTable::new();
        assert_eq!(table.set("USB:1.1 IN", "Keys"), None);
        assert_eq!(table.set("USB:1.1 IN", "Main keys"), Some("Keys".to_string()));
        assert_eq!(table.get("USB:1.1 IN"), Some("Main keys"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_name_clears() {
        let mut table = AliasTable::new();
        table.set("a", "A");
        table.set("a", "  ");
        assert!(table.is_empty());
    }

    #[test]
    fn test_map_conversion() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), "A".to_string());
        map.insert("b".to_string(), String::new());

        let table = AliasTable::from(map);
        assert_eq!(table.len(), 1);

        let back: BTreeMap<String, String> = table.into();
        assert_eq!(back.get("a").map(String::as_str), Some("A"));
    }
}
