// memory.rs — In-memory live-style backend.
//
// Behaves like the live registry seen through `RegistryStore`: no deletion
// markers, case-insensitive lookups, value names enumerated in insertion
// order. Used as the live backend on hosts without a registry and in tests.

use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::store::RegistryStore;
use crate::value::TypedValue;

#[derive(Debug, Clone, Default)]
struct KeyNode {
    values: Vec<(String, TypedValue)>,
}

impl KeyNode {
    fn position(&self, value_name: &str) -> Option<usize> {
        let wanted = fold(value_name);
        self.values.iter().position(|(n, _)| fold(n) == wanted)
    }
}

/// An in-memory registry backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    keys: BTreeMap<String, KeyNode>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error (e.g. to model
    /// a registry hive the process has no write access to).
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Total number of values across all keys.
    pub fn len(&self) -> usize {
        self.keys.values().map(|k| k.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self, key: &str) -> Result<(), RegistryError> {
        if self.read_only {
            return Err(RegistryError::Backend {
                key: key.to_string(),
                reason: "access denied".to_string(),
            });
        }
        Ok(())
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl RegistryStore for MemoryStore {
    fn contains(&self, key: &str, value_name: &str) -> bool {
        self.keys
            .get(&fold(key))
            .is_some_and(|node| node.position(value_name).is_some())
    }

    fn get(&self, key: &str, value_name: &str) -> Result<Option<TypedValue>, RegistryError> {
        Ok(self.keys.get(&fold(key)).and_then(|node| {
            node.position(value_name)
                .map(|idx| node.values[idx].1.clone())
        }))
    }

    fn set(&mut self, key: &str, value_name: &str, value: TypedValue) -> Result<(), RegistryError> {
        self.check_writable(key)?;
        let node = self.keys.entry(fold(key)).or_default();
        match node.position(value_name) {
            Some(idx) => node.values[idx].1 = value,
            None => node.values.push((value_name.to_string(), value)),
        }
        Ok(())
    }

    fn delete(&mut self, key: &str, value_name: &str) -> Result<(), RegistryError> {
        self.check_writable(key)?;
        if let Some(node) = self.keys.get_mut(&fold(key)) {
            if let Some(idx) = node.position(value_name) {
                node.values.remove(idx);
            }
        }
        Ok(())
    }

    fn value_names(&self, key: &str) -> Vec<String> {
        self.keys
            .get(&fold(key))
            .map(|node| node.values.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default()
    }

    fn clear_key(&mut self, key: &str) -> Result<(), RegistryError> {
        self.check_writable(key)?;
        self.keys.remove(&fold(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_ignore_case() {
        let mut store = MemoryStore::new();
        store
            .set(r"Software\Policies\Acme", "Level", TypedValue::U32(3))
            .unwrap();
        assert!(store.contains(r"SOFTWARE\policies\acme", "level"));
        assert_eq!(
            store.get(r"software\POLICIES\acme", "LEVEL").unwrap(),
            Some(TypedValue::U32(3))
        );
    }

    #[test]
    fn value_names_keep_insertion_order() {
        let mut store = MemoryStore::new();
        for name in ["b", "a", "c"] {
            store.set("K", name, TypedValue::U32(1)).unwrap();
        }
        assert_eq!(store.value_names("k"), vec!["b", "a", "c"]);
    }

    #[test]
    fn delete_is_idempotent_and_leaves_no_marker() {
        let mut store = MemoryStore::new();
        store.set("K", "v", TypedValue::U32(1)).unwrap();
        store.delete("K", "v").unwrap();
        store.delete("K", "v").unwrap();
        assert!(!store.contains("K", "v"));
        assert!(!store.is_marked_deleted("K", "v"));
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let mut store = MemoryStore::new();
        store.set_read_only(true);
        let err = store.set("K", "v", TypedValue::U32(1)).unwrap_err();
        assert!(matches!(err, RegistryError::Backend { .. }));
        assert!(store.is_empty());
    }
}
