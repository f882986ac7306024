// pol_store.rs — In-memory key-store over a Registry.pol file.
//
// Entries are indexed by the lowercased (key, value name) pair and remember
// the casing they were first seen with. Deletion is recorded with
// pseudo-values, which is how a policy file says "remove this when the file
// is applied":
//
//   **del.<name>   DWORD 32   the value was explicitly deleted
//   **delvals.     SZ " "     every value under the key was cleared
//
// `forget_value` / `forget_key` drop entries together with their markers,
// which is what returning a policy to NotConfigured needs.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::codec::{self, PolEntry};
use crate::error::RegistryError;
use crate::store::RegistryStore;
use crate::value::{kind, TypedValue};

const PSEUDO_PREFIX: &str = "**";
const DEL_PREFIX: &str = "**del.";
const DELVALS: &str = "**delvals.";

#[derive(Debug, Clone)]
struct Slot {
    entry: PolEntry,
    seq: u64,
}

/// A policy file loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct PolStore {
    entries: BTreeMap<(String, String), Slot>,
    next_seq: u64,
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn is_pseudo(value_name: &str) -> bool {
    value_name.starts_with(PSEUDO_PREFIX)
}

impl PolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse policy file bytes. Strict: any structural problem is an error.
    pub fn parse(bytes: &[u8]) -> Result<Self, RegistryError> {
        let mut store = Self::new();
        for entry in codec::parse(bytes)? {
            store.put(entry);
        }
        Ok(store)
    }

    /// Serialize sorted by key, pseudo-values first within a key. Values
    /// keep the order they were written in, so list items read back in the
    /// order they were supplied.
    pub fn serialize(&self) -> Vec<u8> {
        codec::serialize(self.sorted())
    }

    fn sorted(&self) -> Vec<&PolEntry> {
        let mut slots: Vec<&Slot> = self.entries.values().collect();
        slots.sort_by_cached_key(|s| (fold(&s.entry.key), !is_pseudo(&s.entry.value_name), s.seq));
        slots.into_iter().map(|s| &s.entry).collect()
    }

    /// Load from disk. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        match fs::read(path) {
            Ok(bytes) => {
                let store = Self::parse(&bytes)?;
                debug!(path = %path.display(), entries = store.len(), "loaded policy file");
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "policy file absent, starting empty");
                Ok(Self::new())
            }
            Err(source) => Err(RegistryError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write to disk atomically: a temporary file in the target directory is
    /// renamed over the destination. Parent directories are created.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| RegistryError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| RegistryError::Io {
            path: dir.clone(),
            source,
        })?;
        tmp.write_all(&self.serialize())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| RegistryError::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(path).map_err(|e| RegistryError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        debug!(path = %path.display(), entries = self.len(), "saved policy file");
        Ok(())
    }

    /// Number of entries, pseudo-values included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry in serialization order, pseudo-values included.
    pub fn entries(&self) -> Vec<PolEntry> {
        self.sorted().into_iter().cloned().collect()
    }

    fn put(&mut self, entry: PolEntry) {
        let id = (fold(&entry.key), fold(&entry.value_name));
        match self.entries.get_mut(&id) {
            Some(slot) => {
                slot.entry.kind = entry.kind;
                slot.entry.data = entry.data;
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(id, Slot { entry, seq });
            }
        }
    }

    fn remove(&mut self, key: &str, value_name: &str) {
        self.entries.remove(&(fold(key), fold(value_name)));
    }

    fn has(&self, key: &str, value_name: &str) -> bool {
        self.entries.contains_key(&(fold(key), fold(value_name)))
    }

    fn slots_under<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a Slot> + 'a {
        let folded = fold(key);
        self.entries
            .range((folded.clone(), String::new())..)
            .take_while(move |((k, _), _)| *k == folded)
            .map(|(_, slot)| slot)
    }

    fn remove_key(&mut self, key: &str) {
        let folded = fold(key);
        self.entries.retain(|(k, _), _| *k != folded);
    }
}

impl RegistryStore for PolStore {
    fn contains(&self, key: &str, value_name: &str) -> bool {
        !is_pseudo(value_name) && self.has(key, value_name)
    }

    fn get(&self, key: &str, value_name: &str) -> Result<Option<TypedValue>, RegistryError> {
        if is_pseudo(value_name) {
            return Ok(None);
        }
        Ok(self
            .entries
            .get(&(fold(key), fold(value_name)))
            .map(|slot| TypedValue::decode(slot.entry.kind, &slot.entry.data)))
    }

    fn set(&mut self, key: &str, value_name: &str, value: TypedValue) -> Result<(), RegistryError> {
        let data = value.encode()?;
        self.remove(key, &format!("{DEL_PREFIX}{value_name}"));
        self.put(PolEntry {
            key: key.to_string(),
            value_name: value_name.to_string(),
            kind: value.kind(),
            data,
        });
        Ok(())
    }

    fn delete(&mut self, key: &str, value_name: &str) -> Result<(), RegistryError> {
        self.forget_value(key, value_name)?;
        self.put(PolEntry {
            key: key.to_string(),
            value_name: format!("{DEL_PREFIX}{value_name}"),
            kind: kind::DWORD,
            data: 32u32.to_le_bytes().to_vec(),
        });
        Ok(())
    }

    fn value_names(&self, key: &str) -> Vec<String> {
        let mut slots: Vec<&Slot> = self
            .slots_under(key)
            .filter(|s| !is_pseudo(&s.entry.value_name))
            .collect();
        slots.sort_by_key(|s| s.seq);
        slots
            .into_iter()
            .map(|s| s.entry.value_name.clone())
            .collect()
    }

    fn clear_key(&mut self, key: &str) -> Result<(), RegistryError> {
        self.remove_key(key);
        self.put(PolEntry {
            key: key.to_string(),
            value_name: DELVALS.to_string(),
            kind: kind::STRING,
            data: TypedValue::String(" ".to_string()).encode()?,
        });
        Ok(())
    }

    fn is_marked_deleted(&self, key: &str, value_name: &str) -> bool {
        if self.has(key, value_name) {
            return false;
        }
        self.has(key, &format!("{DEL_PREFIX}{value_name}")) || self.has(key, DELVALS)
    }

    fn forget_value(&mut self, key: &str, value_name: &str) -> Result<(), RegistryError> {
        self.remove(key, value_name);
        self.remove(key, &format!("{DEL_PREFIX}{value_name}"));
        Ok(())
    }

    fn forget_key(&mut self, key: &str) -> Result<(), RegistryError> {
        self.remove_key(key);
        Ok(())
    }

    fn forget_marker(&mut self, key: &str, value_name: &str) -> Result<(), RegistryError> {
        self.remove(key, &format!("{DEL_PREFIX}{value_name}"));
        Ok(())
    }

    fn forget_key_marker(&mut self, key: &str) -> Result<(), RegistryError> {
        self.remove(key, DELVALS);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = r"Software\Policies\Acme";

    #[test]
    fn first_seen_case_is_preserved() {
        let mut store = PolStore::new();
        store.set(KEY, "Level", TypedValue::U32(1)).unwrap();
        store
            .set(&KEY.to_uppercase(), "LEVEL", TypedValue::U32(2))
            .unwrap();
        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, KEY);
        assert_eq!(entries[0].value_name, "Level");
        assert_eq!(store.get(KEY, "level").unwrap(), Some(TypedValue::U32(2)));
    }

    #[test]
    fn delete_writes_marker_and_hides_value() {
        let mut store = PolStore::new();
        store.set(KEY, "Level", TypedValue::U32(1)).unwrap();
        store.delete(KEY, "Level").unwrap();

        assert!(!store.contains(KEY, "Level"));
        assert!(store.is_marked_deleted(KEY, "level"));
        assert!(store.value_names(KEY).is_empty());

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value_name, "**del.Level");
        assert_eq!(entries[0].kind, kind::DWORD);
        assert_eq!(entries[0].data, vec![32, 0, 0, 0]);
    }

    #[test]
    fn set_after_delete_drops_marker() {
        let mut store = PolStore::new();
        store.delete(KEY, "Level").unwrap();
        store.set(KEY, "Level", TypedValue::U32(5)).unwrap();
        assert!(!store.is_marked_deleted(KEY, "Level"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_key_replaces_values_with_delvals_marker() {
        let mut store = PolStore::new();
        store.set(KEY, "a", TypedValue::String("x".into())).unwrap();
        store.set(KEY, "b", TypedValue::String("y".into())).unwrap();
        store.set(r"Software\Other", "a", TypedValue::U32(1)).unwrap();
        store.clear_key(KEY).unwrap();

        assert!(store.value_names(KEY).is_empty());
        assert!(store.is_marked_deleted(KEY, "anything"));
        assert!(store.contains(r"Software\Other", "a"));
        let entries = store.entries();
        let marker = entries
            .iter()
            .find(|e| e.value_name == "**delvals.")
            .expect("delvals marker");
        assert_eq!(marker.kind, kind::STRING);
        assert_eq!(marker.data, vec![b' ', 0, 0, 0]);
    }

    #[test]
    fn forget_leaves_no_evidence() {
        let mut store = PolStore::new();
        store.delete(KEY, "Level").unwrap();
        store.forget_value(KEY, "Level").unwrap();
        assert!(store.is_empty());

        store.clear_key(KEY).unwrap();
        store.set(KEY, "1", TypedValue::String("a".into())).unwrap();
        store.forget_key(KEY).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn value_names_follow_insertion_order_and_skip_pseudo_values() {
        let mut store = PolStore::new();
        store.set(KEY, "zeta", TypedValue::U32(1)).unwrap();
        store.delete(KEY, "gone").unwrap();
        store.set(KEY, "alpha", TypedValue::U32(2)).unwrap();
        assert_eq!(store.value_names(KEY), vec!["zeta", "alpha"]);
    }

    #[test]
    fn serialization_sorts_keys_with_markers_first_and_keeps_write_order() {
        let mut store = PolStore::new();
        store.set(r"B\Key", "x", TypedValue::U32(1)).unwrap();
        store.set(r"A\Key", "b", TypedValue::U32(1)).unwrap();
        store.delete(r"A\Key", "c").unwrap();
        store.set(r"A\Key", "!bang", TypedValue::U32(1)).unwrap();
        let names: Vec<(String, String)> = store
            .entries()
            .into_iter()
            .map(|e| (e.key, e.value_name))
            .collect();
        assert_eq!(
            names,
            vec![
                (r"A\Key".to_string(), "**del.c".to_string()),
                (r"A\Key".to_string(), "b".to_string()),
                (r"A\Key".to_string(), "!bang".to_string()),
                (r"B\Key".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn missing_file_loads_empty_and_save_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Machine").join("Registry.pol");
        let mut store = PolStore::load(&path).unwrap();
        assert!(store.is_empty());

        store
            .set(KEY, "Names", TypedValue::MultiString(vec!["a".into(), "b".into()]))
            .unwrap();
        store.save(&path).unwrap();

        let reloaded = PolStore::load(&path).unwrap();
        assert_eq!(
            reloaded.get(KEY, "Names").unwrap(),
            Some(TypedValue::MultiString(vec!["a".into(), "b".into()]))
        );
        assert_eq!(std::fs::read(&path).unwrap(), store.serialize());
    }

    #[test]
    fn markers_can_be_dropped_without_touching_values() {
        let mut store = PolStore::new();
        store.delete(KEY, "Level").unwrap();
        store.clear_key(r"A\Key").unwrap();
        store.set(KEY, "Other", TypedValue::U32(1)).unwrap();

        store.forget_marker(KEY, "Level").unwrap();
        store.forget_key_marker(r"A\Key").unwrap();
        assert!(!store.is_marked_deleted(KEY, "Level"));
        assert!(!store.is_marked_deleted(r"A\Key", "x"));
        assert_eq!(store.get(KEY, "Other").unwrap(), Some(TypedValue::U32(1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn corrupt_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Registry.pol");
        std::fs::write(&path, b"not a policy file").unwrap();
        let err = PolStore::load(&path).unwrap_err();
        assert!(err.is_format());
    }
}
