// store.rs — The key/value backend abstraction.
//
// Both backends the engine writes to (the live registry and the policy file)
// are reached through `RegistryStore`. Keys and value names compare
// case-insensitively. The trait carries optional hooks that only the
// policy file really implements: delete-marker evidence and "forget"
// operations that drop an entry without leaving a marker behind. Live stores
// get the defaults (no markers; forget is plain delete).

use crate::error::RegistryError;
use crate::value::TypedValue;

/// A registry-like key/value backend.
pub trait RegistryStore {
    /// Whether `value_name` exists under `key`.
    fn contains(&self, key: &str, value_name: &str) -> bool;

    /// Read a value. `Ok(None)` when absent; `Err` when the backend itself
    /// could not be read.
    fn get(&self, key: &str, value_name: &str) -> Result<Option<TypedValue>, RegistryError>;

    /// Create or overwrite a value.
    fn set(&mut self, key: &str, value_name: &str, value: TypedValue) -> Result<(), RegistryError>;

    /// Delete a value. Deleting something absent is not an error.
    fn delete(&mut self, key: &str, value_name: &str) -> Result<(), RegistryError>;

    /// Names of the real values under `key` (never pseudo-values).
    fn value_names(&self, key: &str) -> Vec<String>;

    /// Remove every value under `key`. Clearing an absent key is not an error.
    fn clear_key(&mut self, key: &str) -> Result<(), RegistryError>;

    /// Whether the backend holds evidence that `value_name` was explicitly
    /// deleted. Plain absence is never evidence.
    fn is_marked_deleted(&self, _key: &str, _value_name: &str) -> bool {
        false
    }

    /// Remove a value and any deletion marker for it.
    fn forget_value(&mut self, key: &str, value_name: &str) -> Result<(), RegistryError> {
        self.delete(key, value_name)
    }

    /// Remove every value and marker under `key`.
    fn forget_key(&mut self, key: &str) -> Result<(), RegistryError> {
        self.clear_key(key)
    }

    /// Remove the deletion marker for `value_name`, leaving any value alone.
    fn forget_marker(&mut self, _key: &str, _value_name: &str) -> Result<(), RegistryError> {
        Ok(())
    }

    /// Remove the "key cleared" marker of `key`, leaving its values alone.
    fn forget_key_marker(&mut self, _key: &str) -> Result<(), RegistryError> {
        Ok(())
    }
}
