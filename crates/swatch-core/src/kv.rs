use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::SwatchError;

/// Local key-value backend (the persisted token map, the catalog cache).
///
/// Values are opaque strings; callers write JSON.
pub trait KeyValueStore: Send {
    /// Read the raw value stored under `key`. Absent keys and read failures
    /// both yield `None`.
    fn read(&self, key: &str) -> Option<String>;

    /// Write `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<(), SwatchError>;
}

/// In-memory persistence, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SwatchError> {
        self.entries
            .lock()
            .map_err(|_| SwatchError::Config("memory store poisoned".into()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<T: KeyValueStore + Sync> KeyValueStore for std::sync::Arc<T> {
    fn read(&self, key: &str) -> Option<String> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SwatchError> {
        (**self).write(key, value)
    }
}
