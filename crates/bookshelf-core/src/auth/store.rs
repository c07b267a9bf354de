//! Persistent credential storage.
//!
//! The session persists exactly two string entries under fixed keys: the
//! bearer token and the serialized user profile. Consumers take the store
//! as an explicit `Box<dyn CredentialStore>` so tests can substitute the
//! in-memory backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

/// Storage key for the bearer token
pub const KEY_TOKEN: &str = "auth_token";

/// Storage key for the serialized user profile
pub const KEY_USER: &str = "user_data";

/// Credentials file name used by the file-backed store
const CREDENTIALS_FILE: &str = "credentials.json";

/// Key-value storage surviving process restarts.
///
/// Deleting a key that does not exist is not an error.
pub trait CredentialStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

impl<S: CredentialStore + Send + Sync> CredentialStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }
}

/// File-backed store: one JSON object in the app's config directory.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(CREDENTIALS_FILE),
        }
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read credentials file")?;
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, contents).context("Failed to write credentials file")
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map().unwrap_or_default();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.read_map().unwrap_or_default();
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// OS keychain-backed store via the `keyring` crate.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read credential from keychain"),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

/// In-memory store for tests. `set_failing(true)` makes every operation
/// return an error, to exercise storage-failure paths.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
    failing: Mutex<bool>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock().unwrap() {
            anyhow::bail!("storage unavailable");
        }
        Ok(())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().to_path_buf());

        assert!(store.get(KEY_TOKEN).unwrap().is_none());

        store.put(KEY_TOKEN, "tok-1").unwrap();
        store.put(KEY_USER, r#"{"id":"1"}"#).unwrap();
        assert_eq!(store.get(KEY_TOKEN).unwrap().as_deref(), Some("tok-1"));
        assert_eq!(store.get(KEY_USER).unwrap().as_deref(), Some(r#"{"id":"1"}"#));

        store.delete(KEY_TOKEN).unwrap();
        assert!(store.get(KEY_TOKEN).unwrap().is_none());
        // Deleting again is fine
        store.delete(KEY_TOKEN).unwrap();
    }

    #[test]
    fn memory_store_failure_toggle() {
        let store = MemoryCredentialStore::new();
        store.put(KEY_TOKEN, "tok").unwrap();

        store.set_failing(true);
        assert!(store.get(KEY_TOKEN).is_err());
        assert!(store.put(KEY_TOKEN, "x").is_err());
        assert!(store.delete(KEY_TOKEN).is_err());

        store.set_failing(false);
        assert_eq!(store.get(KEY_TOKEN).unwrap().as_deref(), Some("tok"));
    }
}
