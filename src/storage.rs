use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{WikiError, WikiResult};

/// The single key the whole wiki is stored under.
pub const STORAGE_KEY: &str = "sethael-wiki-data";

const STORAGE_FILE: &str = "storage.json";

pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> impl Future<Output = WikiResult<Option<String>>> + Send;
    fn write(&self, key: &str, value: &str) -> impl Future<Output = WikiResult<()>> + Send;
}

/// All keys live in one JSON object on disk; each write rewrites the file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STORAGE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_map(&self) -> WikiResult<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    async fn read(&self, key: &str) -> WikiResult<Option<String>> {
        Ok(self.load_map().await?.remove(key))
    }

    async fn write(&self, key: &str, value: &str) -> WikiResult<()> {
        let mut map = match self.load_map().await {
            Ok(map) => map,
            Err(WikiError::Json(error)) => {
                tracing::warn!(path = %self.path.display(), error = %error, "replacing unreadable storage file");
                BTreeMap::new()
            }
            Err(error) => return Err(error),
        };
        map.insert(key.to_string(), value.to_string());
        let encoded = serde_json::to_string(&map)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory store with switchable failure, used by tests and as a
/// scratch backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        store.insert(key, value);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn insert(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }

    fn check(&self) -> WikiResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(WikiError::Io("storage unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> WikiResult<Option<String>> {
        self.check()?;
        Ok(self.value(key))
    }

    async fn write(&self, key: &str, value: &str) -> WikiResult<()> {
        self.check()?;
        self.insert(key, value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub key: String,
    pub value: String,
}

/// The lenient get/set surface. Callers cannot tell "missing" from
/// "unavailable"; code that needs the difference goes through `store()`.
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get(&self, key: &str) -> Option<Stored> {
        match self.store.read(key).await {
            Ok(Some(value)) => Some(Stored {
                key: key.to_string(),
                value,
            }),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(key, error = %error, "storage read failed");
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: impl Into<String>) -> Option<Stored> {
        let value = value.into();
        match self.store.write(key, &value).await {
            Ok(()) => {
                tracing::debug!(key, bytes = value.len(), "stored value");
                Some(Stored {
                    key: key.to_string(),
                    value,
                })
            }
            Err(error) => {
                tracing::warn!(key, error = %error, "storage write failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_and_failing_both_yield_none() {
        let shim = Persistence::new(MemoryStore::new());
        assert_eq!(shim.get(STORAGE_KEY).await, None);

        shim.store().set_failing(true);
        assert_eq!(shim.set(STORAGE_KEY, "{}").await, None);
        assert_eq!(shim.get(STORAGE_KEY).await, None);
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let shim = Persistence::new(MemoryStore::new());
        let stored = shim.set("k", "v").await.unwrap();
        assert_eq!(stored.key, "k");
        assert_eq!(shim.get("k").await.unwrap().value, "v");
    }

    #[tokio::test]
    async fn file_store_write_replaces_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(store.read(STORAGE_KEY).await.is_err());
        store.write(STORAGE_KEY, "blob").await.unwrap();
        assert_eq!(store.read(STORAGE_KEY).await.unwrap().as_deref(), Some("blob"));
    }
}
