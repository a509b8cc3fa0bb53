//! File-backed entry storage.
//!
//! One JSON document per key (`<encoded key>.json`) under a single root
//! directory. Writes go to a temporary file in the same directory and are
//! renamed into place, so a reader sees either the old or the new document.

use std::collections::BTreeSet;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use super::keys::{CacheKey, ENTRY_SUFFIX};

const TEMP_PREFIX: &str = ".pending-";
const TEMP_SUFFIX: &str = ".tmp";

/// Persisted document for a single key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry<R> {
    /// Epoch milliseconds at which the entry was written.
    pub stored_at: i64,
    pub payload: Vec<R>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryDocument<'a, R> {
    stored_at: i64,
    payload: &'a [R],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryStamp {
    stored_at: i64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache entry `{key}` is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache store unavailable during {op} at `{}`: {source}", .path.display())]
    Unavailable {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode cache entry `{key}`: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn unavailable(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Unavailable {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Directory of individually addressable cache entries.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure the root directory exists. Safe to call repeatedly.
    pub async fn init(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::unavailable("init", &self.root, source))
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Load the entry for `key`; `Ok(None)` when nothing is stored.
    pub async fn read<R: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> Result<Option<StoredEntry<R>>, StoreError> {
        let Some(bytes) = self.read_bytes(key, "read").await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.encode(),
                source,
            })
    }

    /// Load only the write timestamp of the entry for `key`.
    pub async fn read_stamp(&self, key: &CacheKey) -> Result<Option<i64>, StoreError> {
        let Some(bytes) = self.read_bytes(key, "read_stamp").await? else {
            return Ok(None);
        };
        serde_json::from_slice::<EntryStamp>(&bytes)
            .map(|stamp| Some(stamp.stored_at))
            .map_err(|source| StoreError::Corrupt {
                key: key.encode(),
                source,
            })
    }

    async fn read_bytes(
        &self,
        key: &CacheKey,
        op: &'static str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.entry_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::unavailable(op, &path, source)),
        }
    }

    /// Replace the entry for `key` atomically.
    pub async fn write<R: Serialize>(
        &self,
        key: &CacheKey,
        stored_at: i64,
        payload: &[R],
    ) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&EntryDocument { stored_at, payload }).map_err(
            |source| StoreError::Encode {
                key: key.encode(),
                source,
            },
        )?;
        let root = self.root.clone();
        let target = self.entry_path(key);

        tokio::task::spawn_blocking(move || persist_atomically(&root, &target, &body))
            .await
            .map_err(|err| {
                StoreError::unavailable("write", &self.entry_path(key), io::Error::other(err))
            })?
    }

    /// Delete the entry for `key`. Missing entries are treated as success.
    pub async fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::unavailable("remove", &path, source)),
        }
    }

    /// Delete every entry, plus temporary files left by interrupted writes.
    ///
    /// Returns the number of entries removed.
    pub async fn remove_all(&self) -> Result<usize, StoreError> {
        let names = match self.file_names("remove_all").await? {
            Some(names) => names,
            None => return Ok(0),
        };

        let mut removed = 0;
        for name in names {
            let is_entry = entry_stem(&name).is_some();
            if !is_entry && !is_temp_file(&name) {
                continue;
            }
            let path = self.root.join(&name);
            match fs::remove_file(&path).await {
                Ok(()) => {
                    if is_entry {
                        removed += 1;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(StoreError::unavailable("remove_all", &path, source)),
            }
        }

        debug!(
            target = "gearcache::cache::store",
            root = %self.root.display(),
            removed,
            "removed all cache entries"
        );
        Ok(removed)
    }

    /// Encoded keys of every entry currently on disk.
    pub async fn list_keys(&self) -> Result<BTreeSet<String>, StoreError> {
        let names = match self.file_names("list_keys").await? {
            Some(names) => names,
            None => return Ok(BTreeSet::new()),
        };
        Ok(names
            .iter()
            .filter_map(|name| entry_stem(name))
            .map(str::to_string)
            .collect())
    }

    async fn file_names(&self, op: &'static str) -> Result<Option<Vec<String>>, StoreError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::unavailable(op, &self.root, source)),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|source| StoreError::unavailable(op, &self.root, source))?
        {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(Some(names))
    }
}

fn persist_atomically(root: &Path, target: &Path, body: &[u8]) -> Result<(), StoreError> {
    let unavailable = |source: io::Error| StoreError::unavailable("write", target, source);

    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(root)
        .map_err(unavailable)?;
    file.write_all(body).map_err(unavailable)?;
    file.as_file().sync_all().map_err(unavailable)?;
    file.persist(target).map_err(|err| unavailable(err.error))?;
    Ok(())
}

fn entry_stem(name: &str) -> Option<&str> {
    if name.starts_with('.') {
        return None;
    }
    name.strip_suffix(ENTRY_SUFFIX).filter(|stem| !stem.is_empty())
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn key(phase: u32) -> CacheKey {
        CacheKey::new("mage", "frost", phase).expect("valid key")
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn entry(stored_at: i64, payload: &[&str]) -> StoredEntry<String> {
        StoredEntry {
            stored_at,
            payload: strings(payload),
        }
    }

    #[tokio::test]
    async fn read_missing_entry_is_none() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(dir.path());
        store.init().await.expect("init");

        let loaded: Option<StoredEntry<String>> = store.read(&key(1)).await.expect("read");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn write_then_read_roundtrip_uses_documented_layout() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(dir.path());
        store.init().await.expect("init");

        store
            .write(&key(3), 42, &strings(&["helm", "boots"]))
            .await
            .expect("write");

        let loaded: StoredEntry<String> = store
            .read(&key(3))
            .await
            .expect("read")
            .expect("entry present");
        assert_eq!(loaded, entry(42, &["helm", "boots"]));

        let raw = std::fs::read_to_string(dir.path().join("mage_frost_phase3.json"))
            .expect("entry file");
        let doc: serde_json::Value = serde_json::from_str(&raw).expect("json document");
        assert_eq!(doc["storedAt"], 42);
        assert_eq!(doc["payload"][1], "boots");
    }

    #[tokio::test]
    async fn write_replaces_previous_entry_wholesale() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(dir.path());
        store.init().await.expect("init");

        store
            .write(&key(1), 1, &strings(&["a", "b", "c"]))
            .await
            .expect("first write");
        store
            .write(&key(1), 2, &strings(&["z"]))
            .await
            .expect("second write");

        let loaded: StoredEntry<String> = store
            .read(&key(1))
            .await
            .expect("read")
            .expect("entry present");
        assert_eq!(loaded, entry(2, &["z"]));
        assert_eq!(store.list_keys().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unparsable_entry_reports_corrupt() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(dir.path());
        store.init().await.expect("init");
        std::fs::write(dir.path().join("mage_frost_phase2.json"), b"{ not json").expect("seed");

        let err = store
            .read::<String>(&key(2))
            .await
            .expect_err("corrupt entry");
        assert!(err.is_corrupt());
        assert!(store.read_stamp(&key(2)).await.is_err());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(dir.path());
        store.init().await.expect("init");

        store.write(&key(1), 1, &strings(&["a"])).await.expect("write");
        store.remove(&key(1)).await.expect("first remove");
        store.remove(&key(1)).await.expect("second remove");
        assert!(store.read::<String>(&key(1)).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn list_and_remove_all_ignore_foreign_files() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(dir.path());
        store.init().await.expect("init");

        store.write(&key(1), 1, &strings(&["a"])).await.expect("write 1");
        store.write(&key(2), 1, &strings(&["b"])).await.expect("write 2");
        std::fs::write(dir.path().join("README.txt"), b"keep me").expect("foreign file");
        std::fs::write(dir.path().join(".pending-abc.tmp"), b"partial").expect("stale temp");

        let keys = store.list_keys().await.expect("list");
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["mage_frost_phase1".to_string(), "mage_frost_phase2".to_string()]
        );

        assert_eq!(store.remove_all().await.expect("remove all"), 2);
        assert!(store.list_keys().await.expect("list").is_empty());
        assert!(dir.path().join("README.txt").exists());
        assert!(!dir.path().join(".pending-abc.tmp").exists());
        assert_eq!(store.remove_all().await.expect("second remove all"), 0);
    }

    #[tokio::test]
    async fn missing_root_reads_as_empty() {
        let dir = TempDir::new().expect("temp dir");
        let store = FileStore::new(dir.path().join("never-created"));

        assert!(store.list_keys().await.expect("list").is_empty());
        assert_eq!(store.remove_all().await.expect("remove all"), 0);
        assert!(store.read::<String>(&key(1)).await.expect("read").is_none());
    }

    #[tokio::test]
    async fn root_that_is_a_file_reports_unavailable() {
        let dir = TempDir::new().expect("temp dir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").expect("seed");
        let store = FileStore::new(&blocker);

        assert!(matches!(
            store.init().await,
            Err(StoreError::Unavailable { op: "init", .. })
        ));
        assert!(matches!(
            store.write(&key(1), 1, &strings(&["a"])).await,
            Err(StoreError::Unavailable { op: "write", .. })
        ));
        assert!(matches!(
            store.read::<String>(&key(1)).await,
            Err(StoreError::Unavailable { op: "read", .. })
        ));
    }
}
