use std::{collections::BTreeMap, io::Write, path::{Path, PathBuf}, sync::Arc};

use arc_swap::ArcSwap;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::observability::BACKUP_FAILURES_TOTAL;

/// Generic JSON file-backed key-value map store.
///
/// Persists a `BTreeMap<K, V>` to a JSON file. Readers get an immutable
/// snapshot and never wait for writers. Mutations are serialized by a
/// single write gate and work on a copy of the current snapshot; the copy
/// is published only after it has been written to disk, so a failed write
/// leaves memory and file in agreement. Once a write has started it runs
/// to publication even if the caller stops waiting for it.
pub struct JsonMapStore<K, V> {
    snapshot: Arc<ArcSwap<BTreeMap<K, V>>>,
    write_gate: Arc<Mutex<()>>,
    file_path: PathBuf,
    backup_path: Option<PathBuf>,
}

impl<K, V> JsonMapStore<K, V>
where
    K: Ord + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Load the map from `path`. A missing file is created holding `{}`;
    /// an unreadable or malformed file is an error.
    pub async fn open<P: Into<PathBuf>>(path: P) -> Result<Self, ServiceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::persistence(&format!("create {}", parent.display()), e))?;
        }

        let map: BTreeMap<K, V> = match tokio::fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::persistence(&format!("parse {}", file_path.display()), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty: BTreeMap<K, V> = BTreeMap::new();
                let data = serde_json::to_vec(&empty).map_err(|e| ServiceError::persistence("serialize", e))?;
                write_atomic(file_path.clone(), data).await?;
                empty
            }
            Err(e) => return Err(ServiceError::persistence(&format!("read {}", file_path.display()), e)),
        };
        debug!(file = %file_path.display(), entries = map.len(), "json map store loaded");

        Ok(Self {
            snapshot: Arc::new(ArcSwap::from_pointee(map)),
            write_gate: Arc::new(Mutex::new(())),
            file_path,
            backup_path: None,
        })
    }

    /// Also write a pretty-printed copy to `path` after every mutation.
    pub fn with_backup(mut self, path: Option<PathBuf>) -> Self {
        self.backup_path = path;
        self
    }

    /// Current published state.
    pub fn snapshot(&self) -> Arc<BTreeMap<K, V>> {
        self.snapshot.load_full()
    }

    /// List all entries as `(key, value)` pairs, ordered by key.
    pub fn list(&self) -> Vec<(K, V)> {
        self.snapshot().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Get value by key.
    pub fn get(&self, key: &K) -> Option<V> {
        self.snapshot().get(key).cloned()
    }

    pub fn len(&self) -> usize { self.snapshot().len() }

    pub fn is_empty(&self) -> bool { self.snapshot().is_empty() }

    /// Apply a mutation under the write gate and persist the whole map.
    ///
    /// If `f` fails nothing is written. If the write fails the mutation is
    /// discarded and readers keep seeing the previous state.
    ///
    /// Write, backup and publish run as one blocking task that owns the
    /// write gate, so dropping the returned future after the write has
    /// started cannot leave the file ahead of the published snapshot.
    pub async fn update_map<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut BTreeMap<K, V>) -> Result<T, ServiceError>,
    {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        let current = self.snapshot.load_full();
        let mut next: BTreeMap<K, V> = (*current).clone();
        let out = f(&mut next)?;
        let data = serde_json::to_vec(&next).map_err(|e| ServiceError::persistence("serialize", e))?;

        let snapshot = Arc::clone(&self.snapshot);
        let file_path = self.file_path.clone();
        let backup_path = self.backup_path.clone();
        tokio::task::spawn_blocking(move || {
            let _gate = gate;
            write_atomic_blocking(&file_path, &data)?;
            if let Some(path) = backup_path {
                write_backup_blocking(&path, &next);
            }
            snapshot.store(Arc::new(next));
            Ok::<(), ServiceError>(())
        })
        .await
        .map_err(|e| ServiceError::persistence("join writer task", e))??;
        Ok(out)
    }

    /// Insert or replace a value by key and persist.
    pub async fn insert(&self, key: K, value: V) -> Result<(), ServiceError> {
        self.update_map(|m| {
            m.insert(key, value);
            Ok(())
        })
        .await
    }

    /// Remove a key and persist; returns whether it existed.
    pub async fn remove(&self, key: &K) -> Result<bool, ServiceError> {
        self.update_map(|m| Ok(m.remove(key).is_some())).await
    }
}

/// Best effort: failures are logged and counted, never returned.
fn write_backup_blocking<K: Serialize, V: Serialize>(path: &Path, map: &BTreeMap<K, V>) {
    let result = serde_json::to_vec_pretty(map)
        .map_err(|e| ServiceError::persistence("serialize backup", e))
        .and_then(|data| write_atomic_blocking(path, &data));
    if let Err(e) = result {
        BACKUP_FAILURES_TOTAL.inc();
        warn!(backup = %path.display(), error = %e, "backup write failed");
    }
}

/// Replace `path` with `data` via a temp file in the same directory:
/// write, fsync, rename. A crash leaves either the old or the new file.
async fn write_atomic(path: PathBuf, data: Vec<u8>) -> Result<(), ServiceError> {
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &data))
        .await
        .map_err(|e| ServiceError::persistence("join writer task", e))?
}

fn write_atomic_blocking(path: &Path, data: &[u8]) -> Result<(), ServiceError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let context = format!("write {}", path.display());
    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| ServiceError::persistence(&context, e))?;
    temp.write_all(data).map_err(|e| ServiceError::persistence(&context, e))?;
    temp.as_file().sync_all().map_err(|e| ServiceError::persistence(&context, e))?;
    temp.persist(path).map_err(|e| ServiceError::persistence(&context, e.error))?;
    Ok(())
}
