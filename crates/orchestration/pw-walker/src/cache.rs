//! Persisted traversal cache.
//!
//! The cache maps `bucket:prefix` to a completion marker. A prefix is marked
//! complete once every page of its listing has been consumed, which lets a
//! later run skip re-emitting that prefix's files while still descending into
//! its children.
//!
//! The in-memory map is authoritative during a run. Every [`set`] schedules a
//! background flush of the whole map; flushes are coalesced by a single task so
//! bursts of completions turn into a handful of file writes. [`sync`] performs
//! a final synchronous flush. Losing a flush only costs redundant emission on
//! the next run, never missed files.
//!
//! [`set`]: TraversalCache::set
//! [`sync`]: TraversalCache::sync

use parking_lot::Mutex;
use pw_error::CacheError;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Value stored for a fully enumerated prefix.
pub const COMPLETE_MARKER: &str = "1";

/// Length of the hex fingerprint used in cache file names.
const FINGERPRINT_LEN: usize = 12;

/// Build the cache key for a prefix of a bucket.
pub fn cache_key(bucket: &str, prefix: &str) -> String {
    format!("{bucket}:{prefix}")
}

/// Short, stable hex fingerprint of a credential identity.
///
/// Used to keep cache files of different accounts apart without writing the
/// credentials themselves to disk.
pub fn credential_fingerprint(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    let mut hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Default cache file name for a fingerprint, relative to the working directory.
pub fn default_cache_path(fingerprint: &str) -> PathBuf {
    PathBuf::from(format!("prefixwalk.{fingerprint}.cache"))
}

/// Thread-safe traversal cache backed by a JSON file.
pub struct TraversalCache {
    inner: Arc<CacheInner>,
    flusher: Option<JoinHandle<()>>,
}

struct CacheInner {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    /// Serializes file writes and removal. Always taken before `entries`.
    write_lock: Mutex<()>,
    dirty: Notify,
}

impl TraversalCache {
    /// Open the cache stored at `path`.
    ///
    /// A missing file yields an empty cache. An unreadable or corrupt file is
    /// logged and also yields an empty cache.
    ///
    /// When called inside a Tokio runtime a background flusher task is spawned;
    /// otherwise every [`set`](Self::set) persists inline.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);

        debug!(path = %path.display(), entries = entries.len(), "Loaded traversal cache");

        let inner = Arc::new(CacheInner {
            path,
            entries: Mutex::new(entries),
            write_lock: Mutex::new(()),
            dirty: Notify::new(),
        });

        let flusher = tokio::runtime::Handle::try_current()
            .ok()
            .map(|handle| handle.spawn(flush_loop(Arc::clone(&inner))));

        Self { inner, flusher }
    }

    /// Path of the durable cache file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.entries.lock().get(key).cloned()
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    /// Insert or overwrite a key and schedule a background persist.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.entries.lock().insert(key.into(), value.into());
        self.schedule_persist();
    }

    /// Remove a key and schedule a background persist.
    pub fn remove(&self, key: &str) -> Option<String> {
        let removed = self.inner.entries.lock().remove(key);
        if removed.is_some() {
            self.schedule_persist();
        }
        removed
    }

    /// Number of entries currently held in memory.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the current map to disk, blocking until done.
    ///
    /// An empty map is not written when no cache file exists.
    pub fn sync(&self) -> Result<(), CacheError> {
        self.inner.persist()
    }

    /// Drop every entry and delete the cache file.
    pub fn clear(&self) -> Result<(), CacheError> {
        let _write = self.inner.write_lock.lock();
        self.inner.entries.lock().clear();

        match fs::remove_file(&self.inner.path) {
            Ok(()) => {
                debug!(path = %self.inner.path.display(), "Removed traversal cache file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    fn schedule_persist(&self) {
        if self.flusher.is_some() {
            self.inner.dirty.notify_one();
        } else if let Err(e) = self.inner.persist() {
            warn!(path = %self.inner.path.display(), error = %e, "Failed to persist traversal cache");
        }
    }
}

impl Drop for TraversalCache {
    fn drop(&mut self) {
        if let Some(flusher) = self.flusher.take() {
            flusher.abort();
        }
    }
}

impl std::fmt::Debug for TraversalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraversalCache")
            .field("path", &self.inner.path)
            .field("entries", &self.len())
            .finish()
    }
}

impl CacheInner {
    fn persist(&self) -> Result<(), CacheError> {
        let _write = self.write_lock.lock();

        let snapshot: BTreeMap<String, String> = self
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        // A flush queued before `clear` must not bring the file back.
        if snapshot.is_empty() && !self.path.exists() {
            trace!(path = %self.path.display(), "Nothing to persist");
            return Ok(());
        }

        let data = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a half-written cache behind.
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;

        trace!(path = %self.path.display(), entries = snapshot.len(), "Persisted traversal cache");
        Ok(())
    }
}

async fn flush_loop(inner: Arc<CacheInner>) {
    loop {
        inner.dirty.notified().await;

        let target = Arc::clone(&inner);
        match tokio::task::spawn_blocking(move || target.persist()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(path = %inner.path.display(), error = %e, "Failed to persist traversal cache");
            }
            Err(e) => {
                warn!(error = %e, "Traversal cache flush task failed");
            }
        }
    }
}

fn load_entries(path: &Path) -> HashMap<String, String> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read traversal cache, starting empty");
            return HashMap::new();
        }
    };

    match serde_json::from_slice(&data) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Traversal cache is corrupt, starting empty");
            HashMap::new()
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
