//! Durable key → bool storage shared by the coordinator and the connectivity
//! monitor. Each key has exactly one writer.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Monitoring toggle, written by the coordinator.
pub const MONITORING_ENABLED: &str = "monitoring.enabled";
/// Last observed connectivity, written by the connectivity monitor.
pub const WAS_CONNECTED: &str = "connectivity.wasConnected";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store write rejected")]
    Rejected,
    #[error("store lock poisoned")]
    Poisoned,
}

/// Synchronous flag store. Writes are atomic per key: a reader never sees a
/// partially written value.
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<bool>, StoreError>;
    fn set(&self, key: &str, value: bool) -> Result<(), StoreError>;
}

/// Read a flag, treating a missing or unreadable value as `false`.
pub fn read_flag(store: &dyn FlagStore, key: &str) -> bool {
    match store.get(key) {
        Ok(v) => v.unwrap_or(false),
        Err(e) => {
            tracing::warn!(key, error = %e, "flag read failed, defaulting to false");
            false
        }
    }
}

/// Write a flag, logging failures.
pub fn write_flag(store: &dyn FlagStore, key: &str, value: bool) -> bool {
    match store.set(key, value) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key, value, error = %e, "flag write failed");
            false
        }
    }
}

/// In-process store. Survives coordinator reconstruction, not process exit.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    flags: Mutex<HashMap<String, bool>>,
    reject_writes: AtomicBool,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail until switched back.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let flags = self.flags.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(flags.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected);
        }
        let mut flags = self.flags.lock().map_err(|_| StoreError::Poisoned)?;
        flags.insert(key.to_owned(), value);
        Ok(())
    }
}

/// JSON file store. Every write replaces the whole file via a temp file and
/// rename, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileFlagStore {
    path: PathBuf,
    flags: Mutex<BTreeMap<String, bool>>,
}

impl FileFlagStore {
    /// Open the store at `path`. A missing file is an empty store; a corrupt
    /// one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let flags = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, bool>>(&bytes) {
                Ok(flags) => flags,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "flag store unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), keys = flags.len(), "flag store opened");
        Ok(Self {
            path,
            flags: Mutex::new(flags),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, flags: &BTreeMap<String, bool>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, flags)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl FlagStore for FileFlagStore {
    fn get(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let flags = self.flags.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(flags.get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut flags = self.flags.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = flags.clone();
        next.insert(key.to_owned(), value);
        self.persist(&next)?;
        *flags = next;
        Ok(())
    }
}
