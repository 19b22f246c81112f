//! Per-store write locks.
//!
//! Every mutating operation holds the lock for the file it touches for its
//! whole read-modify-write cycle. Backup-mode operations additionally hold the
//! shared [`STATE_LOCK`] because they all rewrite `state.json`. Locks are
//! always taken file first, state second.
//!
//! Registries are shared by every [`Workspace`](crate::Workspace) handle on the
//! same root within one process. Each write also holds a shared gate that
//! [`FileLocks::exclusive`] takes for operations spanning the whole workspace.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tokio::sync::{
    Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock,
};
use tracing::trace;

/// Lock key guarding the backup-mode `state.json` document.
pub const STATE_LOCK: &str = "@state";

type Registries = Mutex<HashMap<PathBuf, Weak<FileLocks>>>;

static REGISTRIES: OnceLock<Registries> = OnceLock::new();

/// Registry of async mutexes keyed by path hash.
#[derive(Debug, Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    gate: Arc<RwLock<()>>,
}

/// Held locks for one write. Released in reverse order on drop.
#[derive(Debug)]
pub struct WriteGuard {
    registry: Arc<FileLocks>,
    held: Vec<(String, OwnedMutexGuard<()>)>,
    _gate: OwnedRwLockReadGuard<()>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry for the workspace at `root`, shared process-wide.
    pub fn for_root(root: &Path) -> Arc<Self> {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let mut registries = REGISTRIES
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        registries.retain(|_, weak| weak.strong_count() > 0);

        if let Some(existing) = registries.get(&root).and_then(Weak::upgrade) {
            return existing;
        }
        let locks = Arc::new(Self::new());
        registries.insert(root, Arc::downgrade(&locks));
        locks
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(self: &Arc<Self>, key: &str) -> WriteGuard {
        self.lock_all(&[key]).await
    }

    /// Lock `key` and then `state.json`.
    pub async fn lock_with_state(self: &Arc<Self>, key: &str) -> WriteGuard {
        self.lock_all(&[key, STATE_LOCK]).await
    }

    async fn lock_all(self: &Arc<Self>, keys: &[&str]) -> WriteGuard {
        let gate = self.gate.clone().read_owned().await;
        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            let mutex = self.entry(key);
            trace!(key, "Waiting for lock");
            held.push((key.to_string(), mutex.lock_owned().await));
        }
        WriteGuard {
            registry: self.clone(),
            held,
            _gate: gate,
        }
    }

    /// Wait until no write is in flight and keep new ones out.
    pub async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        trace!("Waiting for exclusive workspace access");
        self.gate.clone().write_owned().await
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Forget `key` once nobody holds or waits for it.
    fn prune(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
            locks.remove(key);
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        while let Some((key, guard)) = self.held.pop() {
            drop(guard);
            self.registry.prune(&key);
        }
    }
}
