// ABOUTME: Persisted per-document sync state and per-document exclusive sections
// ABOUTME: JSON id->state map rewritten atomically after every transition

use crate::model::SyncState;
use crate::storage::write_atomic;
use crate::Result;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub trait SyncStateStore: Send + Sync {
    fn get(&self, document_id: &str) -> Option<SyncState>;
    fn put(&self, state: &SyncState) -> Result<()>;
    fn all(&self) -> Vec<SyncState>;
}

pub struct FileStateStore {
    path: PathBuf,
    tmp_dir: PathBuf,
    states: Mutex<BTreeMap<String, SyncState>>,
}

impl FileStateStore {
    /// Opens the store, loading any states persisted by earlier runs.
    pub fn open(path: PathBuf, tmp_dir: PathBuf) -> Result<Self> {
        let states = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };

        Ok(FileStateStore {
            path,
            tmp_dir,
            states: Mutex::new(states),
        })
    }
}

impl SyncStateStore for FileStateStore {
    fn get(&self, document_id: &str) -> Option<SyncState> {
        let states = self.states.lock().unwrap_or_else(|p| p.into_inner());
        states.get(document_id).cloned()
    }

    fn put(&self, state: &SyncState) -> Result<()> {
        let mut states = self.states.lock().unwrap_or_else(|p| p.into_inner());
        states.insert(state.document_id.clone(), state.clone());

        fs::create_dir_all(&self.tmp_dir)?;
        let json = serde_json::to_string_pretty(&*states)?;
        write_atomic(&self.path, json.as_bytes(), &self.tmp_dir)
    }

    fn all(&self) -> Vec<SyncState> {
        let states = self.states.lock().unwrap_or_else(|p| p.into_inner());
        states.values().cloned().collect()
    }
}

/// Hands out one async mutex per document id.
///
/// Holding the guard for a whole sync attempt serializes concurrent syncs of
/// the same document while leaving other documents unaffected.
#[derive(Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, document_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(document_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
