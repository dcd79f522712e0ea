//! # Persistent Storage Layer
//!
//! Checkpoints of the state store live in a Sled database so that
//! connections, changes and device readiness survive restarts.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value | Purpose |
//! |------|-----|-------|---------|
//! | `state` | `snapshot` | JSON [`Snapshot`] | Last checkpoint |
//!
//! A checkpoint replaces the previous one as a whole and is flushed before
//! returning, so a crash leaves either the old or the new snapshot on disk.
//!
//! ## Security Notes
//!
//! - The database directory should only be writable by the daemon.
//! - A snapshot that fails to deserialize is reported, never silently reset.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::error::Result;

const STATE_TREE: &str = "state";
const SNAPSHOT_KEY: &str = "snapshot";

/// Serialized form of the whole state store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub data: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub last_change_id: u64,
}

/// Wrapper around a Sled database holding state checkpoints.
///
/// # Example
///
/// ```rust
/// use confine_state::storage::{Snapshot, Storage};
///
/// let storage = Storage::temporary().unwrap();
/// assert!(storage.load().unwrap().is_none());
///
/// storage.save(&Snapshot::default()).unwrap();
/// assert!(storage.load().unwrap().is_some());
/// ```
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
    state: sled::Tree,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Database` if the path is unusable or the
    /// database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let state = db.open_tree(STATE_TREE)?;
        Ok(Storage { db, state })
    }

    /// Creates an in-memory storage, lost on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let state = db.open_tree(STATE_TREE)?;
        Ok(Storage { db, state })
    }

    /// Writes a checkpoint and flushes it to disk.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.state.insert(SNAPSHOT_KEY, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Reads the last checkpoint, if any.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        match self.state.get(SNAPSHOT_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("has_snapshot", &self.state.contains_key(SNAPSHOT_KEY).unwrap_or(false))
            .finish()
    }
}
