//! # State Store
//!
//! The single lock-protected store of persistent daemon state: arbitrary
//! JSON values by key, plus the list of changes.
//!
//! ## Locking Protocol
//!
//! ```text
//!   state.lock() ──▶ StateGuard ──▶ get / set / changes ...
//!                        │
//!                        ├─ checkpoint(): write if dirty, errors returned
//!                        └─ drop: checkpoint if still dirty, then unlock
//! ```
//!
//! Every read and write goes through a [`StateGuard`]. The guard releases
//! the lock on every exit path, including unwinding, so a failing operation
//! can never leave the store locked.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::change::{Change, Status};
use crate::error::{Result, StateError};
use crate::storage::{Snapshot, Storage};

#[derive(Debug, Default)]
struct StateData {
    data: BTreeMap<String, serde_json::Value>,
    changes: Vec<Change>,
    last_change_id: u64,
    dirty: bool,
}

impl StateData {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            data: snapshot.data,
            changes: snapshot.changes,
            last_change_id: snapshot.last_change_id,
            dirty: false,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: self.data.clone(),
            changes: self.changes.clone(),
            last_change_id: self.last_change_id,
        }
    }
}

/// Shared daemon state.
///
/// # Example
///
/// ```rust
/// use confine_state::State;
///
/// let state = State::new();
/// {
///     let mut st = state.lock();
///     st.set("seeded", &true).unwrap();
/// }
/// assert_eq!(state.lock().get::<bool>("seeded").unwrap(), Some(true));
/// ```
#[derive(Debug)]
pub struct State {
    inner: Mutex<StateData>,
    storage: Option<Storage>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Creates an empty, memory-only state.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StateData::default()),
            storage: None,
        }
    }

    /// Opens state backed by a database at `path`, restoring the last
    /// checkpoint if there is one.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Database` or `StateError::Serialization` if the
    /// database cannot be opened or its checkpoint cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_storage(Storage::open(path)?)
    }

    /// Creates state on top of an already opened storage.
    pub fn with_storage(storage: Storage) -> Result<Self> {
        let data = match storage.load()? {
            Some(snapshot) => {
                info!(
                    "Restored state checkpoint ({} keys, {} changes)",
                    snapshot.data.len(),
                    snapshot.changes.len()
                );
                StateData::from_snapshot(snapshot)
            }
            None => StateData::default(),
        };
        Ok(Self {
            inner: Mutex::new(data),
            storage: Some(storage),
        })
    }

    /// Acquires the state lock.
    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            storage: self.storage.as_ref(),
            data: self.inner.lock(),
        }
    }
}

/// Exclusive access to the state.
pub struct StateGuard<'a> {
    storage: Option<&'a Storage>,
    data: MutexGuard<'a, StateData>,
}

impl StateGuard<'_> {
    /// Reads and deserializes a value.
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores a value.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.data.insert(key.to_string(), value);
        self.data.dirty = true;
        Ok(())
    }

    /// Removes a key; returns whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let existed = self.data.data.remove(key).is_some();
        if existed {
            self.data.dirty = true;
        }
        existed
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.data.contains_key(key)
    }

    /// Registers a new change in status `Do` and returns its id.
    pub fn new_change<I, S>(&mut self, kind: &str, summary: &str, snaps: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.last_change_id += 1;
        let id = self.data.last_change_id.to_string();
        self.data.changes.push(Change {
            id: id.clone(),
            kind: kind.to_string(),
            summary: summary.to_string(),
            status: Status::Do,
            snaps: snaps.into_iter().map(Into::into).collect(),
        });
        self.data.dirty = true;
        debug!("New {} change {}: {}", kind, id, summary);
        id
    }

    pub fn change(&self, id: &str) -> Option<&Change> {
        self.data.changes.iter().find(|c| c.id == id)
    }

    /// All changes, oldest first.
    pub fn changes(&self) -> &[Change] {
        &self.data.changes
    }

    /// Changes still in flight, oldest first.
    pub fn in_flight_changes(&self) -> impl Iterator<Item = &Change> {
        self.data.changes.iter().filter(|c| c.in_flight())
    }

    /// Updates the status of a change.
    ///
    /// # Errors
    ///
    /// Returns `StateError::NoSuchChange` for an unknown id.
    pub fn set_change_status(&mut self, id: &str, status: Status) -> Result<()> {
        let change = self
            .data
            .changes
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StateError::NoSuchChange(id.to_string()))?;
        change.status = status;
        debug!("Change {} ({}) is now {}", id, change.kind, status);
        self.data.dirty = true;
        Ok(())
    }

    /// Drops finished changes beyond the newest `keep`; returns how many
    /// were removed. In-flight changes are never dropped.
    pub fn prune_ready_changes(&mut self, keep: usize) -> usize {
        let ready = self.data.changes.iter().filter(|c| !c.in_flight()).count();
        let mut excess = ready.saturating_sub(keep);
        if excess == 0 {
            return 0;
        }
        let before = self.data.changes.len();
        // Oldest first, so the front holds the ones to drop.
        self.data.changes.retain(|c| {
            if excess > 0 && !c.in_flight() {
                excess -= 1;
                false
            } else {
                true
            }
        });
        let removed = before - self.data.changes.len();
        if removed > 0 {
            self.data.dirty = true;
        }
        removed
    }

    /// Writes pending modifications to storage now.
    ///
    /// Operations that report an outcome call this before returning so a
    /// storage failure reaches the caller. Memory-only state has nothing to
    /// write and always succeeds.
    pub fn checkpoint(&mut self) -> Result<()> {
        if !self.data.dirty {
            return Ok(());
        }
        if let Some(storage) = self.storage {
            storage.save(&self.data.snapshot())?;
        }
        self.data.dirty = false;
        Ok(())
    }
}

/// Fallback for guards dropped without an explicit checkpoint.
impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.checkpoint() {
            error!("Failed to checkpoint state: {}", e);
        }
    }
}

impl std::fmt::Debug for StateGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateGuard")
            .field("keys", &self.data.data.len())
            .field("changes", &self.data.changes.len())
            .field("dirty", &self.data.dirty)
            .finish()
    }
}
