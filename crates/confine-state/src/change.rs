//! Changes: named, multi-step state transitions tracked by the state store.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Admitted, not started yet.
    #[default]
    Do,
    /// Running.
    Doing,
    Done,
    Undone,
    Error,
    /// Parked; will not make progress on its own.
    Hold,
}

impl Status {
    /// True once the change can no longer make progress.
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Do | Self::Doing)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Do => "Do",
            Self::Doing => "Doing",
            Self::Done => "Done",
            Self::Undone => "Undone",
            Self::Error => "Error",
            Self::Hold => "Hold",
        };
        f.write_str(s)
    }
}

/// A tracked state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: String,
    /// Kind, e.g. `"connect"`, `"remodel"`, `"install-snap"`.
    pub kind: String,
    pub summary: String,
    pub status: Status,
    /// Snaps the change touches.
    #[serde(default)]
    pub snaps: BTreeSet<String>,
}

impl Change {
    /// True while the change is still in flight.
    pub fn in_flight(&self) -> bool {
        !self.status.is_ready()
    }

    pub fn affects(&self, snap: &str) -> bool {
        self.snaps.contains(snap)
    }
}
