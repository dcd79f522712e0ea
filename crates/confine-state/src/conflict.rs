//! # Change-Conflict Detector
//!
//! Decides whether a new change may start given the changes already in
//! flight.
//!
//! ## Rules
//!
//! 1. An in-flight change of an exclusive kind (by default `remodel`)
//!    blocks every other change.
//! 2. A request of an exclusive kind is blocked by any in-flight change.
//! 3. An in-flight change touching one of the requested snaps blocks the
//!    request, unless the two kinds are declared compatible.
//!
//! The change named by `ignore` (typically the caller's own change) is
//! skipped. Finished changes never conflict.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::change::Change;
use crate::error::ChangeConflictError;
use crate::state::StateGuard;

/// Which change kinds may overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictPolicy {
    /// Kinds that run alone on the device.
    pub exclusive_kinds: Vec<String>,

    /// Unordered pairs of kinds that may touch the same snap concurrently.
    pub compatible_kinds: Vec<(String, String)>,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            exclusive_kinds: vec!["remodel".to_string()],
            compatible_kinds: Vec::new(),
        }
    }
}

impl ConflictPolicy {
    #[must_use]
    pub fn with_exclusive_kind(mut self, kind: impl Into<String>) -> Self {
        self.exclusive_kinds.push(kind.into());
        self
    }

    #[must_use]
    pub fn with_compatible_kinds(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.compatible_kinds.push((a.into(), b.into()));
        self
    }

    pub fn is_exclusive(&self, kind: &str) -> bool {
        self.exclusive_kinds.iter().any(|k| k == kind)
    }

    pub fn are_compatible(&self, a: &str, b: &str) -> bool {
        self.compatible_kinds
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

fn exclusive_message(kind: &str) -> String {
    if kind == "remodel" {
        "remodeling in progress, no other changes allowed until this is done".to_string()
    } else {
        format!("{kind} in progress, no other changes allowed until this is done")
    }
}

/// Applies a [`ConflictPolicy`] to the changes recorded in state.
#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    policy: ConflictPolicy,
}

impl ConflictDetector {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    /// Checks whether a change of `kind` touching `snaps` may start.
    ///
    /// # Errors
    ///
    /// Returns the first conflict found, naming the in-flight change.
    pub fn check(
        &self,
        st: &StateGuard<'_>,
        kind: &str,
        snaps: &[&str],
        ignore: Option<&str>,
    ) -> Result<(), ChangeConflictError> {
        let requested: BTreeSet<&str> = snaps.iter().copied().collect();
        let in_flight: Vec<&Change> = st
            .in_flight_changes()
            .filter(|c| Some(c.id.as_str()) != ignore)
            .collect();

        for change in &in_flight {
            if self.policy.is_exclusive(&change.kind) {
                debug!("{} blocked by exclusive change {}", kind, change.id);
                return Err(
                    ChangeConflictError::new(exclusive_message(&change.kind), change.kind.clone())
                        .with_change_id(change.id.clone()),
                );
            }
        }

        if self.policy.is_exclusive(kind) {
            if let Some(change) = in_flight.first() {
                debug!("exclusive {} blocked by change {}", kind, change.id);
                return Err(ChangeConflictError::new(
                    format!("other changes in progress, {kind} must wait until they are done"),
                    change.kind.clone(),
                )
                .with_change_id(change.id.clone()));
            }
        }

        for change in &in_flight {
            if self.policy.are_compatible(kind, &change.kind) {
                continue;
            }
            if let Some(snap) = change.snaps.iter().find(|s| requested.contains(s.as_str())) {
                debug!("{} on {} blocked by change {}", kind, snap, change.id);
                return Err(ChangeConflictError::new(
                    format!("snap {snap:?} has {:?} change in progress", change.kind),
                    change.kind.clone(),
                )
                .with_change_id(change.id.clone()));
            }
        }

        Ok(())
    }
}
