//! Error types for the state store and the gating layer.

use thiserror::Error;

/// Result type alias for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// A requested change may not start now.
///
/// `change_kind` names the kind of change the request collided with (or
/// `"seed"` when the device is not ready yet); `change_id` is set when a
/// specific in-flight change is to blame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ChangeConflictError {
    pub message: String,
    pub change_kind: String,
    pub change_id: Option<String>,
}

impl ChangeConflictError {
    pub fn new(message: impl Into<String>, change_kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            change_kind: change_kind.into(),
            change_id: None,
        }
    }

    #[must_use]
    pub fn with_change_id(mut self, id: impl Into<String>) -> Self {
        self.change_id = Some(id.into());
        self
    }
}

/// Errors raised by the state store.
#[derive(Debug, Error)]
pub enum StateError {
    /// The embedded database failed.
    #[error("state database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored value could not be (de)serialized.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No change has this id.
    #[error("no change with id {0:?}")]
    NoSuchChange(String),

    /// The operation is not allowed right now.
    #[error(transparent)]
    Conflict(#[from] ChangeConflictError),
}

impl StateError {
    /// The conflict behind this error, if it is one.
    pub fn as_conflict(&self) -> Option<&ChangeConflictError> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}
