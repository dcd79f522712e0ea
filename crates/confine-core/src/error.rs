//! Error types for Confine Core.

use confine_interfaces::InterfaceError;
use confine_state::{ChangeConflictError, StateError};
use thiserror::Error;

/// Core error type for gated operations.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Declaration, snippet or repository failure.
    #[error(transparent)]
    Interface(#[from] InterfaceError),

    /// State store failure or change conflict.
    #[error(transparent)]
    State(#[from] StateError),

    /// The snap is not known to the manager.
    #[error("snap {0:?} is not installed")]
    UnknownSnap(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GuardError {
    /// The change conflict behind this error, if it is one.
    pub fn as_conflict(&self) -> Option<&ChangeConflictError> {
        match self {
            Self::State(e) => e.as_conflict(),
            _ => None,
        }
    }
}

impl From<ChangeConflictError> for GuardError {
    fn from(e: ChangeConflictError) -> Self {
        Self::State(StateError::Conflict(e))
    }
}
