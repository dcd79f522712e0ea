//! Error types for the interface engine.
//!
//! Three classes of failure surface from this crate:
//!
//! | Class | Variants | Recovery |
//! |-------|----------|----------|
//! | Declaration | `MissingAttribute`, `InvalidAttribute`, `InvalidDeclaration` | Snap author fixes the declaration |
//! | Runtime snippet | `Snippet` | External change (e.g. repair a dangling symlink) |
//! | Repository | `NotConnected`, `AlreadyConnected`, `SlotOccupied`, ... | Caller decides |
//!
//! Handing an unsanitized endpoint to a specification builder is not an
//! error value at all: it panics, see [`crate::specs`].

use std::fmt;

use thiserror::Error;

use crate::model::{ConnRef, PlugRef, SlotRef};

/// Result type for interface operations.
pub type Result<T> = std::result::Result<T, InterfaceError>;

/// Boxed underlying cause of a snippet failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which end of a connection an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointSide {
    Plug,
    Slot,
}

impl fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plug => f.write_str("plug"),
            Self::Slot => f.write_str("slot"),
        }
    }
}

/// Errors that can occur while declaring, sanitizing or connecting endpoints.
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// A required attribute is absent from the declaration.
    #[error("{interface} must contain the {attribute} attribute")]
    MissingAttribute { interface: String, attribute: String },

    /// A present attribute violates the interface policy.
    #[error("{interface} {reason}")]
    InvalidAttribute { interface: String, reason: String },

    /// The declaration itself is malformed.
    #[error("invalid snap declaration: {0}")]
    InvalidDeclaration(String),

    /// Declaration YAML could not be parsed.
    #[error("cannot parse snap declaration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An endpoint was sanitized against the wrong interface.
    #[error("{side} is not of interface {expected:?}")]
    WrongInterface { side: EndpointSide, expected: String },

    /// A hook could not resolve an external fact it depends on.
    #[error("cannot compute {side} security snippet: {source}")]
    Snippet {
        side: EndpointSide,
        #[source]
        source: BoxError,
    },

    /// No interface is registered under this name.
    #[error("unknown interface {0:?}")]
    UnknownInterface(String),

    /// An interface with this name is already registered.
    #[error("cannot register interface {0:?}: name already taken")]
    DuplicateInterface(String),

    /// A snap with this name is already known to the repository.
    #[error("cannot add snap {0:?}: already present")]
    DuplicateSnap(String),

    #[error("unknown plug {0}")]
    UnknownPlug(PlugRef),

    #[error("unknown slot {0}")]
    UnknownSlot(SlotRef),

    /// The plug and slot belong to different interfaces.
    #[error(
        "cannot connect {plug} ({plug_interface:?} interface) \
         to {slot} ({slot_interface:?} interface)"
    )]
    InterfaceMismatch {
        plug: PlugRef,
        plug_interface: String,
        slot: SlotRef,
        slot_interface: String,
    },

    /// One of the endpoints has not been sanitized yet.
    #[error("cannot connect {side} {name}: not sanitized")]
    Unsanitized { side: EndpointSide, name: String },

    #[error("{0} is already connected")]
    AlreadyConnected(ConnRef),

    /// The plug is already connected to a different slot.
    #[error("cannot connect {plug}: already connected to {slot}")]
    PlugInUse { plug: PlugRef, slot: SlotRef },

    /// The interface allows a single plug per slot and one is attached.
    #[error("cannot connect to {slot}: {interface:?} allows one connection and {plug} holds it")]
    SlotOccupied {
        slot: SlotRef,
        interface: String,
        plug: PlugRef,
    },

    #[error("cannot disconnect {0}: not connected")]
    NotConnected(ConnRef),
}

impl InterfaceError {
    /// Wraps a runtime failure of a snippet hook.
    pub fn snippet(side: EndpointSide, source: impl Into<BoxError>) -> Self {
        Self::Snippet {
            side,
            source: source.into(),
        }
    }

    pub(crate) fn missing(interface: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            interface: interface.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn invalid(interface: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            interface: interface.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the snap author can fix this by changing the declaration.
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingAttribute { .. }
                | Self::InvalidAttribute { .. }
                | Self::InvalidDeclaration(_)
                | Self::Yaml(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_snippet_error_message() {
        let err = InterfaceError::snippet(
            EndpointSide::Plug,
            io::Error::new(io::ErrorKind::Other, "broken symbolic link"),
        );
        assert_eq!(
            err.to_string(),
            "cannot compute plug security snippet: broken symbolic link"
        );
        assert!(!err.is_declaration_error());
    }

    #[test]
    fn test_declaration_errors_classified() {
        assert!(InterfaceError::missing("bool-file", "path").is_declaration_error());
        assert_eq!(
            InterfaceError::missing("bool-file", "path").to_string(),
            "bool-file must contain the path attribute"
        );
    }
}
