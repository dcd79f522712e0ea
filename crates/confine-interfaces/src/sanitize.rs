//! # Sanitizer
//!
//! Validates endpoint declarations exactly once, before any connection or
//! specification build may see them.
//!
//! ## Path Policy
//!
//! Interfaces that expose a filesystem path validate it lexically:
//!
//! 1. The path must be absolute and non-empty.
//! 2. Any `..` component is rejected outright, before pattern matching.
//! 3. The path is cleaned (`//` and `.` components collapsed).
//! 4. The cleaned path must match one of the interface's fixed patterns.
//!
//! Symbolic links are NOT resolved here. The target may not exist yet, or
//! may change between declaration and connection; resolution happens when
//! snippets are generated, against the live filesystem.

use regex::Regex;
use tracing::debug;

use crate::error::{EndpointSide, InterfaceError, Result};
use crate::interface::Interface;
use crate::model::{Plug, Slot};

impl Plug {
    /// Runs the interface's plug sanitizer and marks the plug sanitized.
    ///
    /// Calling this on an already sanitized plug is a no-op.
    pub fn sanitize(&mut self, iface: &dyn Interface) -> Result<()> {
        if iface.name() != self.interface {
            return Err(InterfaceError::WrongInterface {
                side: EndpointSide::Plug,
                expected: iface.name().to_string(),
            });
        }
        if self.is_sanitized() {
            return Ok(());
        }
        iface.sanitize_plug(self)?;
        self.mark_sanitized();
        debug!("Sanitized plug {}", self.reference());
        Ok(())
    }
}

impl Slot {
    /// Runs the interface's slot sanitizer and marks the slot sanitized.
    ///
    /// Calling this on an already sanitized slot is a no-op.
    pub fn sanitize(&mut self, iface: &dyn Interface) -> Result<()> {
        if iface.name() != self.interface {
            return Err(InterfaceError::WrongInterface {
                side: EndpointSide::Slot,
                expected: iface.name().to_string(),
            });
        }
        if self.is_sanitized() {
            return Ok(());
        }
        iface.sanitize_slot(self)?;
        self.mark_sanitized();
        debug!("Sanitized slot {}", self.reference());
        Ok(())
    }
}

/// Lexically cleans an absolute path.
///
/// Returns `None` for relative paths and for paths with a `..` component.
pub fn clean_path(path: &str) -> Option<String> {
    if !path.starts_with('/') {
        return None;
    }
    let mut parts = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    Some(format!("/{}", parts.join("/")))
}

/// An allow-list of path shapes for one interface.
#[derive(Debug)]
pub struct PathPolicy {
    patterns: Vec<Regex>,
    /// Reported when no pattern matches, e.g. "can only point at ...".
    reason: &'static str,
}

impl PathPolicy {
    /// Builds a policy from anchored regular expressions.
    ///
    /// # Panics
    ///
    /// Panics if a pattern is not a valid regular expression. Patterns are
    /// compile-time constants of the built-in interfaces.
    pub fn new(patterns: &[&str], reason: &'static str) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).expect("built-in path pattern must compile"))
            .collect();
        Self { patterns, reason }
    }

    /// Validates `path` and returns its cleaned form.
    pub fn check(&self, interface: &str, path: &str) -> Result<String> {
        let cleaned =
            clean_path(path).ok_or_else(|| InterfaceError::invalid(interface, self.reason))?;
        if self.patterns.iter().any(|p| p.is_match(&cleaned)) {
            Ok(cleaned)
        } else {
            Err(InterfaceError::invalid(interface, self.reason))
        }
    }
}

/// Fetches a required string attribute. An empty string counts as absent.
pub fn required_str<'a>(
    interface: &str,
    attrs: &'a crate::model::Attrs,
    key: &str,
) -> Result<&'a str> {
    match attrs.get(key) {
        None => Err(InterfaceError::missing(interface, key)),
        Some(value) => match value.as_str() {
            Some("") => Err(InterfaceError::missing(interface, key)),
            Some(s) => Ok(s),
            None => Err(InterfaceError::invalid(
                interface,
                format!("{key} attribute must be a string"),
            )),
        },
    }
}
