//! # Endpoint Model
//!
//! Value types for the capability model: plugs, slots, and the references
//! used to name them and the connections between them.
//!
//! A [`Plug`] or [`Slot`] is owned by the snap that declares it. Its
//! attributes are author supplied and untrusted until the owning interface
//! has sanitized them. The sanitized flag is private: the only way to set
//! it is [`Plug::sanitize`] / [`Slot::sanitize`].
//!
//! ## Security Tags
//!
//! Rules are scoped to security tags, one per app bound to an endpoint:
//!
//! ```text
//! snap.<snap-name>.<app-name>
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InterfaceError;

/// Attribute map of an endpoint or of one side of a connection.
pub type Attrs = BTreeMap<String, serde_json::Value>;

/// Returns the security tag of an app.
pub fn security_tag(snap: &str, app: &str) -> String {
    format!("snap.{snap}.{app}")
}

/// Names a plug: `<snap>:<plug>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlugRef {
    pub snap: String,
    pub name: String,
}

/// Names a slot: `<snap>:<slot>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub snap: String,
    pub name: String,
}

impl PlugRef {
    pub fn new(snap: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            snap: snap.into(),
            name: name.into(),
        }
    }
}

impl SlotRef {
    pub fn new(snap: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            snap: snap.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PlugRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.snap, self.name)
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.snap, self.name)
    }
}

fn split_ref(s: &str) -> Result<(&str, &str), InterfaceError> {
    match s.split_once(':') {
        Some((snap, name)) if !snap.is_empty() && !name.is_empty() && !name.contains(':') => {
            Ok((snap, name))
        }
        _ => Err(InterfaceError::InvalidDeclaration(format!(
            "malformed endpoint reference {s:?}, expected <snap>:<name>"
        ))),
    }
}

impl FromStr for PlugRef {
    type Err = InterfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (snap, name) = split_ref(s)?;
        Ok(Self::new(snap, name))
    }
}

impl FromStr for SlotRef {
    type Err = InterfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (snap, name) = split_ref(s)?;
        Ok(Self::new(snap, name))
    }
}

/// Names a connection: `<plug-snap>:<plug> <slot-snap>:<slot>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnRef {
    pub plug: PlugRef,
    pub slot: SlotRef,
}

impl ConnRef {
    pub fn new(plug: PlugRef, slot: SlotRef) -> Self {
        Self { plug, slot }
    }

    /// Stable textual id, used as the persistence key.
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.plug, self.slot)
    }
}

impl FromStr for ConnRef {
    type Err = InterfaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (plug, slot) = s.split_once(' ').ok_or_else(|| {
            InterfaceError::InvalidDeclaration(format!("malformed connection id {s:?}"))
        })?;
        Ok(Self::new(plug.parse()?, slot.parse()?))
    }
}

/// A capability a snap consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Plug {
    pub snap: String,
    pub name: String,
    pub interface: String,
    pub attrs: Attrs,
    /// Apps of the owning snap the plug is bound to.
    pub apps: BTreeSet<String>,
    sanitized: bool,
}

/// A capability a snap (or the base system) provides.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub snap: String,
    pub name: String,
    pub interface: String,
    pub attrs: Attrs,
    /// Apps of the owning snap the slot is bound to.
    pub apps: BTreeSet<String>,
    sanitized: bool,
}

impl Plug {
    pub fn new(
        snap: impl Into<String>,
        name: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            snap: snap.into(),
            name: name.into(),
            interface: interface.into(),
            attrs: Attrs::new(),
            apps: BTreeSet::new(),
            sanitized: false,
        }
    }

    #[must_use]
    pub fn with_attr(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.apps.insert(app.into());
        self
    }

    pub fn reference(&self) -> PlugRef {
        PlugRef::new(&self.snap, &self.name)
    }

    /// String attribute lookup.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    /// Sorted security tags of every app bound to this plug.
    pub fn security_tags(&self) -> Vec<String> {
        self.apps.iter().map(|app| security_tag(&self.snap, app)).collect()
    }

    pub fn is_sanitized(&self) -> bool {
        self.sanitized
    }

    pub(crate) fn mark_sanitized(&mut self) {
        self.sanitized = true;
    }
}

impl Slot {
    pub fn new(
        snap: impl Into<String>,
        name: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            snap: snap.into(),
            name: name.into(),
            interface: interface.into(),
            attrs: Attrs::new(),
            apps: BTreeSet::new(),
            sanitized: false,
        }
    }

    #[must_use]
    pub fn with_attr(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.apps.insert(app.into());
        self
    }

    pub fn reference(&self) -> SlotRef {
        SlotRef::new(&self.snap, &self.name)
    }

    /// String attribute lookup.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    /// Sorted security tags of every app bound to this slot.
    pub fn security_tags(&self) -> Vec<String> {
        self.apps.iter().map(|app| security_tag(&self.snap, app)).collect()
    }

    pub fn is_sanitized(&self) -> bool {
        self.sanitized
    }

    pub(crate) fn mark_sanitized(&mut self) {
        self.sanitized = true;
    }
}
