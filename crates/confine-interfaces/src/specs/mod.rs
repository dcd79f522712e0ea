//! # Specification Builders
//!
//! One accumulator per security backend. Interface hooks append snippets of
//! opaque rule text, keyed by security tag; the caller then hands the result
//! to whatever writes and activates the real profile.
//!
//! ## Build Protocol
//!
//! ```text
//!  add_connected_plug(iface, plug, attrs, slot, attrs)
//!        │
//!        ├─ plug / slot sanitized? ──no──▶ panic (programming error)
//!        │
//!        ├─ staged = empty spec scoped to plug.security_tags()
//!        ├─ iface.<backend>_connected_plug(&mut staged, pair)
//!        │        │
//!        │        └─ Err ──▶ staged dropped, self untouched
//!        │
//!        └─ self.merge(staged)
//! ```
//!
//! Contributions are additive: no hook can remove or overwrite another
//! hook's snippet. Per tag, snippets keep the order in which hooks ran.
//!
//! ## Security Notes
//!
//! - Handing an unsanitized endpoint to a builder panics with
//!   `"plug is not sanitized"` / `"slot is not sanitized"`. Producing a
//!   policy from unvalidated attributes is a confinement escape, so this is
//!   never reported as an ordinary error.
//! - A failing hook never leaves tags behind.

pub mod apparmor;
pub mod dbus;
pub mod seccomp;
pub mod udev;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interface::{ConnectedPair, Interface};
use crate::model::{Attrs, Plug, Slot};

/// The four enforcement mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecuritySystem {
    AppArmor,
    Seccomp,
    DBus,
    Udev,
}

impl SecuritySystem {
    pub const ALL: [SecuritySystem; 4] = [Self::AppArmor, Self::Seccomp, Self::DBus, Self::Udev];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppArmor => "apparmor",
            Self::Seccomp => "seccomp",
            Self::DBus => "dbus",
            Self::Udev => "udev",
        }
    }
}

impl fmt::Display for SecuritySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag-keyed snippet accumulation shared by every backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetSet {
    /// Tags the currently running hook contributes to.
    scope: Vec<String>,
    snippets: BTreeMap<String, Vec<String>>,
}

impl SnippetSet {
    /// Appends a snippet to every tag in scope.
    pub fn add(&mut self, snippet: &str) {
        for tag in &self.scope {
            self.snippets
                .entry(tag.clone())
                .or_default()
                .push(snippet.to_string());
        }
    }

    /// Appends a snippet to one tag, regardless of scope.
    pub fn add_for_tag(&mut self, tag: &str, snippet: impl Into<String>) {
        self.snippets
            .entry(tag.to_string())
            .or_default()
            .push(snippet.into());
    }

    /// Tags the running hook contributes to.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Sorted tags that received at least one snippet.
    pub fn security_tags(&self) -> Vec<String> {
        self.snippets.keys().cloned().collect()
    }

    /// Snippets of one tag joined by newlines; empty if the tag is unknown.
    pub fn snippet_for_tag(&self, tag: &str) -> String {
        self.snippets
            .get(tag)
            .map(|s| s.join("\n"))
            .unwrap_or_default()
    }

    pub fn snippets(&self) -> &BTreeMap<String, Vec<String>> {
        &self.snippets
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    fn scoped(tags: Vec<String>) -> Self {
        Self {
            scope: tags,
            snippets: BTreeMap::new(),
        }
    }

    fn merge(&mut self, other: SnippetSet) {
        for (tag, snippets) in other.snippets {
            self.snippets.entry(tag).or_default().extend(snippets);
        }
    }
}

#[track_caller]
fn require_sanitized_plug(plug: &Plug) {
    if !plug.is_sanitized() {
        panic!("plug is not sanitized");
    }
}

#[track_caller]
fn require_sanitized_slot(slot: &Slot) {
    if !slot.is_sanitized() {
        panic!("slot is not sanitized");
    }
}

/// A per-backend accumulator driven by interface hooks.
///
/// Backends implement the `snippet_set*` accessors and the four `*_hook`
/// dispatchers; the `add_*` builders are provided.
pub trait Specification: Default {
    const SYSTEM: SecuritySystem;

    fn snippet_set(&self) -> &SnippetSet;

    fn snippet_set_mut(&mut self) -> &mut SnippetSet;

    fn permanent_plug_hook(iface: &dyn Interface, spec: &mut Self, plug: &Plug) -> Result<()>;

    fn permanent_slot_hook(iface: &dyn Interface, spec: &mut Self, slot: &Slot) -> Result<()>;

    fn connected_plug_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()>;

    fn connected_slot_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()>;

    /// Records the contribution of a declared plug.
    ///
    /// # Panics
    ///
    /// Panics if the plug is not sanitized.
    fn add_permanent_plug(&mut self, iface: &dyn Interface, plug: &Plug) -> Result<()> {
        require_sanitized_plug(plug);
        self.staged(plug.security_tags(), |spec| {
            Self::permanent_plug_hook(iface, spec, plug)
        })
    }

    /// Records the contribution of a declared slot.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not sanitized.
    fn add_permanent_slot(&mut self, iface: &dyn Interface, slot: &Slot) -> Result<()> {
        require_sanitized_slot(slot);
        self.staged(slot.security_tags(), |spec| {
            Self::permanent_slot_hook(iface, spec, slot)
        })
    }

    /// Records the plug side of a connection, keyed by the plug's tags.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint is not sanitized.
    fn add_connected_plug(
        &mut self,
        iface: &dyn Interface,
        plug: &Plug,
        plug_attrs: &Attrs,
        slot: &Slot,
        slot_attrs: &Attrs,
    ) -> Result<()> {
        require_sanitized_plug(plug);
        require_sanitized_slot(slot);
        let conn = ConnectedPair {
            plug,
            plug_attrs,
            slot,
            slot_attrs,
        };
        self.staged(plug.security_tags(), |spec| {
            Self::connected_plug_hook(iface, spec, &conn)
        })
    }

    /// Records the slot side of a connection, keyed by the slot's tags.
    ///
    /// # Panics
    ///
    /// Panics if either endpoint is not sanitized.
    fn add_connected_slot(
        &mut self,
        iface: &dyn Interface,
        plug: &Plug,
        plug_attrs: &Attrs,
        slot: &Slot,
        slot_attrs: &Attrs,
    ) -> Result<()> {
        require_sanitized_plug(plug);
        require_sanitized_slot(slot);
        let conn = ConnectedPair {
            plug,
            plug_attrs,
            slot,
            slot_attrs,
        };
        self.staged(slot.security_tags(), |spec| {
            Self::connected_slot_hook(iface, spec, &conn)
        })
    }

    /// Runs a hook against an empty scoped spec and merges on success only.
    fn staged<F>(&mut self, tags: Vec<String>, hook: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let mut staged = Self::default();
        *staged.snippet_set_mut() = SnippetSet::scoped(tags);
        hook(&mut staged)?;
        let contributed = std::mem::take(staged.snippet_set_mut());
        self.snippet_set_mut().merge(contributed);
        Ok(())
    }

    /// Sorted tags with at least one snippet.
    fn security_tags(&self) -> Vec<String> {
        self.snippet_set().security_tags()
    }

    fn snippet_for_tag(&self, tag: &str) -> String {
        self.snippet_set().snippet_for_tag(tag)
    }

    fn snippets(&self) -> &BTreeMap<String, Vec<String>> {
        self.snippet_set().snippets()
    }
}

/// Rendered output of a full build pass for one snap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityProfiles {
    pub snap: String,
    /// Backend → security tag → snippet text.
    pub systems: BTreeMap<SecuritySystem, BTreeMap<String, String>>,
}

impl SecurityProfiles {
    pub fn new(snap: impl Into<String>) -> Self {
        Self {
            snap: snap.into(),
            systems: BTreeMap::new(),
        }
    }

    /// Records a finished specification; backends with no snippets are omitted.
    pub fn insert<S: Specification>(&mut self, spec: &S) {
        let rendered: BTreeMap<String, String> = spec
            .security_tags()
            .into_iter()
            .map(|tag| {
                let text = spec.snippet_for_tag(&tag);
                (tag, text)
            })
            .collect();
        if !rendered.is_empty() {
            self.systems.insert(S::SYSTEM, rendered);
        }
    }

    pub fn snippet(&self, system: SecuritySystem, tag: &str) -> Option<&str> {
        self.systems.get(&system)?.get(tag).map(String::as_str)
    }

    pub fn security_tags(&self, system: SecuritySystem) -> Vec<String> {
        self.systems
            .get(&system)
            .map(|tags| tags.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
