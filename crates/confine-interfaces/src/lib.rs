//! # Confine Interfaces - Capability Model and Security Specifications
//!
//! Translates declared capabilities of sandboxed snaps into rules for four
//! independent enforcement mechanisms.
//!
//! ## Purpose
//!
//! A *plug* is a capability a snap consumes; a *slot* is a capability a
//! snap (or the base system) provides. Connecting a plug to a slot must turn,
//! deterministically, into backend rules scoped to the exact security tag
//! that needs them.
//!
//! ## Components
//!
//! | Component | Module | Purpose |
//! |-----------|--------|---------|
//! | Capability Registry | [`registry`] | Name → interface table, read-only after startup |
//! | Endpoint Model | [`model`] | Plugs, slots, references |
//! | Sanitizer | [`sanitize`] | One-time validation of declared attributes |
//! | Repository | [`repo`] | Endpoints and connections, full build passes |
//! | Specification Builders | [`specs`] | Per-backend tag → snippet accumulation |
//! | Built-in interfaces | [`builtin`] | `bool-file`, `dbus`, `network`, `serial-port` |
//! | Declarations | [`manifest`] | YAML plug/slot declarations |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                                                                 │
//! │  snap.yaml ──▶ SnapInfo ──▶ Repository::add_snap ──▶ sanitize   │
//! │                                   │                             │
//! │                                   ▼                             │
//! │                        Repository::connect                      │
//! │                                   │                             │
//! │                                   ▼                             │
//! │   ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐       │
//! │   │ AppArmor │  │ seccomp  │  │  D-Bus   │  │   udev   │       │
//! │   │   spec   │  │   spec   │  │   spec   │  │   spec   │       │
//! │   └──────────┘  └──────────┘  └──────────┘  └──────────┘       │
//! │         tag → snippet text, handed to the profile writer        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use confine_interfaces::{
//!     ConnRef, ConnectionAttrs, InterfaceRegistry, PlugRef, Repository, SlotRef, SnapInfo,
//! };
//!
//! let registry = Arc::new(InterfaceRegistry::with_builtins().unwrap());
//! let mut repo = Repository::new(registry);
//!
//! repo.add_snap(&SnapInfo::from_yaml("name: core\ntype: os\nslots:\n  network:\n").unwrap())
//!     .unwrap();
//! repo.add_snap(
//!     &SnapInfo::from_yaml("name: web\nplugs:\n  network:\napps:\n  server:\n    command: srv\n")
//!         .unwrap(),
//! )
//! .unwrap();
//!
//! let conn = ConnRef::new(PlugRef::new("web", "network"), SlotRef::new("core", "network"));
//! repo.connect(conn, ConnectionAttrs::default()).unwrap();
//!
//! let profiles = repo.security_profiles("web").unwrap();
//! assert!(!profiles.is_empty());
//! ```
//!
//! ## Security Notes
//!
//! - Endpoints are sanitized once, lexically, before they can be connected.
//! - Symbolic links are resolved at snippet time, never at sanitize time.
//! - Specification builders panic on unsanitized endpoints.
//! - A failing hook leaves no partial snippets behind.

pub mod builtin;
pub mod error;
pub mod interface;
pub mod manifest;
pub mod model;
pub mod registry;
pub mod repo;
pub mod sanitize;
pub mod specs;

pub use error::{EndpointSide, InterfaceError, Result};
pub use interface::{ConnectedPair, Interface, StaticInfo};
pub use manifest::{AppInfo, SnapInfo, SnapType};
pub use model::{security_tag, Attrs, ConnRef, Plug, PlugRef, Slot, SlotRef};
pub use registry::InterfaceRegistry;
pub use repo::{ConnectionAttrs, Repository};
pub use specs::{SecurityProfiles, SecuritySystem, Specification};

#[cfg(test)]
mod tests;
