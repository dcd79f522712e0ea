//! # The Interface Contract
//!
//! Every capability is an implementation of [`Interface`]. The trait carries
//! the full hook set for every security backend; each hook has a no-op
//! default, so a concrete interface only overrides the hooks of the backends
//! it actually affects.
//!
//! ## Hook Matrix
//!
//! | Hook | Called | Keyed by |
//! |------|--------|----------|
//! | `sanitize_plug` / `sanitize_slot` | once, before first use | n/a |
//! | `*_permanent_plug` / `*_permanent_slot` | per declared endpoint | endpoint's tags |
//! | `*_connected_plug` | per connection | plug's tags |
//! | `*_connected_slot` | per connection | slot's tags |
//!
//! Hooks are never called directly by the rest of the system. They are
//! driven through [`crate::specs::Specification`], which enforces the
//! sanitization precondition and stages contributions so a failing hook
//! leaves nothing behind.

use std::fmt;

use crate::error::Result;
use crate::model::{Attrs, Plug, Slot};
use crate::specs::{apparmor, dbus, seccomp, udev};

/// Descriptive, non-behavioral facts about an interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticInfo {
    /// One-line human readable summary.
    pub summary: &'static str,
    /// The base system provides a slot implicitly.
    pub implicit_on_core: bool,
}

/// Both ends of an established connection, as handed to connected hooks.
#[derive(Debug, Clone, Copy)]
pub struct ConnectedPair<'a> {
    pub plug: &'a Plug,
    /// Dynamic attributes of the plug side of this connection.
    pub plug_attrs: &'a Attrs,
    pub slot: &'a Slot,
    /// Dynamic attributes of the slot side of this connection.
    pub slot_attrs: &'a Attrs,
}

/// A named capability definition.
///
/// Implementations must be immutable after construction: the registry is
/// shared between threads and read without synchronization.
pub trait Interface: Send + Sync + fmt::Debug {
    /// Unique interface name.
    fn name(&self) -> &str;

    fn static_info(&self) -> StaticInfo {
        StaticInfo::default()
    }

    /// Whether a slot may serve several plugs at once.
    fn allows_multiple_plugs(&self) -> bool {
        true
    }

    /// Validates (and may normalize) a plug declaration.
    fn sanitize_plug(&self, _plug: &mut Plug) -> Result<()> {
        Ok(())
    }

    /// Validates (and may normalize) a slot declaration.
    fn sanitize_slot(&self, _slot: &mut Slot) -> Result<()> {
        Ok(())
    }

    // AppArmor

    fn apparmor_permanent_plug(
        &self,
        _spec: &mut apparmor::Specification,
        _plug: &Plug,
    ) -> Result<()> {
        Ok(())
    }

    fn apparmor_permanent_slot(
        &self,
        _spec: &mut apparmor::Specification,
        _slot: &Slot,
    ) -> Result<()> {
        Ok(())
    }

    fn apparmor_connected_plug(
        &self,
        _spec: &mut apparmor::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn apparmor_connected_slot(
        &self,
        _spec: &mut apparmor::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }

    // seccomp

    fn seccomp_permanent_plug(
        &self,
        _spec: &mut seccomp::Specification,
        _plug: &Plug,
    ) -> Result<()> {
        Ok(())
    }

    fn seccomp_permanent_slot(
        &self,
        _spec: &mut seccomp::Specification,
        _slot: &Slot,
    ) -> Result<()> {
        Ok(())
    }

    fn seccomp_connected_plug(
        &self,
        _spec: &mut seccomp::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn seccomp_connected_slot(
        &self,
        _spec: &mut seccomp::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }

    // D-Bus

    fn dbus_permanent_plug(&self, _spec: &mut dbus::Specification, _plug: &Plug) -> Result<()> {
        Ok(())
    }

    fn dbus_permanent_slot(&self, _spec: &mut dbus::Specification, _slot: &Slot) -> Result<()> {
        Ok(())
    }

    fn dbus_connected_plug(
        &self,
        _spec: &mut dbus::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn dbus_connected_slot(
        &self,
        _spec: &mut dbus::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }

    // udev

    fn udev_permanent_plug(&self, _spec: &mut udev::Specification, _plug: &Plug) -> Result<()> {
        Ok(())
    }

    fn udev_permanent_slot(&self, _spec: &mut udev::Specification, _slot: &Slot) -> Result<()> {
        Ok(())
    }

    fn udev_connected_plug(
        &self,
        _spec: &mut udev::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn udev_connected_slot(
        &self,
        _spec: &mut udev::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        Ok(())
    }
}
