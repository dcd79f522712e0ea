//! # Repository
//!
//! Holds the declared endpoints of every known snap and the connections
//! between them, and drives full specification builds.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌────────────────────┐
//!                 │     Repository     │
//!                 └─────────┬──────────┘
//!                           │
//!        ┌──────────────────┼──────────────────┐
//!        ▼                  ▼                  ▼
//!  ┌───────────┐     ┌─────────────┐    ┌──────────────┐
//!  │ Registry  │     │  Endpoints  │    │ Connections  │
//!  │ (Arc, RO) │     │ plugs/slots │    │ plug → slot  │
//!  └───────────┘     └─────────────┘    └──────────────┘
//! ```
//!
//! ## Invariants
//!
//! - A connection only exists between a sanitized plug and a sanitized
//!   slot of the same interface.
//! - A plug is connected to at most one slot.
//! - A slot of an interface that forbids multiple plugs holds at most one.
//!
//! Every collection is ordered, so build passes visit endpoints and
//! connections in the same order for the same input.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{EndpointSide, InterfaceError, Result};
use crate::manifest::SnapInfo;
use crate::model::{Attrs, ConnRef, Plug, PlugRef, Slot, SlotRef};
use crate::registry::InterfaceRegistry;
use crate::specs::{apparmor, dbus, seccomp, udev, SecurityProfiles, Specification};

/// Dynamic attributes of an established connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionAttrs {
    pub plug: Attrs,
    pub slot: Attrs,
}

/// Endpoint and connection store.
#[derive(Debug, Clone)]
pub struct Repository {
    registry: Arc<InterfaceRegistry>,
    snaps: BTreeSet<String>,
    plugs: BTreeMap<PlugRef, Plug>,
    slots: BTreeMap<SlotRef, Slot>,
    connections: BTreeMap<ConnRef, ConnectionAttrs>,
}

impl Repository {
    pub fn new(registry: Arc<InterfaceRegistry>) -> Self {
        Self {
            registry,
            snaps: BTreeSet::new(),
            plugs: BTreeMap::new(),
            slots: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Adds every endpoint of a snap, sanitizing each one.
    ///
    /// Either all endpoints are added or none are.
    ///
    /// # Errors
    ///
    /// - `DuplicateSnap` if the snap is already known
    /// - `UnknownInterface` if an endpoint names an unregistered interface
    /// - any declaration error raised by a sanitizer
    pub fn add_snap(&mut self, info: &SnapInfo) -> Result<()> {
        if self.snaps.contains(&info.name) {
            return Err(InterfaceError::DuplicateSnap(info.name.clone()));
        }

        let mut plugs = Vec::with_capacity(info.plugs.len());
        for plug in info.plugs.values() {
            let iface = Arc::clone(self.registry.lookup(&plug.interface)?);
            let mut plug = plug.clone();
            plug.sanitize(iface.as_ref())?;
            plugs.push(plug);
        }
        let mut slots = Vec::with_capacity(info.slots.len());
        for slot in info.slots.values() {
            let iface = Arc::clone(self.registry.lookup(&slot.interface)?);
            let mut slot = slot.clone();
            slot.sanitize(iface.as_ref())?;
            slots.push(slot);
        }

        self.snaps.insert(info.name.clone());
        for plug in plugs {
            self.plugs.insert(plug.reference(), plug);
        }
        for slot in slots {
            self.slots.insert(slot.reference(), slot);
        }
        info!(
            "Added snap {} ({} plugs, {} slots)",
            info.name,
            info.plugs.len(),
            info.slots.len()
        );
        Ok(())
    }

    /// Adds a single plug without sanitizing it.
    pub fn add_plug(&mut self, plug: Plug) -> Result<()> {
        self.registry.lookup(&plug.interface)?;
        let key = plug.reference();
        if self.plugs.contains_key(&key) {
            return Err(InterfaceError::InvalidDeclaration(format!(
                "plug {key} already present"
            )));
        }
        self.snaps.insert(plug.snap.clone());
        self.plugs.insert(key, plug);
        Ok(())
    }

    /// Adds a single slot without sanitizing it.
    pub fn add_slot(&mut self, slot: Slot) -> Result<()> {
        self.registry.lookup(&slot.interface)?;
        let key = slot.reference();
        if self.slots.contains_key(&key) {
            return Err(InterfaceError::InvalidDeclaration(format!(
                "slot {key} already present"
            )));
        }
        self.snaps.insert(slot.snap.clone());
        self.slots.insert(key, slot);
        Ok(())
    }

    /// Sanitizes a stored plug unless already done.
    pub fn sanitize_plug(&mut self, plug_ref: &PlugRef) -> Result<()> {
        let plug = self
            .plugs
            .get_mut(plug_ref)
            .ok_or_else(|| InterfaceError::UnknownPlug(plug_ref.clone()))?;
        let iface = Arc::clone(self.registry.lookup(&plug.interface)?);
        plug.sanitize(iface.as_ref())
    }

    /// Sanitizes a stored slot unless already done.
    pub fn sanitize_slot(&mut self, slot_ref: &SlotRef) -> Result<()> {
        let slot = self
            .slots
            .get_mut(slot_ref)
            .ok_or_else(|| InterfaceError::UnknownSlot(slot_ref.clone()))?;
        let iface = Arc::clone(self.registry.lookup(&slot.interface)?);
        slot.sanitize(iface.as_ref())
    }

    /// Removes a snap's endpoints and every connection touching them.
    ///
    /// Returns the connections that were dropped.
    pub fn remove_snap(&mut self, snap: &str) -> Vec<ConnRef> {
        let dropped: Vec<ConnRef> = self
            .connections
            .keys()
            .filter(|conn| conn.plug.snap == snap || conn.slot.snap == snap)
            .cloned()
            .collect();
        for conn in &dropped {
            self.connections.remove(conn);
        }
        self.plugs.retain(|key, _| key.snap != snap);
        self.slots.retain(|key, _| key.snap != snap);
        self.snaps.remove(snap);
        if !dropped.is_empty() {
            debug!("Removing {} dropped {} connections", snap, dropped.len());
        }
        dropped
    }

    pub fn has_snap(&self, snap: &str) -> bool {
        self.snaps.contains(snap)
    }

    /// Names of every known snap, sorted.
    pub fn snaps(&self) -> Vec<&str> {
        self.snaps.iter().map(String::as_str).collect()
    }

    pub fn plug(&self, plug_ref: &PlugRef) -> Option<&Plug> {
        self.plugs.get(plug_ref)
    }

    pub fn slot(&self, slot_ref: &SlotRef) -> Option<&Slot> {
        self.slots.get(slot_ref)
    }

    /// Plugs declared by one snap, in name order.
    pub fn plugs_of<'a>(&'a self, snap: &'a str) -> impl Iterator<Item = &'a Plug> + 'a {
        self.plugs.values().filter(move |plug| plug.snap == snap)
    }

    /// Slots declared by one snap, in name order.
    pub fn slots_of<'a>(&'a self, snap: &'a str) -> impl Iterator<Item = &'a Slot> + 'a {
        self.slots.values().filter(move |slot| slot.snap == snap)
    }

    /// Connects a plug to a slot.
    ///
    /// # Errors
    ///
    /// - `UnknownPlug` / `UnknownSlot`
    /// - `InterfaceMismatch` if interface names differ
    /// - `Unsanitized` if either end has not been sanitized
    /// - `AlreadyConnected`, `PlugInUse`, `SlotOccupied`
    pub fn connect(&mut self, conn: ConnRef, attrs: ConnectionAttrs) -> Result<()> {
        let plug = self
            .plugs
            .get(&conn.plug)
            .ok_or_else(|| InterfaceError::UnknownPlug(conn.plug.clone()))?;
        let slot = self
            .slots
            .get(&conn.slot)
            .ok_or_else(|| InterfaceError::UnknownSlot(conn.slot.clone()))?;

        if plug.interface != slot.interface {
            return Err(InterfaceError::InterfaceMismatch {
                plug: conn.plug.clone(),
                plug_interface: plug.interface.clone(),
                slot: conn.slot.clone(),
                slot_interface: slot.interface.clone(),
            });
        }
        if !plug.is_sanitized() {
            return Err(InterfaceError::Unsanitized {
                side: EndpointSide::Plug,
                name: conn.plug.to_string(),
            });
        }
        if !slot.is_sanitized() {
            return Err(InterfaceError::Unsanitized {
                side: EndpointSide::Slot,
                name: conn.slot.to_string(),
            });
        }
        if self.connections.contains_key(&conn) {
            return Err(InterfaceError::AlreadyConnected(conn));
        }
        if let Some(existing) = self.connections_for_plug(&conn.plug).into_iter().next() {
            return Err(InterfaceError::PlugInUse {
                plug: conn.plug.clone(),
                slot: existing.slot,
            });
        }
        let iface = self.registry.lookup(&slot.interface)?;
        if !iface.allows_multiple_plugs() {
            if let Some(existing) = self.connections_for_slot(&conn.slot).into_iter().next() {
                return Err(InterfaceError::SlotOccupied {
                    slot: conn.slot.clone(),
                    interface: slot.interface.clone(),
                    plug: existing.plug,
                });
            }
        }

        info!("Connected {}", conn);
        self.connections.insert(conn, attrs);
        Ok(())
    }

    /// Removes a connection.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if there is no such connection; nothing changes.
    pub fn disconnect(&mut self, conn: &ConnRef) -> Result<ConnectionAttrs> {
        let attrs = self
            .connections
            .remove(conn)
            .ok_or_else(|| InterfaceError::NotConnected(conn.clone()))?;
        info!("Disconnected {}", conn);
        Ok(attrs)
    }

    pub fn is_connected(&self, conn: &ConnRef) -> bool {
        self.connections.contains_key(conn)
    }

    pub fn connection_attrs(&self, conn: &ConnRef) -> Option<&ConnectionAttrs> {
        self.connections.get(conn)
    }

    /// Every connection, in order.
    pub fn connections(&self) -> Vec<ConnRef> {
        self.connections.keys().cloned().collect()
    }

    pub fn connections_for_plug(&self, plug: &PlugRef) -> Vec<ConnRef> {
        self.connections
            .keys()
            .filter(|conn| &conn.plug == plug)
            .cloned()
            .collect()
    }

    pub fn connections_for_slot(&self, slot: &SlotRef) -> Vec<ConnRef> {
        self.connections
            .keys()
            .filter(|conn| &conn.slot == slot)
            .cloned()
            .collect()
    }

    /// Resolves both ends of a connection.
    fn endpoints(&self, conn: &ConnRef) -> Result<(&Plug, &Slot)> {
        let plug = self
            .plugs
            .get(&conn.plug)
            .ok_or_else(|| InterfaceError::UnknownPlug(conn.plug.clone()))?;
        let slot = self
            .slots
            .get(&conn.slot)
            .ok_or_else(|| InterfaceError::UnknownSlot(conn.slot.clone()))?;
        Ok((plug, slot))
    }

    /// Runs a full build pass of one backend for one snap.
    ///
    /// Order: permanent plugs, connected plugs, permanent slots, connected
    /// slots. The first hook failure aborts the pass and no specification
    /// is returned.
    ///
    /// # Panics
    ///
    /// Panics if an endpoint of the snap was added with
    /// [`add_plug`](Self::add_plug) / [`add_slot`](Self::add_slot) and never
    /// sanitized.
    pub fn snap_specification<S: Specification>(&self, snap: &str) -> Result<S> {
        let mut spec = S::default();

        for plug in self.plugs_of(snap) {
            let iface = self.registry.lookup(&plug.interface)?;
            spec.add_permanent_plug(iface.as_ref(), plug)?;
        }
        for (conn, attrs) in self.connections.iter().filter(|(c, _)| c.plug.snap == snap) {
            let (plug, slot) = self.endpoints(conn)?;
            let iface = self.registry.lookup(&plug.interface)?;
            spec.add_connected_plug(iface.as_ref(), plug, &attrs.plug, slot, &attrs.slot)?;
        }
        for slot in self.slots_of(snap) {
            let iface = self.registry.lookup(&slot.interface)?;
            spec.add_permanent_slot(iface.as_ref(), slot)?;
        }
        for (conn, attrs) in self.connections.iter().filter(|(c, _)| c.slot.snap == snap) {
            let (plug, slot) = self.endpoints(conn)?;
            let iface = self.registry.lookup(&slot.interface)?;
            spec.add_connected_slot(iface.as_ref(), plug, &attrs.plug, slot, &attrs.slot)?;
        }

        debug!(
            "Built {} specification for {} ({} tags)",
            S::SYSTEM,
            snap,
            spec.security_tags().len()
        );
        Ok(spec)
    }

    /// Runs the build pass of every backend for one snap.
    pub fn security_profiles(&self, snap: &str) -> Result<SecurityProfiles> {
        let mut profiles = SecurityProfiles::new(snap);
        profiles.insert(&self.snap_specification::<apparmor::Specification>(snap)?);
        profiles.insert(&self.snap_specification::<seccomp::Specification>(snap)?);
        profiles.insert(&self.snap_specification::<dbus::Specification>(snap)?);
        profiles.insert(&self.snap_specification::<udev::Specification>(snap)?);
        Ok(profiles)
    }
}
