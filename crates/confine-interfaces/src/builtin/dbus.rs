//! `dbus`: ownership of, and access to, a well-known D-Bus name.

use regex::Regex;

use crate::error::{EndpointSide, InterfaceError, Result};
use crate::interface::{ConnectedPair, Interface, StaticInfo};
use crate::model::{Attrs, Plug, Slot};
use crate::sanitize::required_str;
use crate::specs::{apparmor, dbus};

const NAME: &str = "dbus";

const MAX_NAME_LEN: usize = 255;

#[derive(Debug)]
pub struct DBusInterface {
    well_known_name: Regex,
}

impl DBusInterface {
    pub fn new() -> Self {
        Self {
            well_known_name: Regex::new(
                r"^[A-Za-z_-][A-Za-z0-9_-]*(\.[A-Za-z_-][A-Za-z0-9_-]*)+$",
            )
            .expect("well-known name pattern must compile"),
        }
    }

    fn check(&self, attrs: &Attrs) -> Result<()> {
        let bus = required_str(NAME, attrs, "bus")?;
        if bus != "session" && bus != "system" {
            return Err(InterfaceError::invalid(
                NAME,
                format!("bus {bus:?} is not supported, use \"session\" or \"system\""),
            ));
        }
        let name = required_str(NAME, attrs, "name")?;
        if name.len() > MAX_NAME_LEN || !self.well_known_name.is_match(name) {
            return Err(InterfaceError::invalid(
                NAME,
                format!("invalid well-known bus name {name:?}"),
            ));
        }
        Ok(())
    }
}

impl Default for DBusInterface {
    fn default() -> Self {
        Self::new()
    }
}

/// Bus and name shared by both ends, or a snippet failure if they differ.
fn matching_endpoint<'a>(
    conn: &ConnectedPair<'a>,
    side: EndpointSide,
) -> Result<(&'a str, &'a str)> {
    let (plug, slot): (&'a Plug, &'a Slot) = (conn.plug, conn.slot);
    let plug_bus = required_str(NAME, &plug.attrs, "bus")?;
    let plug_name = required_str(NAME, &plug.attrs, "name")?;
    let slot_bus = required_str(NAME, &slot.attrs, "bus")?;
    let slot_name = required_str(NAME, &slot.attrs, "name")?;
    if plug_bus != slot_bus || plug_name != slot_name {
        return Err(InterfaceError::snippet(
            side,
            format!(
                "plug uses {plug_name} on the {plug_bus} bus \
                 but slot provides {slot_name} on the {slot_bus} bus"
            ),
        ));
    }
    Ok((slot_bus, slot_name))
}

impl Interface for DBusInterface {
    fn name(&self) -> &str {
        NAME
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo {
            summary: "allows owning a specific name on DBus",
            implicit_on_core: false,
        }
    }

    fn sanitize_plug(&self, plug: &mut Plug) -> Result<()> {
        self.check(&plug.attrs)
    }

    fn sanitize_slot(&self, slot: &mut Slot) -> Result<()> {
        self.check(&slot.attrs)
    }

    fn dbus_permanent_slot(&self, spec: &mut dbus::Specification, slot: &Slot) -> Result<()> {
        let name = required_str(NAME, &slot.attrs, "name")?;
        spec.add_snippet(&format!(
            "<policy user=\"root\">\n  <allow own=\"{name}\"/>\n</policy>"
        ));
        Ok(())
    }

    fn dbus_connected_plug(
        &self,
        spec: &mut dbus::Specification,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        let (_, name) = matching_endpoint(conn, EndpointSide::Plug)?;
        spec.add_snippet(&format!(
            "<policy context=\"default\">\n  <allow send_destination=\"{name}\"/>\n</policy>"
        ));
        Ok(())
    }

    fn apparmor_connected_plug(
        &self,
        spec: &mut apparmor::Specification,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        let (bus, name) = matching_endpoint(conn, EndpointSide::Plug)?;
        spec.add_snippet(&format!(
            "dbus (send, receive) bus={bus} peer=(name={name}, label=\"snap.{}.*\"),",
            conn.slot.snap
        ));
        Ok(())
    }

    fn apparmor_connected_slot(
        &self,
        spec: &mut apparmor::Specification,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        let (bus, name) = matching_endpoint(conn, EndpointSide::Slot)?;
        spec.add_snippet(&format!(
            "dbus (receive, send) bus={bus} path=/** interface=** name={name} \
             peer=(label=\"snap.{}.*\"),",
            conn.plug.snap
        ));
        Ok(())
    }
}
