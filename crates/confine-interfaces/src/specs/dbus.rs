//! D-Bus bus policy snippets (`<policy>` XML fragments).

use super::{SecuritySystem, SnippetSet, Specification as SpecificationTrait};
use crate::error::Result;
use crate::interface::{ConnectedPair, Interface};
use crate::model::{Plug, Slot};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Specification {
    snippets: SnippetSet,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_snippet(&mut self, snippet: &str) {
        self.snippets.add(snippet);
    }
}

impl SpecificationTrait for Specification {
    const SYSTEM: SecuritySystem = SecuritySystem::DBus;

    fn snippet_set(&self) -> &SnippetSet {
        &self.snippets
    }

    fn snippet_set_mut(&mut self) -> &mut SnippetSet {
        &mut self.snippets
    }

    fn permanent_plug_hook(iface: &dyn Interface, spec: &mut Self, plug: &Plug) -> Result<()> {
        iface.dbus_permanent_plug(spec, plug)
    }

    fn permanent_slot_hook(iface: &dyn Interface, spec: &mut Self, slot: &Slot) -> Result<()> {
        iface.dbus_permanent_slot(spec, slot)
    }

    fn connected_plug_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        iface.dbus_connected_plug(spec, conn)
    }

    fn connected_slot_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        iface.dbus_connected_slot(spec, conn)
    }
}
