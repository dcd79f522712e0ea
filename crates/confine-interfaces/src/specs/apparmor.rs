//! AppArmor profile snippets.
//!
//! Snippets are profile rule lines such as `/dev/ttyS0 rwk,` and are
//! spliced into the profile of each security tag by the external writer.

use super::{SecuritySystem, SnippetSet, Specification as SpecificationTrait};
use crate::error::Result;
use crate::interface::{ConnectedPair, Interface};
use crate::model::{Plug, Slot};

/// Accumulated AppArmor rules for one build pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Specification {
    snippets: SnippetSet,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule to every tag the running hook is scoped to.
    pub fn add_snippet(&mut self, snippet: &str) {
        self.snippets.add(snippet);
    }
}

impl SpecificationTrait for Specification {
    const SYSTEM: SecuritySystem = SecuritySystem::AppArmor;

    fn snippet_set(&self) -> &SnippetSet {
        &self.snippets
    }

    fn snippet_set_mut(&mut self) -> &mut SnippetSet {
        &mut self.snippets
    }

    fn permanent_plug_hook(iface: &dyn Interface, spec: &mut Self, plug: &Plug) -> Result<()> {
        iface.apparmor_permanent_plug(spec, plug)
    }

    fn permanent_slot_hook(iface: &dyn Interface, spec: &mut Self, slot: &Slot) -> Result<()> {
        iface.apparmor_permanent_slot(spec, slot)
    }

    fn connected_plug_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        iface.apparmor_connected_plug(spec, conn)
    }

    fn connected_slot_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        iface.apparmor_connected_slot(spec, conn)
    }
}
