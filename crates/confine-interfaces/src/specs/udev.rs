//! udev rules that tag device nodes with the security tag of the apps
//! allowed to use them.
//!
//! udev tags cannot contain dots, so `snap.other.app` becomes
//! `snap_other_app`.

use super::{SecuritySystem, SnippetSet, Specification as SpecificationTrait};
use crate::error::Result;
use crate::interface::{ConnectedPair, Interface};
use crate::model::{Plug, Slot};

/// Converts a security tag into a udev tag.
pub fn udev_tag(security_tag: &str) -> String {
    security_tag.replace('.', "_")
}

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

    /// Emits `<matcher>, TAG+="<udev tag>"` for every tag in scope.
    ///
    /// `matcher` is the device selector, e.g. `KERNEL=="ttyS0"`.
    pub fn tag_device(&mut self, matcher: &str) {
        let tags = self.snippets.scope().to_vec();
        for tag in tags {
            let rule = format!("{matcher}, TAG+=\"{}\"", udev_tag(&tag));
            self.snippets.add_for_tag(&tag, rule);
        }
    }
}

impl SpecificationTrait for Specification {
    const SYSTEM: SecuritySystem = SecuritySystem::Udev;

    fn snippet_set(&self) -> &SnippetSet {
        &self.snippets
    }

    fn snippet_set_mut(&mut self) -> &mut SnippetSet {
        &mut self.snippets
    }

    fn permanent_plug_hook(iface: &dyn Interface, spec: &mut Self, plug: &Plug) -> Result<()> {
        iface.udev_permanent_plug(spec, plug)
    }

    fn permanent_slot_hook(iface: &dyn Interface, spec: &mut Self, slot: &Slot) -> Result<()> {
        iface.udev_permanent_slot(spec, slot)
    }

    fn connected_plug_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        iface.udev_connected_plug(spec, conn)
    }

    fn connected_slot_hook(
        iface: &dyn Interface,
        spec: &mut Self,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        iface.udev_connected_slot(spec, conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udev_tag_replaces_dots() {
        assert_eq!(udev_tag("snap.other.app"), "snap_other_app");
    }
}
