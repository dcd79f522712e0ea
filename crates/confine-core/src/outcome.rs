//! Results of gated connection changes.

use confine_interfaces::{ConnRef, SecurityProfiles};
use serde::Serialize;

/// What a completed connect or disconnect produced.
///
/// `profiles` holds the rebuilt profiles of every snap the change touched,
/// plug side first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeOutcome {
    /// Id of the recorded change.
    pub change_id: String,

    /// `"connect"` or `"disconnect"`.
    pub kind: String,

    pub connection: ConnRef,

    pub profiles: Vec<SecurityProfiles>,
}

impl ChangeOutcome {
    /// Rebuilt profiles of one snap.
    pub fn profiles_for(&self, snap: &str) -> Option<&SecurityProfiles> {
        self.profiles.iter().find(|p| p.snap == snap)
    }
}

/// Catalog entry of a registered interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceSummary {
    pub name: String,
    pub summary: String,
    /// Base-system snaps carry a slot of this interface implicitly.
    pub implicit_on_core: bool,
    /// False when a slot accepts a single plug.
    pub multiple_plugs: bool,
}
