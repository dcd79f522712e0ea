//! `bool-file`: write access to a single boolean sysfs file.

use std::fmt;
use std::path::{Path, PathBuf};

use super::{filesystem_resolver, SymlinkResolver};
use crate::error::{EndpointSide, InterfaceError, Result};
use crate::interface::{ConnectedPair, Interface, StaticInfo};
use crate::model::Slot;
use crate::sanitize::{required_str, PathPolicy};
use crate::specs::apparmor;

const NAME: &str = "bool-file";

/// Brightness of a standard LED class device.
const LED_BRIGHTNESS_PATTERN: &str = r"^/sys/class/leds/[^/]+/brightness$";

/// Value of an exported GPIO.
const GPIO_VALUE_PATTERN: &str = r"^/sys/class/gpio/gpio[0-9]+/value$";

/// Grants read/write/lock on one LED brightness or GPIO value file.
///
/// The slot declares the file in its `path` attribute. When a plug is
/// connected, the path is dereferenced through the symlink resolver and the
/// resolved target is granted in the plug's AppArmor profile.
pub struct BoolFileInterface {
    policy: PathPolicy,
    resolver: SymlinkResolver,
}

impl BoolFileInterface {
    pub fn new() -> Self {
        Self::with_resolver(filesystem_resolver())
    }

    pub fn with_resolver(resolver: SymlinkResolver) -> Self {
        Self {
            policy: PathPolicy::new(
                &[LED_BRIGHTNESS_PATTERN, GPIO_VALUE_PATTERN],
                "can only point at LED brightness or GPIO value",
            ),
            resolver,
        }
    }

    fn dereferenced_path(&self, slot: &Slot) -> Result<PathBuf> {
        let path = required_str(NAME, &slot.attrs, "path")?;
        (self.resolver)(Path::new(path)).map_err(|e| InterfaceError::snippet(EndpointSide::Plug, e))
    }
}

impl Default for BoolFileInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BoolFileInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoolFileInterface").finish_non_exhaustive()
    }
}

impl Interface for BoolFileInterface {
    fn name(&self) -> &str {
        NAME
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo {
            summary: "allows access to specific file with bool semantics",
            implicit_on_core: false,
        }
    }

    fn sanitize_slot(&self, slot: &mut Slot) -> Result<()> {
        let path = required_str(NAME, &slot.attrs, "path")?;
        let cleaned = self.policy.check(NAME, path)?;
        slot.attrs.insert("path".to_string(), cleaned.into());
        Ok(())
    }

    fn apparmor_connected_plug(
        &self,
        spec: &mut apparmor::Specification,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        let resolved = self.dereferenced_path(conn.slot)?;
        spec.add_snippet(&format!("{} rwk,", resolved.display()));
        Ok(())
    }
}
