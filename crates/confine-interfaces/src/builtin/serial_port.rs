//! `serial-port`: exclusive access to one serial device node.

use crate::error::Result;
use crate::interface::{ConnectedPair, Interface, StaticInfo};
use crate::model::Slot;
use crate::sanitize::{required_str, PathPolicy};
use crate::specs::{apparmor, udev};

const NAME: &str = "serial-port";

#[derive(Debug)]
pub struct SerialPortInterface {
    policy: PathPolicy,
}

impl SerialPortInterface {
    pub fn new() -> Self {
        Self {
            policy: PathPolicy::new(
                &[r"^/dev/tty[A-Z]{1,5}[0-9]{1,3}$"],
                "path attribute must be a valid device node",
            ),
        }
    }
}

impl Default for SerialPortInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface for SerialPortInterface {
    fn name(&self) -> &str {
        NAME
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo {
            summary: "allows accessing a specific serial port",
            implicit_on_core: false,
        }
    }

    fn allows_multiple_plugs(&self) -> bool {
        false
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
        let path = required_str(NAME, &conn.slot.attrs, "path")?;
        spec.add_snippet(&format!("{path} rwk,"));
        Ok(())
    }

    fn udev_connected_plug(
        &self,
        spec: &mut udev::Specification,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        let path = required_str(NAME, &conn.slot.attrs, "path")?;
        let kernel = path.rsplit('/').next().unwrap_or(path);
        spec.tag_device(&format!("SUBSYSTEM==\"tty\", KERNEL==\"{kernel}\""));
        Ok(())
    }
}
