//! # Built-in Interfaces
//!
//! | Interface | Backends touched | Notes |
//! |-----------|------------------|-------|
//! | `bool-file` | AppArmor | LED brightness / GPIO value files, symlinks resolved at connect time |
//! | `dbus` | AppArmor, D-Bus | Well-known bus names on the session or system bus |
//! | `network` | AppArmor, seccomp | Implicit on the base system |
//! | `serial-port` | AppArmor, udev | One plug per slot |

mod bool_file;
mod dbus;
mod network;
mod serial_port;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use bool_file::BoolFileInterface;
pub use dbus::DBusInterface;
pub use network::NetworkInterface;
pub use serial_port::SerialPortInterface;

use crate::interface::Interface;

/// Resolves symbolic links of a live filesystem path.
pub type SymlinkResolver = Arc<dyn Fn(&Path) -> io::Result<PathBuf> + Send + Sync>;

/// Resolver backed by the real filesystem.
pub fn filesystem_resolver() -> SymlinkResolver {
    Arc::new(|path: &Path| std::fs::canonicalize(path))
}

/// All built-in interfaces, resolving symlinks against the real filesystem.
pub fn interfaces() -> Vec<Arc<dyn Interface>> {
    interfaces_with_resolver(filesystem_resolver())
}

/// All built-in interfaces, with a caller supplied symlink resolver.
pub fn interfaces_with_resolver(resolver: SymlinkResolver) -> Vec<Arc<dyn Interface>> {
    vec![
        Arc::new(BoolFileInterface::with_resolver(resolver)),
        Arc::new(DBusInterface::new()),
        Arc::new(NetworkInterface),
        Arc::new(SerialPortInterface::new()),
    ]
}
