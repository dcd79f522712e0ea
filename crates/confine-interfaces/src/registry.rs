//! # Capability Registry
//!
//! Maps interface names to implementations. Built once at startup, then
//! shared read-only (typically behind an `Arc`) by every component that
//! needs to look an interface up.
//!
//! ## Usage
//!
//! ```rust
//! use confine_interfaces::InterfaceRegistry;
//!
//! let registry = InterfaceRegistry::with_builtins().unwrap();
//! assert!(registry.lookup("bool-file").is_ok());
//! assert!(registry.lookup("no-such-interface").is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::builtin::{self, SymlinkResolver};
use crate::error::{InterfaceError, Result};
use crate::interface::Interface;

/// Name → implementation table.
#[derive(Debug, Default, Clone)]
pub struct InterfaceRegistry {
    interfaces: BTreeMap<String, Arc<dyn Interface>>,
}

impl InterfaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in interface.
    ///
    /// # Errors
    ///
    /// Returns `InterfaceError::DuplicateInterface` if two built-ins share a name.
    pub fn with_builtins() -> Result<Self> {
        Self::from_interfaces(builtin::interfaces())
    }

    /// Same as [`with_builtins`](Self::with_builtins) with a custom symlink resolver.
    pub fn with_builtins_resolving(resolver: SymlinkResolver) -> Result<Self> {
        Self::from_interfaces(builtin::interfaces_with_resolver(resolver))
    }

    /// Creates a registry from a list of interfaces.
    pub fn from_interfaces(
        interfaces: impl IntoIterator<Item = Arc<dyn Interface>>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for iface in interfaces {
            registry.register(iface)?;
        }
        Ok(registry)
    }

    /// Adds an interface.
    ///
    /// # Errors
    ///
    /// Returns `InterfaceError::DuplicateInterface` if the name is taken.
    /// This is a startup configuration error and should abort startup.
    pub fn register(&mut self, iface: Arc<dyn Interface>) -> Result<()> {
        let name = iface.name().to_string();
        if self.interfaces.contains_key(&name) {
            return Err(InterfaceError::DuplicateInterface(name));
        }
        debug!("Registered interface {}", name);
        self.interfaces.insert(name, iface);
        Ok(())
    }

    /// Looks an interface up by name.
    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn Interface>> {
        self.interfaces
            .get(name)
            .ok_or_else(|| InterfaceError::UnknownInterface(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Sorted interface names.
    pub fn names(&self) -> Vec<&str> {
        self.interfaces.keys().map(String::as_str).collect()
    }

    /// Interfaces in name order.
    pub fn interfaces(&self) -> impl Iterator<Item = &Arc<dyn Interface>> {
        self.interfaces.values()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::NetworkInterface;

    #[test]
    fn test_builtins_registered() {
        let registry = InterfaceRegistry::with_builtins().unwrap();
        assert_eq!(registry.names(), vec!["bool-file", "dbus", "network", "serial-port"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = InterfaceRegistry::new();
        registry.register(Arc::new(NetworkInterface)).unwrap();
        let err = registry.register(Arc::new(NetworkInterface)).unwrap_err();
        assert!(matches!(err, InterfaceError::DuplicateInterface(ref n) if n == "network"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = InterfaceRegistry::new();
        let err = registry.lookup("bool-file").unwrap_err();
        assert_eq!(err.to_string(), "unknown interface \"bool-file\"");
    }
}
