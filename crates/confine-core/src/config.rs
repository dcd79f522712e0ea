//! Configuration types for Confine.
//!
//! ```toml
//! [state]
//! db_path = "/var/lib/confine/state.db"
//! change_retention = 50
//!
//! [conflicts]
//! exclusive_kinds = ["remodel"]
//! compatible_kinds = [["connect", "auto-connect"]]
//!
//! [interfaces]
//! disabled = ["dbus"]
//!
//! [global]
//! implicit_slots = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use confine_state::ConflictPolicy;
use serde::{Deserialize, Serialize};

use crate::error::GuardError;
use crate::Result;

/// Configuration for the interface manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfineConfig {
    /// State store configuration.
    pub state: StateConfig,

    /// Which change kinds may overlap.
    pub conflicts: ConflictPolicy,

    /// Interface catalog configuration.
    pub interfaces: InterfacesConfig,

    /// Global settings.
    pub global: GlobalConfig,
}

impl ConfineConfig {
    /// Parses a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GuardError::Config(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| GuardError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

/// State store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Database directory. State is memory-only when unset.
    pub db_path: Option<PathBuf>,

    /// Finished changes kept in the store; older ones are pruned when a
    /// new change completes.
    pub change_retention: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            change_retention: 50,
        }
    }
}

/// Interface catalog configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfacesConfig {
    /// Built-in interfaces left out of the registry.
    pub disabled: Vec<String>,
}

/// Global settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Give base-system snaps a slot for every interface that is implicit
    /// on the base system.
    pub implicit_slots: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            implicit_slots: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfineConfig::default();
        assert!(config.global.implicit_slots);
        assert!(config.state.db_path.is_none());
        assert_eq!(config.state.change_retention, 50);
        assert_eq!(config.conflicts.exclusive_kinds, vec!["remodel"]);
    }

    #[test]
    fn test_partial_toml() {
        let config = ConfineConfig::from_toml_str(
            r#"
[state]
change_retention = 5

[conflicts]
compatible_kinds = [["connect", "auto-connect"]]

[interfaces]
disabled = ["dbus"]
"#,
        )
        .unwrap();
        assert_eq!(config.conflicts.exclusive_kinds, vec!["remodel"]);
        assert!(config.conflicts.are_compatible("auto-connect", "connect"));
        assert_eq!(config.interfaces.disabled, vec!["dbus"]);
        assert_eq!(config.state.change_retention, 5);
        assert!(config.state.db_path.is_none());
        assert!(config.global.implicit_slots);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ConfineConfig::from_toml_str("[state\n").unwrap_err();
        assert!(matches!(err, GuardError::Config(_)));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = ConfineConfig::default();
        config.state.db_path = Some(PathBuf::from("/tmp/state.db"));
        let text = toml::to_string(&config).unwrap();
        assert_eq!(ConfineConfig::from_toml_str(&text).unwrap(), config);
    }
}
