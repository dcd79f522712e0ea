//! # Snap Declarations
//!
//! Parses the part of a snap's YAML metadata that declares plugs, slots and
//! apps, and turns it into unsanitized [`Plug`] and [`Slot`] values.
//!
//! ```yaml
//! name: ubuntu-core
//! type: os
//! slots:
//!   gpio:
//!     interface: bool-file
//!     path: /sys/class/gpio/gpio13/value
//!   network: network        # interface name only
//! apps:
//!   app:
//!     command: foo
//!     plugs: [serial]       # app-level: bound to this app only
//! ```
//!
//! A top-level endpoint that some app lists is bound to those apps only;
//! one that no app lists is bound to every app.
//!
//! Malformed declarations are rejected here, before any endpoint reaches
//! the Sanitizer.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{InterfaceError, Result};
use crate::model::{Attrs, Plug, Slot};

/// Kind of snap, as declared by `type:`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapType {
    #[default]
    App,
    Os,
    Base,
    Gadget,
    Kernel,
    Snapd,
}

/// One executable entry point of a snap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub command: Option<String>,
}

/// Endpoint-relevant view of a snap's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapInfo {
    pub name: String,
    pub snap_type: SnapType,
    pub apps: BTreeMap<String, AppInfo>,
    pub plugs: BTreeMap<String, Plug>,
    pub slots: BTreeMap<String, Slot>,
}

#[derive(Deserialize)]
struct RawSnap {
    name: String,
    #[serde(default, rename = "type")]
    snap_type: SnapType,
    #[serde(default)]
    apps: BTreeMap<String, Option<RawApp>>,
    #[serde(default)]
    plugs: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    slots: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Deserialize, Default)]
struct RawApp {
    command: Option<String>,
    #[serde(default)]
    plugs: Vec<String>,
    #[serde(default)]
    slots: Vec<String>,
}

struct NameRules {
    endpoint: Regex,
    app: Regex,
}

impl NameRules {
    fn new() -> Self {
        Self {
            endpoint: Regex::new(r"^[a-z](?:-?[a-z0-9])*$").expect("name pattern must compile"),
            app: Regex::new(r"^[A-Za-z0-9](?:-?[A-Za-z0-9])*$").expect("app pattern must compile"),
        }
    }

    fn check(&self, what: &str, name: &str, pattern: &Regex) -> Result<()> {
        if pattern.is_match(name) {
            Ok(())
        } else {
            Err(InterfaceError::InvalidDeclaration(format!(
                "invalid {what} name: {name:?}"
            )))
        }
    }
}

/// Splits an endpoint declaration into interface name and attributes.
fn parse_endpoint(kind: &str, name: &str, decl: serde_yaml::Value) -> Result<(String, Attrs)> {
    match decl {
        serde_yaml::Value::Null => Ok((name.to_string(), Attrs::new())),
        serde_yaml::Value::String(iface) => Ok((iface, Attrs::new())),
        serde_yaml::Value::Mapping(map) => {
            let mut interface = name.to_string();
            let mut attrs = Attrs::new();
            for (key, value) in map {
                let key = match key {
                    serde_yaml::Value::String(key) => key,
                    other => {
                        return Err(InterfaceError::InvalidDeclaration(format!(
                            "{kind} {name:?} has non-string attribute key {other:?}"
                        )))
                    }
                };
                if key == "interface" {
                    interface = value.as_str().map(str::to_string).ok_or_else(|| {
                        InterfaceError::InvalidDeclaration(format!(
                            "interface name of {kind} {name:?} must be a string"
                        ))
                    })?;
                    continue;
                }
                let value = serde_json::to_value(&value).map_err(|e| {
                    InterfaceError::InvalidDeclaration(format!(
                        "attribute {key:?} of {kind} {name:?}: {e}"
                    ))
                })?;
                attrs.insert(key, value);
            }
            Ok((interface, attrs))
        }
        other => Err(InterfaceError::InvalidDeclaration(format!(
            "{kind} {name:?} has malformed definition {other:?}"
        ))),
    }
}

impl SnapInfo {
    /// Parses and validates a snap declaration.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawSnap = serde_yaml::from_str(yaml)?;
        let rules = NameRules::new();
        rules.check("snap", &raw.name, &rules.endpoint)?;

        let mut apps = BTreeMap::new();
        let mut app_plugs: Vec<(String, String)> = Vec::new();
        let mut app_slots: Vec<(String, String)> = Vec::new();
        for (app_name, raw_app) in raw.apps {
            rules.check("app", &app_name, &rules.app)?;
            let raw_app = raw_app.unwrap_or_default();
            for plug in raw_app.plugs {
                app_plugs.push((app_name.clone(), plug));
            }
            for slot in raw_app.slots {
                app_slots.push((app_name.clone(), slot));
            }
            apps.insert(
                app_name.clone(),
                AppInfo {
                    name: app_name,
                    command: raw_app.command,
                },
            );
        }

        let mut plugs = BTreeMap::new();
        for (name, decl) in raw.plugs {
            rules.check("plug", &name, &rules.endpoint)?;
            let (interface, attrs) = parse_endpoint("plug", &name, decl)?;
            rules.check("interface", &interface, &rules.endpoint)?;
            let mut plug = Plug::new(&raw.name, &name, interface);
            plug.attrs = attrs;
            plugs.insert(name, plug);
        }
        for (app, name) in app_plugs {
            rules.check("plug", &name, &rules.endpoint)?;
            plugs
                .entry(name.clone())
                .or_insert_with(|| Plug::new(&raw.name, &name, &name))
                .apps
                .insert(app);
        }

        let mut slots = BTreeMap::new();
        for (name, decl) in raw.slots {
            rules.check("slot", &name, &rules.endpoint)?;
            let (interface, attrs) = parse_endpoint("slot", &name, decl)?;
            rules.check("interface", &interface, &rules.endpoint)?;
            let mut slot = Slot::new(&raw.name, &name, interface);
            slot.attrs = attrs;
            slots.insert(name, slot);
        }
        for (app, name) in app_slots {
            rules.check("slot", &name, &rules.endpoint)?;
            slots
                .entry(name.clone())
                .or_insert_with(|| Slot::new(&raw.name, &name, &name))
                .apps
                .insert(app);
        }

        // Endpoints no app asks for explicitly serve every app.
        for plug in plugs.values_mut().filter(|p| p.apps.is_empty()) {
            plug.apps = apps.keys().cloned().collect();
        }
        for slot in slots.values_mut().filter(|s| s.apps.is_empty()) {
            slot.apps = apps.keys().cloned().collect();
        }

        Ok(SnapInfo {
            name: raw.name,
            snap_type: raw.snap_type,
            apps,
            plugs,
            slots,
        })
    }

    /// Security tags of every app, sorted.
    pub fn security_tags(&self) -> Vec<String> {
        self.apps
            .keys()
            .map(|app| crate::model::security_tag(&self.name, app))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE_YAML: &str = r#"
name: ubuntu-core
type: os
slots:
    gpio:
        interface: bool-file
        path: /sys/class/gpio/gpio13/value
    missing-path: bool-file
    network:
plugs:
    bad-interface-plug: other-interface
"#;

    #[test]
    fn test_parse_slots_and_attrs() {
        let info = SnapInfo::from_yaml(CORE_YAML).unwrap();
        assert_eq!(info.name, "ubuntu-core");
        assert_eq!(info.snap_type, SnapType::Os);

        let gpio = &info.slots["gpio"];
        assert_eq!(gpio.interface, "bool-file");
        assert_eq!(gpio.attr_str("path"), Some("/sys/class/gpio/gpio13/value"));
        assert!(!gpio.is_sanitized());
        assert!(gpio.apps.is_empty());

        assert_eq!(info.slots["missing-path"].interface, "bool-file");
        assert!(info.slots["missing-path"].attrs.is_empty());
        assert_eq!(info.slots["network"].interface, "network");
        assert_eq!(info.plugs["bad-interface-plug"].interface, "other-interface");
    }

    #[test]
    fn test_top_level_plugs_bind_to_all_apps() {
        let info = SnapInfo::from_yaml(
            r#"
name: other
plugs:
  plug: bool-file
apps:
  app:
    command: foo
  tool:
    command: bar
    plugs: [network]
"#,
        )
        .unwrap();
        assert_eq!(
            info.plugs["plug"].security_tags(),
            vec!["snap.other.app", "snap.other.tool"]
        );
        let network = &info.plugs["network"];
        assert_eq!(network.interface, "network");
        assert_eq!(network.security_tags(), vec!["snap.other.tool"]);
        assert_eq!(info.security_tags(), vec!["snap.other.app", "snap.other.tool"]);
    }

    #[test]
    fn test_listed_top_level_plug_binds_to_listing_apps() {
        let info = SnapInfo::from_yaml(
            r#"
name: s
plugs:
  serial:
    interface: serial-port
  net: network
slots:
  svc: dbus
apps:
  a:
    command: a
    plugs: [serial]
  b:
    command: b
    slots: [svc]
"#,
        )
        .unwrap();
        let serial = &info.plugs["serial"];
        assert_eq!(serial.interface, "serial-port");
        assert_eq!(serial.security_tags(), vec!["snap.s.a"]);
        assert_eq!(info.plugs["net"].security_tags(), vec!["snap.s.a", "snap.s.b"]);
        assert_eq!(info.slots["svc"].security_tags(), vec!["snap.s.b"]);
        assert_eq!(info.slots["svc"].interface, "dbus");
    }

    #[test]
    fn test_invalid_names_rejected() {
        let err = SnapInfo::from_yaml("name: Bad_Name\n").unwrap_err();
        assert!(err.is_declaration_error());

        let err = SnapInfo::from_yaml("name: ok\nplugs:\n  bad--plug: network\n").unwrap_err();
        assert!(matches!(err, InterfaceError::InvalidDeclaration(_)));
    }

    #[test]
    fn test_malformed_definition_rejected() {
        let err = SnapInfo::from_yaml("name: ok\nslots:\n  s: [1, 2]\n").unwrap_err();
        assert!(matches!(err, InterfaceError::InvalidDeclaration(_)));

        let err = SnapInfo::from_yaml("name: ok\nslots:\n  s:\n    interface: 3\n").unwrap_err();
        assert!(matches!(err, InterfaceError::InvalidDeclaration(_)));
    }

    #[test]
    fn test_unparseable_yaml() {
        let err = SnapInfo::from_yaml("name: [unterminated").unwrap_err();
        assert!(matches!(err, InterfaceError::Yaml(_)));
    }
}
