//! # Repository and Build Pass Tests
//!
//! ## Test Categories
//!
//! 1. **Connection Tracking**: connect / disconnect contracts
//! 2. **Build Passes**: composition order and fail-closed behavior
//! 3. **Concurrency**: independent builds over a shared repository

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builtin::{self, SymlinkResolver};
use crate::error::{EndpointSide, InterfaceError, Result};
use crate::interface::{ConnectedPair, Interface};
use crate::manifest::SnapInfo;
use crate::model::{Attrs, ConnRef, Plug, PlugRef, Slot, SlotRef};
use crate::registry::InterfaceRegistry;
use crate::repo::{ConnectionAttrs, Repository};
use crate::specs::{apparmor, seccomp, SecuritySystem, Specification};

// =============================================================================
// Helper Functions
// =============================================================================

/// Contributes a fixed line per connected plug; fails when the slot has `fail: true`.
#[derive(Debug)]
struct MarkerInterface {
    name: &'static str,
}

impl Interface for MarkerInterface {
    fn name(&self) -> &str {
        self.name
    }

    fn apparmor_permanent_plug(
        &self,
        spec: &mut apparmor::Specification,
        plug: &Plug,
    ) -> Result<()> {
        spec.add_snippet(&format!("# permanent {}", plug.name));
        Ok(())
    }

    fn apparmor_connected_plug(
        &self,
        spec: &mut apparmor::Specification,
        conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        if conn.slot.attrs.get("fail").and_then(|v| v.as_bool()) == Some(true) {
            return Err(InterfaceError::snippet(EndpointSide::Plug, "marker failure"));
        }
        spec.add_snippet(&format!("# {} via {}", self.name, conn.slot.name));
        Ok(())
    }
}

fn registry() -> Arc<InterfaceRegistry> {
    let resolver: SymlinkResolver =
        Arc::new(|p: &Path| -> io::Result<PathBuf> { Ok(p.to_path_buf()) });
    let mut registry = InterfaceRegistry::with_builtins_resolving(resolver).unwrap();
    registry.register(Arc::new(MarkerInterface { name: "alpha" })).unwrap();
    registry.register(Arc::new(MarkerInterface { name: "beta" })).unwrap();
    Arc::new(registry)
}

const PROVIDER: &str = r#"
name: provider
slots:
  alpha:
  beta:
  broken:
    interface: alpha
    fail: true
  serial:
    interface: serial-port
    path: /dev/ttyUSB0
"#;

const CONSUMER: &str = r#"
name: consumer
plugs:
  alpha:
  beta:
  serial: serial-port
apps:
  app:
    command: run
"#;

const SECOND_CONSUMER: &str = r#"
name: second
plugs:
  serial: serial-port
apps:
  cli:
    command: run
"#;

fn repo() -> Repository {
    let mut repo = Repository::new(registry());
    repo.add_snap(&SnapInfo::from_yaml(PROVIDER).unwrap()).unwrap();
    repo.add_snap(&SnapInfo::from_yaml(CONSUMER).unwrap()).unwrap();
    repo.add_snap(&SnapInfo::from_yaml(SECOND_CONSUMER).unwrap()).unwrap();
    repo
}

fn conn(plug_snap: &str, plug: &str, slot_snap: &str, slot: &str) -> ConnRef {
    ConnRef::new(PlugRef::new(plug_snap, plug), SlotRef::new(slot_snap, slot))
}

// =============================================================================
// Connection Tracking Tests
// =============================================================================

#[test]
fn test_connect_disconnect_round_trip() {
    let mut repo = repo();
    let c = conn("consumer", "alpha", "provider", "alpha");
    let plug_before = repo.connections_for_plug(&c.plug).len();
    let slot_before = repo.connections_for_slot(&c.slot).len();

    repo.connect(c.clone(), ConnectionAttrs::default()).unwrap();
    assert!(repo.is_connected(&c));
    assert_eq!(repo.connections_for_plug(&c.plug), vec![c.clone()]);

    repo.disconnect(&c).unwrap();
    assert_eq!(repo.connections_for_plug(&c.plug).len(), plug_before);
    assert_eq!(repo.connections_for_slot(&c.slot).len(), slot_before);
}

#[test]
fn test_disconnect_missing_connection_reported() {
    let mut repo = repo();
    let c = conn("consumer", "alpha", "provider", "alpha");
    let err = repo.disconnect(&c).unwrap_err();
    assert!(matches!(err, InterfaceError::NotConnected(ref r) if r == &c));
    assert!(repo.connections().is_empty());
}

#[test]
fn test_connect_interface_mismatch() {
    let mut repo = repo();
    let err = repo
        .connect(conn("consumer", "alpha", "provider", "beta"), ConnectionAttrs::default())
        .unwrap_err();
    assert!(matches!(err, InterfaceError::InterfaceMismatch { .. }));
}

#[test]
fn test_connect_unknown_endpoints() {
    let mut repo = repo();
    let err = repo
        .connect(conn("consumer", "nope", "provider", "alpha"), ConnectionAttrs::default())
        .unwrap_err();
    assert!(matches!(err, InterfaceError::UnknownPlug(_)));
    let err = repo
        .connect(conn("consumer", "alpha", "provider", "nope"), ConnectionAttrs::default())
        .unwrap_err();
    assert!(matches!(err, InterfaceError::UnknownSlot(_)));
}

#[test]
fn test_connect_requires_sanitized_endpoints() {
    let mut repo = Repository::new(registry());
    repo.add_plug(Plug::new("raw", "alpha", "alpha").with_app("app")).unwrap();
    repo.add_slot(Slot::new("raw-provider", "alpha", "alpha")).unwrap();
    let c = conn("raw", "alpha", "raw-provider", "alpha");

    let err = repo.connect(c.clone(), ConnectionAttrs::default()).unwrap_err();
    assert!(matches!(
        err,
        InterfaceError::Unsanitized {
            side: EndpointSide::Plug,
            ..
        }
    ));

    repo.sanitize_plug(&c.plug).unwrap();
    repo.sanitize_slot(&c.slot).unwrap();
    repo.connect(c.clone(), ConnectionAttrs::default()).unwrap();
    assert!(repo.is_connected(&c));
}

#[test]
fn test_repository_sanitize_twice_keeps_attrs() {
    let mut repo = Repository::new(registry());
    repo.add_slot(
        Slot::new("gadget", "led", "bool-file")
            .with_attr("path", "/sys//class/./leds/status/brightness"),
    )
    .unwrap();
    let led = SlotRef::new("gadget", "led");

    repo.sanitize_slot(&led).unwrap();
    let first = repo.slot(&led).unwrap().attrs.clone();
    assert_eq!(
        first.get("path").and_then(|v| v.as_str()),
        Some("/sys/class/leds/status/brightness")
    );

    repo.sanitize_slot(&led).unwrap();
    let slot = repo.slot(&led).unwrap();
    assert_eq!(slot.attrs, first);
    assert!(slot.is_sanitized());
}

#[test]
fn test_connect_twice_rejected() {
    let mut repo = repo();
    let c = conn("consumer", "alpha", "provider", "alpha");
    repo.connect(c.clone(), ConnectionAttrs::default()).unwrap();
    let err = repo.connect(c, ConnectionAttrs::default()).unwrap_err();
    assert!(matches!(err, InterfaceError::AlreadyConnected(_)));
}

#[test]
fn test_plug_connects_to_one_slot() {
    let mut repo = repo();
    repo.connect(conn("consumer", "alpha", "provider", "alpha"), ConnectionAttrs::default())
        .unwrap();
    let err = repo
        .connect(conn("consumer", "alpha", "provider", "broken"), ConnectionAttrs::default())
        .unwrap_err();
    assert!(matches!(err, InterfaceError::PlugInUse { .. }));
}

#[test]
fn test_exclusive_slot_holds_one_plug() {
    let mut repo = repo();
    repo.connect(conn("consumer", "serial", "provider", "serial"), ConnectionAttrs::default())
        .unwrap();
    let err = repo
        .connect(conn("second", "serial", "provider", "serial"), ConnectionAttrs::default())
        .unwrap_err();
    match err {
        InterfaceError::SlotOccupied { plug, interface, .. } => {
            assert_eq!(plug, PlugRef::new("consumer", "serial"));
            assert_eq!(interface, "serial-port");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_remove_snap_drops_connections() {
    let mut repo = repo();
    repo.connect(conn("consumer", "alpha", "provider", "alpha"), ConnectionAttrs::default())
        .unwrap();
    repo.connect(conn("consumer", "beta", "provider", "beta"), ConnectionAttrs::default())
        .unwrap();

    let dropped = repo.remove_snap("provider");
    assert_eq!(dropped.len(), 2);
    assert!(repo.connections().is_empty());
    assert!(!repo.has_snap("provider"));
    assert!(repo.slot(&SlotRef::new("provider", "alpha")).is_none());
    assert!(repo.plug(&PlugRef::new("consumer", "alpha")).is_some());
}

#[test]
fn test_add_snap_is_all_or_nothing() {
    let mut repo = Repository::new(registry());
    let info = SnapInfo::from_yaml(
        r#"
name: core
slots:
  good:
    interface: bool-file
    path: /sys/class/gpio/gpio1/value
  bad:
    interface: bool-file
    path: /etc/shadow
"#,
    )
    .unwrap();
    let err = repo.add_snap(&info).unwrap_err();
    assert!(err.is_declaration_error());
    assert!(!repo.has_snap("core"));
    assert!(repo.slot(&SlotRef::new("core", "good")).is_none());

    let err = repo
        .add_snap(&SnapInfo::from_yaml("name: x\nplugs:\n  p: unknown-iface\n").unwrap())
        .unwrap_err();
    assert!(matches!(err, InterfaceError::UnknownInterface(_)));
}

#[test]
fn test_add_snap_twice_rejected() {
    let mut repo = repo();
    let err = repo
        .add_snap(&SnapInfo::from_yaml(CONSUMER).unwrap())
        .unwrap_err();
    assert!(matches!(err, InterfaceError::DuplicateSnap(_)));
}

// =============================================================================
// Build Pass Tests
// =============================================================================

#[test]
fn test_snap_specification_composes_interfaces_in_stable_order() {
    let mut repo = repo();
    repo.connect(conn("consumer", "beta", "provider", "beta"), ConnectionAttrs::default())
        .unwrap();
    repo.connect(conn("consumer", "alpha", "provider", "alpha"), ConnectionAttrs::default())
        .unwrap();

    let spec: apparmor::Specification = repo.snap_specification("consumer").unwrap();
    assert_eq!(spec.security_tags(), vec!["snap.consumer.app"]);
    assert_eq!(
        spec.snippet_for_tag("snap.consumer.app"),
        "# permanent alpha\n# permanent beta\n# alpha via alpha\n# beta via beta"
    );

    let again: apparmor::Specification = repo.snap_specification("consumer").unwrap();
    assert_eq!(spec, again);
}

#[test]
fn test_failed_build_returns_no_specification() {
    let mut repo = repo();
    repo.connect(conn("consumer", "alpha", "provider", "broken"), ConnectionAttrs::default())
        .unwrap();

    let err = repo
        .snap_specification::<apparmor::Specification>("consumer")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot compute plug security snippet: marker failure"
    );
    assert!(repo.security_profiles("consumer").is_err());
}

#[test]
fn test_failed_hook_leaves_no_tags() {
    let repo = repo();
    let iface = repo.registry().lookup("alpha").unwrap().clone();
    let plug = repo.plug(&PlugRef::new("consumer", "alpha")).unwrap();
    let good = repo.slot(&SlotRef::new("provider", "alpha")).unwrap();
    let broken = repo.slot(&SlotRef::new("provider", "broken")).unwrap();
    let none = Attrs::new();

    let mut spec = apparmor::Specification::new();
    spec.add_connected_plug(iface.as_ref(), plug, &none, good, &none).unwrap();
    let before = spec.clone();
    assert!(spec
        .add_connected_plug(iface.as_ref(), plug, &none, broken, &none)
        .is_err());
    assert_eq!(spec, before);
}

#[test]
fn test_security_profiles_cover_backends() {
    let mut repo = repo();
    repo.connect(conn("consumer", "serial", "provider", "serial"), ConnectionAttrs::default())
        .unwrap();

    let profiles = repo.security_profiles("consumer").unwrap();
    assert_eq!(
        profiles.snippet(SecuritySystem::AppArmor, "snap.consumer.app"),
        Some("# permanent alpha\n# permanent beta\n/dev/ttyUSB0 rwk,")
    );
    assert_eq!(
        profiles.snippet(SecuritySystem::Udev, "snap.consumer.app"),
        Some("SUBSYSTEM==\"tty\", KERNEL==\"ttyUSB0\", TAG+=\"snap_consumer_app\"")
    );
    assert!(profiles.security_tags(SecuritySystem::Seccomp).is_empty());

    // The provider has no apps, so nothing is keyed for it.
    assert!(repo.security_profiles("provider").unwrap().is_empty());
}

#[test]
fn test_builtin_interfaces_listed() {
    let names: Vec<String> = builtin::interfaces()
        .iter()
        .map(|i| i.name().to_string())
        .collect();
    assert!(names.contains(&"bool-file".to_string()));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_builds_share_repository() {
    let mut repo = repo();
    repo.connect(conn("consumer", "alpha", "provider", "alpha"), ConnectionAttrs::default())
        .unwrap();
    let repo = Arc::new(repo);

    let expected: apparmor::Specification = repo.snap_specification("consumer").unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let repo = Arc::clone(&repo);
                scope.spawn(move || {
                    let aa: apparmor::Specification = repo.snap_specification("consumer").unwrap();
                    let sc: seccomp::Specification = repo.snap_specification("consumer").unwrap();
                    (aa, sc)
                })
            })
            .collect();
        for handle in handles {
            let (aa, sc) = handle.join().unwrap();
            assert_eq!(aa, expected);
            assert!(sc.snippets().is_empty());
        }
    });
}
