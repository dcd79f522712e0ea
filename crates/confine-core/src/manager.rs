//! The gated interface manager.
//!
//! [`InterfaceManager`] is the main entry point. It owns the state store,
//! the interface registry and the repository, and runs every connection
//! change through the gate before touching any profile.

use std::collections::BTreeMap;
use std::sync::Arc;

use confine_interfaces::{
    Attrs, ConnRef, ConnectionAttrs, InterfaceRegistry, PlugRef, Repository, SecurityProfiles, Slot,
    SlotRef, SnapInfo, SnapType,
};
use confine_state::{ConflictDetector, DeviceContext, DeviceResolver, State, StateGuard, Status};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    config::ConfineConfig,
    error::GuardError,
    outcome::{ChangeOutcome, InterfaceSummary},
    Result,
};

/// State key holding established connections.
pub const CONNS_KEY: &str = "conns";

const CONNECT_KIND: &str = "connect";
const DISCONNECT_KIND: &str = "disconnect";
const REMOVE_SNAP_KIND: &str = "remove-snap";

/// Persisted form of one connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnState {
    pub interface: String,
    #[serde(default, rename = "plug-dynamic")]
    pub plug_attrs: Attrs,
    #[serde(default, rename = "slot-dynamic")]
    pub slot_attrs: Attrs,
}

type ConnStates = BTreeMap<String, ConnState>;

fn load_conns(st: &StateGuard<'_>) -> Result<ConnStates> {
    Ok(st.get::<ConnStates>(CONNS_KEY)?.unwrap_or_default())
}

/// Gated connection manager.
///
/// # Security Model
///
/// A connect or disconnect runs, in order:
/// 1. Device readiness (seeded device for connect, known model for disconnect)
/// 2. Change-conflict check against in-flight changes
/// 3. Change recorded, sanitization, repository update
/// 4. Profile rebuild of both snaps
/// 5. Final status, pruning of old finished changes, checkpoint
///
/// Steps 1 and 2 reject before anything is recorded. A failure in step 4
/// rolls the repository back and leaves the change in `Error`. Success is
/// reported only after step 5 has written the store.
///
/// # Locking
///
/// The state lock is taken first and held for the whole operation; the
/// repository lock is taken inside it. Read-only queries take only the
/// repository lock. The checkpoint in step 5 is the one storage write made
/// under the state lock.
///
/// # Example
///
/// ```rust
/// use confine_core::{ConfineConfig, InterfaceManager};
/// use confine_interfaces::{PlugRef, SlotRef, SnapInfo};
/// use confine_state::devicectx::{Model, MODEL_KEY, SEEDED_KEY};
///
/// let manager = InterfaceManager::new(ConfineConfig::default()).unwrap();
/// {
///     let mut st = manager.state().lock();
///     st.set(SEEDED_KEY, &true).unwrap();
///     st.set(MODEL_KEY, &Model::new("my-brand", "my-model")).unwrap();
/// }
///
/// manager.add_snap(&SnapInfo::from_yaml("name: core\ntype: os\n").unwrap()).unwrap();
/// manager
///     .add_snap(&SnapInfo::from_yaml("name: web\nplugs:\n  network:\napps:\n  srv:\n    command: srv\n").unwrap())
///     .unwrap();
///
/// let outcome = manager
///     .connect(&PlugRef::new("web", "network"), &SlotRef::new("core", "network"))
///     .unwrap();
/// assert!(outcome.profiles_for("web").is_some());
/// ```
pub struct InterfaceManager {
    config: ConfineConfig,
    state: Arc<State>,
    registry: Arc<InterfaceRegistry>,
    repo: RwLock<Repository>,
    resolver: DeviceResolver,
    conflicts: ConflictDetector,
}

impl InterfaceManager {
    /// Creates a manager with the built-in interfaces.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the state database cannot be opened
    /// - a disabled interface is not a built-in
    pub fn new(config: ConfineConfig) -> Result<Self> {
        let state = match &config.state.db_path {
            Some(path) => State::open(path)?,
            None => State::new(),
        };

        let mut builtins = InterfaceRegistry::with_builtins()?;
        for name in &config.interfaces.disabled {
            if !builtins.contains(name) {
                return Err(GuardError::Config(format!(
                    "cannot disable unknown interface {name:?}"
                )));
            }
        }
        if !config.interfaces.disabled.is_empty() {
            builtins = InterfaceRegistry::from_interfaces(
                builtins
                    .interfaces()
                    .filter(|i| !config.interfaces.disabled.iter().any(|d| d == i.name()))
                    .cloned()
                    .collect::<Vec<_>>(),
            )?;
        }

        info!(
            "Interface manager initialized with {} interfaces",
            builtins.len()
        );
        Ok(Self::with_parts(config, Arc::new(state), Arc::new(builtins)))
    }

    /// Creates a manager from an existing state and registry.
    pub fn with_parts(
        config: ConfineConfig,
        state: Arc<State>,
        registry: Arc<InterfaceRegistry>,
    ) -> Self {
        let conflicts = ConflictDetector::new(config.conflicts.clone());
        Self {
            config,
            state,
            repo: RwLock::new(Repository::new(Arc::clone(&registry))),
            registry,
            resolver: DeviceResolver::default(),
            conflicts,
        }
    }

    /// Replaces the device resolver.
    #[must_use]
    pub fn with_device_resolver(mut self, resolver: DeviceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ConfineConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// Adds a snap's endpoints and restores its persisted connections.
    ///
    /// Base-system snaps get a slot for every implicit interface they do
    /// not declare themselves, unless disabled in the configuration.
    ///
    /// Returns the connections that were restored.
    pub fn add_snap(&self, info: &SnapInfo) -> Result<Vec<ConnRef>> {
        let st = self.state.lock();
        let mut repo = self.repo.write();

        let info = self.with_implicit_slots(info);
        repo.add_snap(&info)?;

        let mut restored = Vec::new();
        for (id, conn_state) in load_conns(&st)? {
            let conn: ConnRef = match id.parse() {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Skipping malformed connection record {:?}: {}", id, e);
                    continue;
                }
            };
            if conn.plug.snap != info.name && conn.slot.snap != info.name {
                continue;
            }
            if repo.plug(&conn.plug).is_none() || repo.slot(&conn.slot).is_none() {
                continue;
            }
            let attrs = ConnectionAttrs {
                plug: conn_state.plug_attrs,
                slot: conn_state.slot_attrs,
            };
            match repo.connect(conn.clone(), attrs) {
                Ok(()) => restored.push(conn),
                Err(e) => warn!("Cannot restore connection {}: {}", conn, e),
            }
        }

        if !restored.is_empty() {
            info!("Restored {} connections of {}", restored.len(), info.name);
        }
        Ok(restored)
    }

    fn with_implicit_slots(&self, info: &SnapInfo) -> SnapInfo {
        let mut info = info.clone();
        if !self.config.global.implicit_slots
            || !matches!(info.snap_type, SnapType::Os | SnapType::Snapd)
        {
            return info;
        }
        for iface in self.registry.interfaces() {
            if !iface.static_info().implicit_on_core || info.slots.contains_key(iface.name()) {
                continue;
            }
            debug!("Adding implicit {} slot to {}", iface.name(), info.name);
            info.slots.insert(
                iface.name().to_string(),
                Slot::new(&info.name, iface.name(), iface.name()),
            );
        }
        info
    }

    /// Removes a snap, its connections and their persisted records.
    ///
    /// # Errors
    ///
    /// - `UnknownSnap` if the snap was never added
    /// - a change conflict if another change touches the snap
    /// - a storage error if the removal cannot be written
    pub fn remove_snap(&self, name: &str) -> Result<Vec<ConnRef>> {
        let mut st = self.state.lock();
        self.conflicts.check(&st, REMOVE_SNAP_KIND, &[name], None)?;

        let mut repo = self.repo.write();
        if !repo.has_snap(name) {
            return Err(GuardError::UnknownSnap(name.to_string()));
        }
        let dropped = repo.remove_snap(name);

        let mut conns = load_conns(&st)?;
        let before = conns.len();
        conns.retain(|id, _| match id.parse::<ConnRef>() {
            Ok(conn) => conn.plug.snap != name && conn.slot.snap != name,
            Err(_) => true,
        });
        if conns.len() != before {
            st.set(CONNS_KEY, &conns)?;
        }
        st.checkpoint()?;

        info!("Removed snap {} ({} connections dropped)", name, dropped.len());
        Ok(dropped)
    }

    /// Connects a plug to a slot through the gate.
    ///
    /// # Errors
    ///
    /// - a `"seed"` conflict if the device is not seeded or has no model
    /// - a change conflict if an in-flight change blocks either snap
    /// - any repository or snippet error; the change is then left in `Error`
    /// - a storage error if the outcome cannot be written; the connection
    ///   stays in memory and is written by the next checkpoint
    pub fn connect(&self, plug: &PlugRef, slot: &SlotRef) -> Result<ChangeOutcome> {
        self.connect_with_context(plug, slot, None)
    }

    /// Same as [`connect`](Self::connect) with a caller supplied device context.
    pub fn connect_with_context(
        &self,
        plug: &PlugRef,
        slot: &SlotRef,
        ctx: Option<Arc<dyn DeviceContext>>,
    ) -> Result<ChangeOutcome> {
        let conn = ConnRef::new(plug.clone(), slot.clone());
        debug!("Connect requested: {}", conn);

        let mut st = self.state.lock();
        let device = self.resolver.device_past_seeding(&st, ctx)?;
        debug!("Connecting on device {}", device.model());
        self.conflicts
            .check(&st, CONNECT_KIND, &[plug.snap.as_str(), slot.snap.as_str()], None)?;

        let id = st.new_change(
            CONNECT_KIND,
            &format!("Connect {plug} to {slot}"),
            [plug.snap.clone(), slot.snap.clone()],
        );
        st.set_change_status(&id, Status::Doing)?;

        match self.do_connect(&mut st, &conn) {
            Ok(profiles) => {
                self.finish_change(&mut st, &id, Status::Done)?;
                info!("Connected {} (change {})", conn, id);
                Ok(ChangeOutcome {
                    change_id: id,
                    kind: CONNECT_KIND.to_string(),
                    connection: conn,
                    profiles,
                })
            }
            Err(e) => {
                warn!("Connect {} failed (change {}): {}", conn, id, e);
                if let Err(finish) = self.finish_change(&mut st, &id, Status::Error) {
                    error!("Cannot record failure of change {}: {}", id, finish);
                }
                Err(e)
            }
        }
    }

    /// Records the final status, prunes old changes and writes the store.
    fn finish_change(&self, st: &mut StateGuard<'_>, id: &str, status: Status) -> Result<()> {
        st.set_change_status(id, status)?;
        let pruned = st.prune_ready_changes(self.config.state.change_retention);
        if pruned > 0 {
            debug!("Pruned {} finished changes", pruned);
        }
        st.checkpoint()?;
        Ok(())
    }

    fn do_connect(
        &self,
        st: &mut StateGuard<'_>,
        conn: &ConnRef,
    ) -> Result<Vec<SecurityProfiles>> {
        let mut repo = self.repo.write();
        repo.sanitize_plug(&conn.plug)?;
        repo.sanitize_slot(&conn.slot)?;
        repo.connect(conn.clone(), ConnectionAttrs::default())?;

        let persisted = Self::rebuild_profiles(&repo, conn).and_then(|profiles| {
            let interface = repo
                .plug(&conn.plug)
                .map(|p| p.interface.clone())
                .unwrap_or_default();
            let mut conns = load_conns(st)?;
            conns.insert(
                conn.id(),
                ConnState {
                    interface,
                    ..ConnState::default()
                },
            );
            st.set(CONNS_KEY, &conns)?;
            Ok(profiles)
        });

        if persisted.is_err() {
            // Roll back so the repository matches the recorded state.
            if let Err(e) = repo.disconnect(conn) {
                warn!("Rollback of connect {} failed: {}", conn, e);
            }
        }
        persisted
    }

    /// Disconnects a plug from a slot through the gate.
    ///
    /// # Errors
    ///
    /// - a `"seed"` conflict if no device model is known
    /// - a change conflict if an in-flight change blocks either snap
    /// - `NotConnected` or a snippet error; the change is then left in `Error`
    /// - a storage error if the outcome cannot be written
    pub fn disconnect(&self, plug: &PlugRef, slot: &SlotRef) -> Result<ChangeOutcome> {
        self.disconnect_with_context(plug, slot, None)
    }

    /// Same as [`disconnect`](Self::disconnect) with a caller supplied device context.
    pub fn disconnect_with_context(
        &self,
        plug: &PlugRef,
        slot: &SlotRef,
        ctx: Option<Arc<dyn DeviceContext>>,
    ) -> Result<ChangeOutcome> {
        let conn = ConnRef::new(plug.clone(), slot.clone());
        debug!("Disconnect requested: {}", conn);

        let mut st = self.state.lock();
        self.resolver.device_ctx_from_state(&st, ctx)?;
        self.conflicts
            .check(&st, DISCONNECT_KIND, &[plug.snap.as_str(), slot.snap.as_str()], None)?;

        let id = st.new_change(
            DISCONNECT_KIND,
            &format!("Disconnect {plug} from {slot}"),
            [plug.snap.clone(), slot.snap.clone()],
        );
        st.set_change_status(&id, Status::Doing)?;

        match self.do_disconnect(&mut st, &conn) {
            Ok(profiles) => {
                self.finish_change(&mut st, &id, Status::Done)?;
                info!("Disconnected {} (change {})", conn, id);
                Ok(ChangeOutcome {
                    change_id: id,
                    kind: DISCONNECT_KIND.to_string(),
                    connection: conn,
                    profiles,
                })
            }
            Err(e) => {
                warn!("Disconnect {} failed (change {}): {}", conn, id, e);
                if let Err(finish) = self.finish_change(&mut st, &id, Status::Error) {
                    error!("Cannot record failure of change {}: {}", id, finish);
                }
                Err(e)
            }
        }
    }

    fn do_disconnect(
        &self,
        st: &mut StateGuard<'_>,
        conn: &ConnRef,
    ) -> Result<Vec<SecurityProfiles>> {
        let mut repo = self.repo.write();
        let attrs = repo.disconnect(conn)?;

        let persisted = Self::rebuild_profiles(&repo, conn).and_then(|profiles| {
            let mut conns = load_conns(st)?;
            if conns.remove(&conn.id()).is_some() {
                st.set(CONNS_KEY, &conns)?;
            }
            Ok(profiles)
        });

        if persisted.is_err() {
            if let Err(e) = repo.connect(conn.clone(), attrs) {
                warn!("Rollback of disconnect {} failed: {}", conn, e);
            }
        }
        persisted
    }

    fn rebuild_profiles(repo: &Repository, conn: &ConnRef) -> Result<Vec<SecurityProfiles>> {
        let mut profiles = vec![repo.security_profiles(&conn.plug.snap)?];
        if conn.slot.snap != conn.plug.snap {
            profiles.push(repo.security_profiles(&conn.slot.snap)?);
        }
        Ok(profiles)
    }

    /// Builds every backend's profile of one snap.
    pub fn profiles(&self, snap: &str) -> Result<SecurityProfiles> {
        let repo = self.repo.read();
        if !repo.has_snap(snap) {
            return Err(GuardError::UnknownSnap(snap.to_string()));
        }
        Ok(repo.security_profiles(snap)?)
    }

    /// Established connections, in order.
    pub fn connections(&self) -> Vec<ConnRef> {
        self.repo.read().connections()
    }

    /// Known snaps, sorted.
    pub fn snaps(&self) -> Vec<String> {
        self.repo
            .read()
            .snaps()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// The interface catalog.
    pub fn interfaces(&self) -> Vec<InterfaceSummary> {
        self.registry
            .interfaces()
            .map(|iface| {
                let info = iface.static_info();
                InterfaceSummary {
                    name: iface.name().to_string(),
                    summary: info.summary.to_string(),
                    implicit_on_core: info.implicit_on_core,
                    multiple_plugs: iface.allows_multiple_plugs(),
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for InterfaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceManager")
            .field("interfaces", &self.registry.len())
            .field("connections", &self.repo.read().connections().len())
            .finish()
    }
}
