//! # Device Context Resolver
//!
//! Decides whether the device is ready for a state-changing operation and
//! yields the device context the operation should run against.
//!
//! ## Readiness Rules
//!
//! | Operation | Supplied context | Requirements |
//! |-----------|------------------|--------------|
//! | [`DeviceResolver::device_past_seeding`] | yes | live `seeded` marker |
//! | [`DeviceResolver::device_past_seeding`] | no | live `seeded` marker and model |
//! | [`DeviceResolver::device_ctx_from_state`] | yes | none |
//! | [`DeviceResolver::device_ctx_from_state`] | no | live model |
//!
//! The seeded marker is always read from the live state, even when the
//! caller supplies its own context. A supplied context is handed back
//! unchanged. Failures are [`ChangeConflictError`]s of kind `"seed"`.
//!
//! Both operations are read-only.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ChangeConflictError, Result};
use crate::state::StateGuard;

/// State key of the seeded marker.
pub const SEEDED_KEY: &str = "seeded";

/// State key of the acknowledged model.
pub const MODEL_KEY: &str = "model";

/// Conflict kind reported while the device is not ready.
pub const SEED_CHANGE_KIND: &str = "seed";

const NOT_SEEDED: &str =
    "too early for operation, device not yet seeded or device model not acknowledged";
const NO_MODEL: &str = "too early for operation, device model not yet acknowledged";

/// Signed identity of the device: brand, model and the snaps it is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "brand-id")]
    pub brand_id: String,
    pub model: String,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub gadget: Option<String>,
    #[serde(default)]
    pub kernel: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
}

impl Model {
    pub fn new(brand_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand_id: brand_id.into(),
            model: model.into(),
            series: "16".to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn with_gadget(mut self, gadget: impl Into<String>) -> Self {
        self.gadget = Some(gadget.into());
        self
    }

    #[must_use]
    pub fn with_kernel(mut self, kernel: impl Into<String>) -> Self {
        self.kernel = Some(kernel.into());
        self
    }

    #[must_use]
    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    /// Model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.brand_id, self.model)
    }
}

/// The device an operation runs against.
pub trait DeviceContext: Send + Sync + fmt::Debug {
    fn model(&self) -> &Model;

    /// True when the context describes a device mid-remodel.
    fn for_remodeling(&self) -> bool {
        false
    }
}

/// A context that is just a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrivialDeviceContext {
    pub model: Model,
    pub remodeling: bool,
}

impl TrivialDeviceContext {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            remodeling: false,
        }
    }
}

impl DeviceContext for TrivialDeviceContext {
    fn model(&self) -> &Model {
        &self.model
    }

    fn for_remodeling(&self) -> bool {
        self.remodeling
    }
}

/// Where device readiness is read from.
pub trait DeviceStore: Send + Sync + fmt::Debug {
    /// Whether the device finished seeding. Absent counts as not seeded.
    fn seeded(&self, st: &StateGuard<'_>) -> Result<bool>;

    /// The acknowledged model, if any.
    fn model(&self, st: &StateGuard<'_>) -> Result<Option<Model>>;
}

/// Reads the `seeded` and `model` state keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateDeviceStore;

impl DeviceStore for StateDeviceStore {
    fn seeded(&self, st: &StateGuard<'_>) -> Result<bool> {
        Ok(st.get::<bool>(SEEDED_KEY)?.unwrap_or(false))
    }

    fn model(&self, st: &StateGuard<'_>) -> Result<Option<Model>> {
        st.get::<Model>(MODEL_KEY)
    }
}

/// Resolves device contexts against a [`DeviceStore`].
#[derive(Debug, Clone)]
pub struct DeviceResolver {
    store: Arc<dyn DeviceStore>,
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::new(Arc::new(StateDeviceStore))
    }
}

impl DeviceResolver {
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self { store }
    }

    /// Context for an operation that needs a seeded device.
    ///
    /// # Errors
    ///
    /// Returns a `"seed"` conflict if the device is not seeded, or if no
    /// context was supplied and no model is acknowledged.
    pub fn device_past_seeding(
        &self,
        st: &StateGuard<'_>,
        ctx: Option<Arc<dyn DeviceContext>>,
    ) -> Result<Arc<dyn DeviceContext>> {
        if !self.store.seeded(st)? {
            return Err(ChangeConflictError::new(NOT_SEEDED, SEED_CHANGE_KIND).into());
        }
        if let Some(ctx) = ctx {
            return Ok(ctx);
        }
        match self.store.model(st)? {
            Some(model) => Ok(Arc::new(TrivialDeviceContext::new(model))),
            None => Err(ChangeConflictError::new(NOT_SEEDED, SEED_CHANGE_KIND).into()),
        }
    }

    /// Context for an operation that only needs a known model.
    ///
    /// # Errors
    ///
    /// Returns a `"seed"` conflict if no context was supplied and no model
    /// is acknowledged.
    pub fn device_ctx_from_state(
        &self,
        st: &StateGuard<'_>,
        ctx: Option<Arc<dyn DeviceContext>>,
    ) -> Result<Arc<dyn DeviceContext>> {
        if let Some(ctx) = ctx {
            return Ok(ctx);
        }
        match self.store.model(st)? {
            Some(model) => Ok(Arc::new(TrivialDeviceContext::new(model))),
            None => Err(ChangeConflictError::new(NO_MODEL, SEED_CHANGE_KIND).into()),
        }
    }
}

/// [`DeviceResolver::device_past_seeding`] against the state keys.
pub fn device_past_seeding(
    st: &StateGuard<'_>,
    ctx: Option<Arc<dyn DeviceContext>>,
) -> Result<Arc<dyn DeviceContext>> {
    DeviceResolver::default().device_past_seeding(st, ctx)
}

/// [`DeviceResolver::device_ctx_from_state`] against the state keys.
pub fn device_ctx_from_state(
    st: &StateGuard<'_>,
    ctx: Option<Arc<dyn DeviceContext>>,
) -> Result<Arc<dyn DeviceContext>> {
    DeviceResolver::default().device_ctx_from_state(st, ctx)
}
