//! # Confine State - Change-Safety Gating
//!
//! Lock-guarded daemon state and the two checks every security-relevant
//! change passes before it may start.
//!
//! ## Components
//!
//! | Component | Module | Purpose |
//! |-----------|--------|---------|
//! | State store | [`state`] | Keyed JSON values and changes behind one lock |
//! | Storage | [`storage`] | Sled checkpoints of the state store |
//! | Changes | [`change`] | Kinds, statuses, affected snaps |
//! | Device Context Resolver | [`devicectx`] | Seeding / model readiness |
//! | Change-Conflict Detector | [`conflict`] | Overlapping in-flight changes |
//!
//! ## Gate
//!
//! ```text
//!   request ──▶ state.lock() ──▶ device_past_seeding ──▶ ConflictDetector::check
//!                                      │                         │
//!                                 "seed" conflict          change conflict
//!                                      ▼                         ▼
//!                                   reject                    reject
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use confine_state::devicectx::{self, Model, MODEL_KEY, SEEDED_KEY};
//! use confine_state::{ConflictDetector, State};
//!
//! let state = State::new();
//! let mut st = state.lock();
//! assert!(devicectx::device_past_seeding(&st, None).is_err());
//!
//! st.set(SEEDED_KEY, &true).unwrap();
//! st.set(MODEL_KEY, &Model::new("my-brand", "my-model")).unwrap();
//! let ctx = devicectx::device_past_seeding(&st, None).unwrap();
//! assert_eq!(ctx.model().model(), "my-model");
//!
//! let detector = ConflictDetector::default();
//! st.new_change("remodel", "Remodel device", Vec::<String>::new());
//! let err = detector.check(&st, "connect", &["some-snap"], None).unwrap_err();
//! assert_eq!(err.change_kind, "remodel");
//! ```

pub mod change;
pub mod conflict;
pub mod devicectx;
pub mod error;
pub mod state;
pub mod storage;

pub use change::{Change, Status};
pub use conflict::{ConflictDetector, ConflictPolicy};
pub use devicectx::{
    DeviceContext, DeviceResolver, DeviceStore, Model, StateDeviceStore, TrivialDeviceContext,
};
pub use error::{ChangeConflictError, Result, StateError};
pub use state::{State, StateGuard};
pub use storage::{Snapshot, Storage};

#[cfg(test)]
mod tests;
