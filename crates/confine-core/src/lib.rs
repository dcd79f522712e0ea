//! # Confine Core
//!
//! Gated interface connection management for confined snaps.
//! Ties the interface engine to the change-safety gate.
//!
//! ## Gate Coverage
//!
//! | Layer | Component | Rejects |
//! |-------|-----------|---------|
//! | Device | Device Context Resolver | Changes before seeding / model acknowledgement |
//! | Changes | Change-Conflict Detector | Overlap with remodels and same-snap changes |
//! | Endpoints | Sanitizer | Malformed or out-of-policy declarations |
//! | Profiles | Specification Builders | Connections whose rules cannot be computed |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        CONFINE CORE                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌──────────────────┐                         │
//! │                    │ InterfaceManager │                         │
//! │                    └────────┬─────────┘                         │
//! │                             │                                   │
//! │         ┌───────────────────┼───────────────────┐               │
//! │         ▼                   ▼                   ▼               │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────┐         │
//! │  │    State    │    │  Conflict   │    │  Repository  │         │
//! │  │  + devicectx│    │  Detector   │    │  + Registry  │         │
//! │  └─────────────┘    └─────────────┘    └──────────────┘         │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Notes
//!
//! - Checks run in order: device → conflicts → sanitize → build
//! - A change is recorded only after the device and conflict checks pass
//! - A failed profile build never leaves a connection behind
//! - Connection records persist under the `conns` state key

mod config;
mod error;
mod manager;
mod outcome;

pub use config::{ConfineConfig, GlobalConfig, InterfacesConfig, StateConfig};
pub use error::GuardError;
pub use manager::{ConnState, InterfaceManager, CONNS_KEY};
pub use outcome::{ChangeOutcome, InterfaceSummary};

/// Core result type for gated operations.
pub type Result<T> = std::result::Result<T, GuardError>;
