//! capstate core - permission state machine and manager contract.
//!
//! This crate holds the platform-independent heart of the permission
//! framework. It has no I/O of its own: the state machine is pure data
//! plus transition functions, and the manager contract is the narrow
//! surface the platform binding layer implements.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  capstate-types : Capability, ErrorCode                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  capstate-core (THIS CRATE)                                 │
//! │    event.rs   : PermissionEvent (Granted/Denied)            │
//! │    state.rs   : PermissionState, StateKind, transitions     │
//! │    manager.rs : CapabilityManager, ManagerBuilder, emitter  │
//! │    monitor.rs : PollingMonitor (poll-based fallback)        │
//! │    testing.rs : MockCapabilityManager                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  capstate-runtime : PermissionStateRepo, Permissions        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Data Flow
//!
//! A platform manager emits [`PermissionEvent`]s through a
//! [`PermissionEventEmitter`]; the runtime repository folds them into
//! [`PermissionState`] transitions and drives
//! [`CapabilityManager::start_monitoring`] /
//! [`CapabilityManager::stop_monitoring`] as observers come and go.

mod event;
mod manager;
mod monitor;
mod state;

pub mod testing;

pub use event::PermissionEvent;
pub use manager::{CapabilityManager, ManagerBuilder, PermissionEventEmitter};
pub use monitor::{PollingMonitor, StatusCheck};
pub use state::{PermissionState, StateKind};
