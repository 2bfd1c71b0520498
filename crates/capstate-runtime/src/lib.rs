//! capstate runtime - lifecycle-bound permission repositories.
//!
//! This crate hosts the state machine from `capstate-core` inside a
//! cold, reference-counted container and exposes the registry facade
//! application code talks to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Permissions (facade)                     │
//! │   register(capability, builder)   get / request / clean         │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │ one per capability
//! ┌───────────────────────────▼─────────────────────────────────────┐
//! │                    PermissionStateRepo (actor)                  │
//! │                                                                 │
//! │  ┌──────────────────┐     ┌──────────────────────────────────┐  │
//! │  │ command_rx       │────►│ serialized transition loop       │  │
//! │  │ (attach/detach/  │     │ - ref-counted activation         │  │
//! │  │  request/fold)   │     │ - exit/entry actions around each │  │
//! │  └──────────────────┘     │   published state                │  │
//! │  ┌──────────────────┐     └───────────────┬──────────────────┘  │
//! │  │ manager events   │────► fold ──────────┤                     │
//! │  └──────────────────┘                     ▼                     │
//! │                            watch::Sender<PermissionState>       │
//! └─────────────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//!               observers: current() / next().await
//! ```
//!
//! # Cold Activation
//!
//! Attaching the first observer constructs the capability manager and
//! starts monitoring; detaching the last one stops monitoring and parks
//! the manager in `Deinitialized` for cheap reuse. Activation is
//! reference-counted, never re-entered per observer.

pub mod config;
pub mod error;
mod registry;
mod repo;

pub use config::MonitorConfig;
pub use error::{RegistryError, RepoError};
pub use registry::Permissions;
pub use repo::{PermissionStateRepo, RepoHandle, StateObserver};
