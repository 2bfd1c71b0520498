//! Capability manager contract and event emitter.
//!
//! The platform binding layer (the code that actually talks to the OS
//! about camera or location access) is consumed only through this narrow
//! surface: three outbound calls and one inbound event stream.
//!
//! # Contract
//!
//! - [`CapabilityManager::request_capability`] is fire-and-forget and
//!   must not block; it triggers whatever platform flow eventually leads
//!   to a [`PermissionEvent`].
//! - `start_monitoring` / `stop_monitoring` are idempotent.
//! - A manager that cannot start platform detection must immediately
//!   emit `Denied { locked: false }` instead of panicking, so the state
//!   machine still reaches a settled state.

use crate::event::PermissionEvent;
use capstate_types::Capability;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound interface to one capability's platform manager.
///
/// Implementations own the OS interaction. They report status changes
/// through the [`PermissionEventEmitter`] handed to their builder.
pub trait CapabilityManager: Send + Sync + std::fmt::Debug {
    /// Triggers the platform permission prompt. Fire-and-forget; must
    /// not block. The outcome arrives later as an event.
    fn request_capability(&self);

    /// Starts poll-based status detection at the given interval.
    ///
    /// Idempotent: calling while already monitoring must not create a
    /// second polling loop.
    fn start_monitoring(&self, interval: Duration);

    /// Stops poll-based status detection.
    ///
    /// Idempotent: a no-op while not monitoring.
    fn stop_monitoring(&self);
}

/// Factory for a capability's manager, registered with the permission
/// registry in `capstate-runtime`.
///
/// Invoked once per repository at first activation; the produced manager
/// is reused across deactivation/reactivation cycles. Builders must not
/// panic: when platform detection cannot be started, build a manager
/// that immediately emits `Denied { locked: false }`.
pub type ManagerBuilder =
    Arc<dyn Fn(&Capability, PermissionEventEmitter) -> Arc<dyn CapabilityManager> + Send + Sync>;

/// Fire-and-forget event channel from a manager to its repository.
///
/// Wraps an unbounded sender so platform callbacks are never made to
/// wait on the consumer. Events sent after the repository is gone are
/// dropped with a trace.
///
/// # Example
///
/// ```
/// use capstate_core::{PermissionEvent, PermissionEventEmitter};
///
/// let (emitter, mut rx) = PermissionEventEmitter::new();
/// emitter.grant();
/// emitter.deny(true);
///
/// assert_eq!(rx.try_recv().unwrap(), PermissionEvent::granted());
/// assert_eq!(rx.try_recv().unwrap(), PermissionEvent::denied_locked());
/// ```
#[derive(Debug, Clone)]
pub struct PermissionEventEmitter {
    tx: mpsc::UnboundedSender<PermissionEvent>,
}

impl PermissionEventEmitter {
    /// Creates an emitter and the receiving end of its event stream.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PermissionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emits `Granted`.
    pub fn grant(&self) {
        self.emit(PermissionEvent::Granted);
    }

    /// Emits `Denied` with the given lock flag.
    pub fn deny(&self, locked: bool) {
        self.emit(PermissionEvent::Denied { locked });
    }

    /// Emits an event. Never blocks; drops the event when the receiving
    /// repository has been torn down.
    pub fn emit(&self, event: PermissionEvent) {
        if self.tx.send(event).is_err() {
            debug!(%event, "permission event dropped: repository gone");
        }
    }
}
