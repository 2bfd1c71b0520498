//! Permission state machine.
//!
//! [`PermissionState`] is a closed set of states tracking the
//! authorization status of one capability. Transition methods are pure:
//! they move payloads between variants and never perform I/O. Entry/exit
//! side effects (manager construction, monitoring start/stop) are the
//! repository's job.
//!
//! # State Machine
//!
//! ```text
//!                    attach (first observer)
//! ┌───────────────┐ ─────────────────────────► ┌──────────────┐
//! │ Uninitialized │                            │ Initializing │◄────┐
//! └───────────────┘                            └──────┬───────┘     │
//!                                 Granted ┌───────────┼───────────┐ │ attach
//!                                         ▼           ▼ Denied    ▼ │ (reuse
//!                                   ┌─────────┐ ┌───────────┐ ┌──────┴─────┐
//!                                   │ Allowed │ │ Denied.*  │ │Deinitialized│
//!                                   └────┬────┘ └─────┬─────┘ └────────────┘
//!                                        │            │             ▲
//!                                        └────────────┴─────────────┘
//!                                          detach (last observer)
//! ```
//!
//! # Transition Discipline
//!
//! Every method returns `Option<PermissionState>`. `None` is the explicit
//! identity transition: the trigger does not apply to the current variant
//! and the caller decides whether that is a no-op to absorb or a drop to
//! trace. No trigger is ever silently lost inside this module.

use crate::event::PermissionEvent;
use crate::manager::CapabilityManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// State of one capability's permission, as tracked by its repository.
///
/// # Monitored States
///
/// `Initializing`, `Allowed`, `DeniedRequestable` and `DeniedLocked` are
/// the monitored chain: each carries the live
/// [`CapabilityManager`] handle and the monitoring interval used to
/// create it. Exactly one manager instance exists per activation epoch
/// (from an `Initializing` entry to the next `Deinitialized`).
///
/// `Uninitialized` holds nothing; `Deinitialized` retains the manager
/// handle and interval so reactivation reuses the same instance instead
/// of constructing a new one, but that manager is not monitoring.
#[derive(Debug, Clone)]
pub enum PermissionState {
    /// No observer has ever attached.
    Uninitialized,

    /// At least one observer attached; status unknown yet. Transient.
    Initializing {
        /// Live manager for this activation epoch.
        manager: Arc<dyn CapabilityManager>,
        /// Polling interval the manager was started with.
        interval: Duration,
    },

    /// The capability is currently granted.
    Allowed {
        /// Live manager for this activation epoch.
        manager: Arc<dyn CapabilityManager>,
        /// Polling interval the manager was started with.
        interval: Duration,
    },

    /// Refused, but a fresh request may succeed.
    DeniedRequestable {
        /// Live manager for this activation epoch.
        manager: Arc<dyn CapabilityManager>,
        /// Polling interval the manager was started with.
        interval: Duration,
    },

    /// Refused and the platform will not prompt again.
    DeniedLocked {
        /// Live manager for this activation epoch.
        manager: Arc<dyn CapabilityManager>,
        /// Polling interval the manager was started with.
        interval: Duration,
    },

    /// Previously active, now has zero observers.
    ///
    /// Retains the manager handle and interval to cheaply resume.
    Deinitialized {
        /// Retained manager handle, not monitoring.
        manager: Arc<dyn CapabilityManager>,
        /// Interval to resume monitoring with.
        interval: Duration,
    },
}

/// Payload-free tag for a [`PermissionState`].
///
/// Observers and tests compare kinds when the manager handle identity is
/// irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// No observer has ever attached.
    Uninitialized,
    /// Activation in progress, status unknown.
    Initializing,
    /// Capability granted.
    Allowed,
    /// Capability refused, requestable.
    DeniedRequestable,
    /// Capability refused, locked behind system settings.
    DeniedLocked,
    /// Deactivated, resumable.
    Deinitialized,
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Allowed => write!(f, "allowed"),
            Self::DeniedRequestable => write!(f, "denied_requestable"),
            Self::DeniedLocked => write!(f, "denied_locked"),
            Self::Deinitialized => write!(f, "deinitialized"),
        }
    }
}

impl PermissionState {
    /// Returns the payload-free tag for this state.
    #[must_use]
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Uninitialized => StateKind::Uninitialized,
            Self::Initializing { .. } => StateKind::Initializing,
            Self::Allowed { .. } => StateKind::Allowed,
            Self::DeniedRequestable { .. } => StateKind::DeniedRequestable,
            Self::DeniedLocked { .. } => StateKind::DeniedLocked,
            Self::Deinitialized { .. } => StateKind::Deinitialized,
        }
    }

    /// Returns `true` for states whose manager is actively monitored.
    ///
    /// Monitored states: `Initializing`, `Allowed`, `DeniedRequestable`,
    /// `DeniedLocked`.
    #[must_use]
    pub fn is_monitored(&self) -> bool {
        matches!(
            self,
            Self::Initializing { .. }
                | Self::Allowed { .. }
                | Self::DeniedRequestable { .. }
                | Self::DeniedLocked { .. }
        )
    }

    /// Returns the manager handle, if this state carries one.
    ///
    /// Only `Uninitialized` carries none.
    #[must_use]
    pub fn manager(&self) -> Option<&Arc<dyn CapabilityManager>> {
        match self {
            Self::Uninitialized => None,
            Self::Initializing { manager, .. }
            | Self::Allowed { manager, .. }
            | Self::DeniedRequestable { manager, .. }
            | Self::DeniedLocked { manager, .. }
            | Self::Deinitialized { manager, .. } => Some(manager),
        }
    }

    /// Returns the monitoring interval, if this state carries one.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::Uninitialized => None,
            Self::Initializing { interval, .. }
            | Self::Allowed { interval, .. }
            | Self::DeniedRequestable { interval, .. }
            | Self::DeniedLocked { interval, .. }
            | Self::Deinitialized { interval, .. } => Some(*interval),
        }
    }

    /// `Uninitialized → Initializing` with a freshly constructed manager.
    ///
    /// Returns `None` from any other state.
    #[must_use]
    pub fn initialize(
        &self,
        manager: Arc<dyn CapabilityManager>,
        interval: Duration,
    ) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::Initializing { manager, interval }),
            _ => None,
        }
    }

    /// `Deinitialized → Initializing`, reusing the retained manager.
    ///
    /// The manager handle moves unchanged into the new epoch; it is not
    /// reconstructed. Returns `None` from any other state.
    #[must_use]
    pub fn reinitialize(&self) -> Option<Self> {
        match self {
            Self::Deinitialized { manager, interval } => Some(Self::Initializing {
                manager: Arc::clone(manager),
                interval: *interval,
            }),
            _ => None,
        }
    }

    /// `Initializing → Allowed / DeniedRequestable / DeniedLocked`.
    ///
    /// Resolves the initial status report. Returns `None` from any other
    /// state.
    #[must_use]
    pub fn initialized(&self, allowed: bool, locked: bool) -> Option<Self> {
        match self {
            Self::Initializing { manager, interval } => {
                let manager = Arc::clone(manager);
                let interval = *interval;
                Some(if allowed {
                    Self::Allowed { manager, interval }
                } else if locked {
                    Self::DeniedLocked { manager, interval }
                } else {
                    Self::DeniedRequestable { manager, interval }
                })
            }
            _ => None,
        }
    }

    /// Any monitored non-`Allowed` state → `Allowed`.
    ///
    /// Returns `None` when already `Allowed` (a repeated grant is
    /// absorbed as the identity transition) or when inactive.
    #[must_use]
    pub fn allow(&self) -> Option<Self> {
        match self {
            Self::Initializing { manager, interval }
            | Self::DeniedRequestable { manager, interval }
            | Self::DeniedLocked { manager, interval } => Some(Self::Allowed {
                manager: Arc::clone(manager),
                interval: *interval,
            }),
            _ => None,
        }
    }

    /// Records a denial.
    ///
    /// - `Initializing` / `Allowed` / `DeniedRequestable` →
    ///   `DeniedRequestable` or `DeniedLocked` depending on `locked`
    /// - `DeniedLocked` + `locked == false` → `DeniedRequestable`
    ///   (the platform signals the prompt is available again)
    ///
    /// Returns `None` for transitions that would not change the variant
    /// (`DeniedRequestable` + `locked == false`, `DeniedLocked` +
    /// `locked == true`) and from inactive states.
    #[must_use]
    pub fn deny(&self, locked: bool) -> Option<Self> {
        match self {
            Self::Initializing { manager, interval } | Self::Allowed { manager, interval } => {
                Some(Self::denied(Arc::clone(manager), *interval, locked))
            }
            Self::DeniedRequestable { manager, interval } if locked => Some(Self::DeniedLocked {
                manager: Arc::clone(manager),
                interval: *interval,
            }),
            Self::DeniedLocked { manager, interval } if !locked => Some(Self::DeniedRequestable {
                manager: Arc::clone(manager),
                interval: *interval,
            }),
            _ => None,
        }
    }

    /// Any monitored state → `Deinitialized`.
    ///
    /// The manager handle is retained for cheap reactivation. Returns
    /// `None` from inactive states.
    #[must_use]
    pub fn deinitialize(&self) -> Option<Self> {
        match self {
            Self::Initializing { manager, interval }
            | Self::Allowed { manager, interval }
            | Self::DeniedRequestable { manager, interval }
            | Self::DeniedLocked { manager, interval } => Some(Self::Deinitialized {
                manager: Arc::clone(manager),
                interval: *interval,
            }),
            _ => None,
        }
    }

    /// Folds one manager event into a transition.
    ///
    /// Total over all `(state, event)` pairs: `None` is the explicit
    /// identity, covering both absorbed no-ops (a grant while already
    /// `Allowed`) and events arriving while inactive, which are dropped
    /// without error per the delivery-timing tolerance policy.
    #[must_use]
    pub fn on_event(&self, event: &PermissionEvent) -> Option<Self> {
        match event {
            PermissionEvent::Granted => self.allow(),
            PermissionEvent::Denied { locked } => self.deny(*locked),
        }
    }

    fn denied(manager: Arc<dyn CapabilityManager>, interval: Duration, locked: bool) -> Self {
        if locked {
            Self::DeniedLocked { manager, interval }
        } else {
            Self::DeniedRequestable { manager, interval }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCapabilityManager;
    use crate::PermissionEventEmitter;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn mock() -> Arc<dyn CapabilityManager> {
        let (emitter, _rx) = PermissionEventEmitter::new();
        MockCapabilityManager::new(emitter)
    }

    fn initializing() -> PermissionState {
        PermissionState::Uninitialized
            .initialize(mock(), INTERVAL)
            .unwrap()
    }

    #[test]
    fn initialize_only_from_uninitialized() {
        let state = initializing();
        assert_eq!(state.kind(), StateKind::Initializing);
        assert!(state.initialize(mock(), INTERVAL).is_none());
    }

    #[test]
    fn initializing_resolves_by_report() {
        let state = initializing();

        let allowed = state.initialized(true, false).unwrap();
        assert_eq!(allowed.kind(), StateKind::Allowed);

        let requestable = state.initialized(false, false).unwrap();
        assert_eq!(requestable.kind(), StateKind::DeniedRequestable);

        let locked = state.initialized(false, true).unwrap();
        assert_eq!(locked.kind(), StateKind::DeniedLocked);
    }

    #[test]
    fn initialized_only_from_initializing() {
        let allowed = initializing().initialized(true, false).unwrap();
        assert!(allowed.initialized(true, false).is_none());
        assert!(PermissionState::Uninitialized
            .initialized(true, false)
            .is_none());
    }

    #[test]
    fn repeated_grant_is_identity() {
        let allowed = initializing().allow().unwrap();
        assert_eq!(allowed.kind(), StateKind::Allowed);
        assert!(allowed.allow().is_none());
        assert!(allowed.on_event(&PermissionEvent::granted()).is_none());
    }

    #[test]
    fn allowed_can_be_denied() {
        let allowed = initializing().allow().unwrap();

        let requestable = allowed.deny(false).unwrap();
        assert_eq!(requestable.kind(), StateKind::DeniedRequestable);

        let locked = allowed.deny(true).unwrap();
        assert_eq!(locked.kind(), StateKind::DeniedLocked);
    }

    #[test]
    fn requestable_lock_and_grant() {
        let requestable = initializing().deny(false).unwrap();

        let locked = requestable.deny(true).unwrap();
        assert_eq!(locked.kind(), StateKind::DeniedLocked);

        let allowed = requestable.allow().unwrap();
        assert_eq!(allowed.kind(), StateKind::Allowed);

        // Denied(locked=false) while requestable stays put.
        assert!(requestable.deny(false).is_none());
    }

    #[test]
    fn locked_unlocks_on_requestable_denial() {
        let locked = initializing().deny(true).unwrap();

        let unlocked = locked.deny(false).unwrap();
        assert_eq!(unlocked.kind(), StateKind::DeniedRequestable);

        // A repeated locked denial is identity.
        assert!(locked.deny(true).is_none());

        let allowed = locked.allow().unwrap();
        assert_eq!(allowed.kind(), StateKind::Allowed);
    }

    #[test]
    fn deinitialize_from_every_monitored_state() {
        let states = [
            initializing(),
            initializing().allow().unwrap(),
            initializing().deny(false).unwrap(),
            initializing().deny(true).unwrap(),
        ];
        for state in states {
            let deinit = state.deinitialize().unwrap();
            assert_eq!(deinit.kind(), StateKind::Deinitialized);
            assert!(!deinit.is_monitored());
        }

        assert!(PermissionState::Uninitialized.deinitialize().is_none());
    }

    #[test]
    fn reinitialize_reuses_manager_identity() {
        let active = initializing().allow().unwrap();
        let original = Arc::clone(active.manager().unwrap());

        let deinit = active.deinitialize().unwrap();
        let resumed = deinit.reinitialize().unwrap();

        assert_eq!(resumed.kind(), StateKind::Initializing);
        assert!(Arc::ptr_eq(resumed.manager().unwrap(), &original));
    }

    #[test]
    fn reinitialize_only_from_deinitialized() {
        assert!(PermissionState::Uninitialized.reinitialize().is_none());
        assert!(initializing().reinitialize().is_none());
    }

    #[test]
    fn events_dropped_while_inactive() {
        let deinit = initializing().deinitialize().unwrap();
        assert!(deinit.on_event(&PermissionEvent::granted()).is_none());
        assert!(deinit.on_event(&PermissionEvent::denied()).is_none());

        let uninit = PermissionState::Uninitialized;
        assert!(uninit.on_event(&PermissionEvent::granted()).is_none());
    }

    #[test]
    fn event_fold_matches_direct_transitions() {
        let state = initializing();

        let granted = state.on_event(&PermissionEvent::granted()).unwrap();
        assert_eq!(granted.kind(), StateKind::Allowed);

        let denied = state.on_event(&PermissionEvent::denied()).unwrap();
        assert_eq!(denied.kind(), StateKind::DeniedRequestable);

        let locked = state.on_event(&PermissionEvent::denied_locked()).unwrap();
        assert_eq!(locked.kind(), StateKind::DeniedLocked);
    }

    #[test]
    fn monitored_states_carry_payload() {
        let state = initializing();
        assert!(state.is_monitored());
        assert!(state.manager().is_some());
        assert_eq!(state.interval(), Some(INTERVAL));

        assert!(!PermissionState::Uninitialized.is_monitored());
        assert!(PermissionState::Uninitialized.manager().is_none());
        assert!(PermissionState::Uninitialized.interval().is_none());
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", StateKind::Allowed), "allowed");
        assert_eq!(
            format!("{}", StateKind::DeniedRequestable),
            "denied_requestable"
        );
    }
}
