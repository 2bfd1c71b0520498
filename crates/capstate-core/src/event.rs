//! Permission events reported by the platform binding layer.
//!
//! Events are transient: the repository folds each one into a state
//! transition and does not retain it. Arrival order must be preserved
//! per capability (the emitter channel is FIFO).

use serde::{Deserialize, Serialize};

/// An asynchronous report of a capability's granted/denied status.
///
/// # Variants
///
/// | Event | Meaning |
/// |-------|---------|
/// | `Granted` | The capability is currently granted |
/// | `Denied { locked: false }` | Refused, but a fresh prompt may succeed |
/// | `Denied { locked: true }` | Refused and the platform will not prompt again |
///
/// # Example
///
/// ```
/// use capstate_core::PermissionEvent;
///
/// let event = PermissionEvent::denied_locked();
/// assert!(event.is_denied());
/// assert!(event.is_locked());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionEvent {
    /// The capability is currently granted.
    Granted,

    /// The capability is currently refused.
    Denied {
        /// `true` when the platform will not show a prompt again and the
        /// capability must be changed via system settings.
        locked: bool,
    },
}

impl PermissionEvent {
    /// Creates a `Granted` event.
    #[must_use]
    pub fn granted() -> Self {
        Self::Granted
    }

    /// Creates a requestable `Denied` event.
    #[must_use]
    pub fn denied() -> Self {
        Self::Denied { locked: false }
    }

    /// Creates a locked `Denied` event.
    #[must_use]
    pub fn denied_locked() -> Self {
        Self::Denied { locked: true }
    }

    /// Returns `true` for `Granted`.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Returns `true` for either `Denied` form.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Returns `true` for `Denied { locked: true }`.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Denied { locked: true })
    }
}

impl std::fmt::Display for PermissionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted => write!(f, "granted"),
            Self::Denied { locked: false } => write!(f, "denied"),
            Self::Denied { locked: true } => write!(f, "denied_locked"),
        }
    }
}
