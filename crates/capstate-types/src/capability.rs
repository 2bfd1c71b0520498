//! Capability identifiers.
//!
//! A [`Capability`] names a protected system resource (camera, location,
//! ...) with a stable key. Identifiers are UUID-based so they stay
//! comparable across processes and serializable for diagnostics.

use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};

/// Namespace UUID for deterministic UUID v5 generation.
///
/// Well-known capabilities derive their id from this namespace so the
/// same name always yields the same id across processes and machines.
const CAPSTATE_NAMESPACE: Uuid = uuid!("7c9e4b1a-52d3-4f08-9b6e-2a81c5d0f437");

/// Identifier for a protected system capability.
///
/// A `Capability` is an opaque, equality-comparable key plus a
/// human-readable name. It is immutable: created by the caller, never
/// mutated, and used as the lookup key in the permission registry.
///
/// # UUID Strategy
///
/// - **Well-known capabilities**: UUID v5 (deterministic from name)
/// - **Ad-hoc capabilities**: UUID v4 (random per instance)
///
/// Two `Capability` values are equal only when both id and name match,
/// so two ad-hoc capabilities with the same name stay distinct.
///
/// # Example
///
/// ```
/// use capstate_types::Capability;
///
/// let cam1 = Capability::camera();
/// let cam2 = Capability::camera();
/// assert_eq!(cam1, cam2); // deterministic id
///
/// let custom1 = Capability::new("fleet-beacon");
/// let custom2 = Capability::new("fleet-beacon");
/// assert_ne!(custom1, custom2); // random ids
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    id: Uuid,
    name: String,
}

impl Capability {
    /// Creates an ad-hoc capability with a random UUID v4.
    ///
    /// Each call produces a distinct identity, even for the same name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Creates a well-known capability with a deterministic UUID v5.
    ///
    /// The id is derived from the capstate namespace and the name, so
    /// the same name always produces the same capability identity.
    ///
    /// # Example
    ///
    /// ```
    /// use capstate_types::Capability;
    ///
    /// let a = Capability::wellknown("camera");
    /// let b = Capability::wellknown("camera");
    /// assert_eq!(a, b);
    /// ```
    #[must_use]
    pub fn wellknown(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v5(&CAPSTATE_NAMESPACE, name.as_bytes()),
            name,
        }
    }

    /// The camera capability.
    #[must_use]
    pub fn camera() -> Self {
        Self::wellknown("camera")
    }

    /// The microphone capability.
    #[must_use]
    pub fn microphone() -> Self {
        Self::wellknown("microphone")
    }

    /// The location capability.
    #[must_use]
    pub fn location() -> Self {
        Self::wellknown("location")
    }

    /// The contacts capability.
    #[must_use]
    pub fn contacts() -> Self {
        Self::wellknown("contacts")
    }

    /// The storage capability.
    #[must_use]
    pub fn storage() -> Self {
        Self::wellknown("storage")
    }

    /// The notifications capability.
    #[must_use]
    pub fn notifications() -> Self {
        Self::wellknown("notifications")
    }

    /// The calendar capability.
    #[must_use]
    pub fn calendar() -> Self {
        Self::wellknown("calendar")
    }

    /// The bluetooth capability.
    #[must_use]
    pub fn bluetooth() -> Self {
        Self::wellknown("bluetooth")
    }

    /// Returns the stable identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wellknown_is_deterministic() {
        let a = Capability::wellknown("camera");
        let b = Capability::wellknown("camera");
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn wellknown_names_differ() {
        let cam = Capability::camera();
        let mic = Capability::microphone();
        assert_ne!(cam, mic);
        assert_ne!(cam.id(), mic.id());
    }

    #[test]
    fn adhoc_ids_are_unique() {
        let a = Capability::new("telemetry");
        let b = Capability::new("telemetry");
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn builtin_constructors_match_wellknown() {
        assert_eq!(Capability::camera(), Capability::wellknown("camera"));
        assert_eq!(Capability::location(), Capability::wellknown("location"));
        assert_eq!(Capability::bluetooth(), Capability::wellknown("bluetooth"));
    }

    #[test]
    fn display_uses_name() {
        let cap = Capability::camera();
        assert_eq!(format!("{cap}"), "camera");
    }

    #[test]
    fn serde_round_trip() {
        let cap = Capability::contacts();
        let json = serde_json::to_string(&cap).unwrap();
        let back: Capability = serde_json::from_str(&json).unwrap();
        assert_eq!(cap, back);
    }
}
