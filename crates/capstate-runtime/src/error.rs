//! Runtime layer errors.
//!
//! All errors implement [`ErrorCode`] for standardized handling.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`RepoError::Closed`] | `REPO_CLOSED` | No |
//! | [`RegistryError::NotRegistered`] | `REGISTRY_NOT_REGISTERED` | No |
//! | [`RegistryError::AlreadyRegistered`] | `REGISTRY_ALREADY_REGISTERED` | No |
//! | [`RegistryError::Repo`] | `REGISTRY_REPO_CLOSED` | No |
//!
//! Note that `request()` returning `false` is a normal outcome, not an
//! error; these types only cover misuse and teardown.

use capstate_types::{Capability, ErrorCode};
use thiserror::Error;

/// Permission repository error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    /// The repository was torn down while the caller awaited it.
    ///
    /// Raised to pending `observe()` / `request()` /
    /// `take_and_change_state()` callers on shutdown so they fail
    /// instead of hanging.
    #[error("permission repository closed")]
    Closed,
}

impl ErrorCode for RepoError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "REPO_CLOSED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Permission registry error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No manager builder was registered for this capability.
    ///
    /// Raised synchronously at the point of misuse; register a builder
    /// before requesting the repository.
    #[error("no manager builder registered for capability: {0}")]
    NotRegistered(Capability),

    /// A builder is already registered for this capability.
    ///
    /// The first registration wins and is never silently overwritten.
    #[error("manager builder already registered for capability: {0}")]
    AlreadyRegistered(Capability),

    /// The underlying repository failed.
    #[error("repository error for capability {capability}: {source}")]
    Repo {
        /// The capability whose repository failed.
        capability: Capability,
        /// The repository error.
        source: RepoError,
    },
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered(_) => "REGISTRY_NOT_REGISTERED",
            Self::AlreadyRegistered(_) => "REGISTRY_ALREADY_REGISTERED",
            Self::Repo { .. } => "REGISTRY_REPO_CLOSED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capstate_types::assert_error_codes;

    #[test]
    fn repo_error_codes_valid() {
        assert_error_codes(&[RepoError::Closed], "REPO_");
    }

    #[test]
    fn registry_error_codes_valid() {
        let variants = vec![
            RegistryError::NotRegistered(Capability::camera()),
            RegistryError::AlreadyRegistered(Capability::camera()),
            RegistryError::Repo {
                capability: Capability::camera(),
                source: RepoError::Closed,
            },
        ];
        assert_error_codes(&variants, "REGISTRY_");
    }

    #[test]
    fn none_recoverable() {
        assert!(!RepoError::Closed.is_recoverable());
        assert!(!RegistryError::NotRegistered(Capability::camera()).is_recoverable());
    }

    #[test]
    fn display_includes_capability() {
        let err = RegistryError::NotRegistered(Capability::camera());
        assert!(format!("{err}").contains("camera"));
    }
}
