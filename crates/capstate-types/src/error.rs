//! Unified error interface for capstate.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so callers
//! can branch on stable machine-readable codes and decide whether a retry
//! makes sense.
//!
//! # Example
//!
//! ```
//! use capstate_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     NotFound(String),
//!     Timeout,
//! }
//!
//! impl ErrorCode for MyError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::NotFound(_) => "MY_NOT_FOUND",
//!             Self::Timeout => "MY_TIMEOUT",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Timeout)
//!     }
//! }
//!
//! assert_eq!(MyError::Timeout.code(), "MY_TIMEOUT");
//! assert!(MyError::Timeout.is_recoverable());
//! ```

/// Unified error code interface.
///
/// # Code Format
///
/// Error codes should be:
///
/// - **UPPER_SNAKE_CASE**: e.g. `"REPO_CLOSED"`
/// - **Prefixed by domain**: e.g. `"REGISTRY_NOT_REGISTERED"`
/// - **Stable**: codes are an API contract and must not change
///
/// # Recoverability
///
/// An error is recoverable if retrying the operation may succeed or the
/// user can take corrective action. Invalid input and misconfiguration
/// are not recoverable.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether the error is recoverable.
    fn is_recoverable(&self) -> bool;
}

/// Validates that an error code follows capstate conventions.
///
/// # Checks
///
/// 1. Code is not empty
/// 2. Code starts with the expected prefix
/// 3. Code is UPPER_SNAKE_CASE
///
/// # Panics
///
/// Panics with a descriptive message if validation fails.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "error code must not be empty");

    assert!(
        code.starts_with(expected_prefix),
        "error code '{}' must start with prefix '{}'",
        code,
        expected_prefix
    );

    assert!(
        is_upper_snake_case(code),
        "error code '{}' must be UPPER_SNAKE_CASE",
        code
    );
}

/// Validates every variant of an error enum at once.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

/// Checks if a string is UPPER_SNAKE_CASE.
fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }

    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn error_code_trait() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn assert_all_variants() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn wrong_prefix_panics() {
        assert_error_code(&TestError::Transient, "WRONG_");
    }

    #[test]
    fn upper_snake_case_rules() {
        assert!(is_upper_snake_case("REPO_CLOSED"));
        assert!(is_upper_snake_case("A_B_2"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("repo_closed"));
        assert!(!is_upper_snake_case("_REPO"));
        assert!(!is_upper_snake_case("REPO__CLOSED"));
    }
}
