//! Shared types for the capstate permission framework.
//!
//! This crate is the bottom layer of the workspace. It defines:
//!
//! - [`Capability`]: stable identifier for a protected system resource
//! - [`ErrorCode`]: unified error code interface for all capstate errors
//!
//! Higher layers (`capstate-core`, `capstate-runtime`) depend on this
//! crate; it depends on nothing inside the workspace.

mod capability;
mod error;

pub use capability::Capability;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
