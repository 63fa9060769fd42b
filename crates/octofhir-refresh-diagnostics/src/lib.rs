//! Refresh diagnostics and error handling
//!
//! This crate provides the error infrastructure shared by the refresh workspace:
//! structured error codes, per-artifact error taxonomy, source locations for
//! compiler output, and diagnostic rendering.

mod error;
mod error_code;
mod span;

pub use error::*;
pub use error_code::*;
pub use span::*;

/// Result type for refresh operations
pub type Result<T> = std::result::Result<T, RefreshError>;
