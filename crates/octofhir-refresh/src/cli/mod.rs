//! CLI functionality for the refresh tool
//!
//! This module contains all CLI-related functionality including:
//! - Refreshing and bundling a guide
//! - Compiling single logic sources to ELM
//! - Logging setup
//! - Output formatting

#[cfg(feature = "cli")]
pub mod compile;
#[cfg(feature = "cli")]
pub mod logging;
#[cfg(feature = "cli")]
pub mod output;
#[cfg(feature = "cli")]
pub mod refresh;
