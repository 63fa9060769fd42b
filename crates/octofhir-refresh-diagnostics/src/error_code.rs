//! Refresh error codes following a structured numbering system
//!
//! Error code ranges:
//! - REF0001-REF0099: Compilation errors (logic source)
//! - REF0100-REF0199: Lookup errors (unresolvable dependencies)
//! - REF0200-REF0299: I/O and resource store errors
//! - REF0300-REF0399: Publish errors (remote endpoint)
//! - REF0400-REF0499: Configuration errors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

/// Broad category an error code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Compilation,
    Lookup,
    Io,
    Publish,
    Configuration,
    Unknown,
}

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Category derived from the numeric range
    pub const fn category(&self) -> ErrorCategory {
        match self.0 {
            1..=99 => ErrorCategory::Compilation,
            100..=199 => ErrorCategory::Lookup,
            200..=299 => ErrorCategory::Io,
            300..=399 => ErrorCategory::Publish,
            400..=499 => ErrorCategory::Configuration,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Check if this is a compilation error (0001-0099)
    pub const fn is_compilation_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Compilation)
    }

    /// Check if this is a lookup error (0100-0199)
    pub const fn is_lookup_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Lookup)
    }

    /// Check if this is an I/O error (0200-0299)
    pub const fn is_io_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Io)
    }

    /// Check if this is a publish error (0300-0399)
    pub const fn is_publish_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Publish)
    }

    /// Check if this is a configuration error (0400-0499)
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "REF{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Compilation errors (0001-0099)
    map.insert(1, ErrorInfo::new("Logic source failed to compile"));
    map.insert(2, ErrorInfo::new("Missing library declaration")
        .with_help("Every logic source must start with `library <Name> version '<x>'`"));
    map.insert(3, ErrorInfo::new("Unterminated string literal"));
    map.insert(4, ErrorInfo::new("Unterminated quoted identifier"));
    map.insert(5, ErrorInfo::new("Invalid declaration"));
    map.insert(6, ErrorInfo::new("Included library not found on include path"));
    map.insert(7, ErrorInfo::new("Undefined valueset"));
    map.insert(8, ErrorInfo::new("Unbalanced retrieve brackets"));
    map.insert(9, ErrorInfo::new("Logic source unreadable"));

    // Lookup errors (0100-0199)
    map.insert(100, ErrorInfo::new("Dependency could not be resolved"));
    map.insert(101, ErrorInfo::new("Library dependency not found")
        .with_help("Check the library's canonical url, id and file name"));
    map.insert(102, ErrorInfo::new("Terminology dependency not found"));
    map.insert(103, ErrorInfo::new("Primary library not found"));
    map.insert(104, ErrorInfo::new("Logic source for library not found"));

    // I/O errors (0200-0299)
    map.insert(200, ErrorInfo::new("I/O error"));
    map.insert(201, ErrorInfo::new("Resource could not be parsed"));
    map.insert(202, ErrorInfo::new("Resource could not be serialized"));
    map.insert(203, ErrorInfo::new("Unsupported file encoding"));

    // Publish errors (0300-0399)
    map.insert(300, ErrorInfo::new("Publish request failed"));
    map.insert(301, ErrorInfo::new("Publish endpoint reported an error"));

    // Configuration errors (0400-0499)
    map.insert(400, ErrorInfo::new("Configuration error"));
    map.insert(401, ErrorInfo::new("Guide root not found"));
    map.insert(402, ErrorInfo::new("Unsupported FHIR version")
        .with_help("Supported versions are 3.0.x, 4.0.x and 5.0.x"));
    map.insert(403, ErrorInfo::new("Invalid id resolution precedence"));
    map.insert(404, ErrorInfo::new("Canonical base url unknown")
        .with_help("Set `canonical_base` or add an ImplementationGuide resource under input/"));
    map.insert(405, ErrorInfo::new("Configuration file could not be read"));

    map
});

// Compilation errors
pub const REF0001: ErrorCode = ErrorCode::new(1);
pub const REF0002: ErrorCode = ErrorCode::new(2);
pub const REF0003: ErrorCode = ErrorCode::new(3);
pub const REF0004: ErrorCode = ErrorCode::new(4);
pub const REF0005: ErrorCode = ErrorCode::new(5);
pub const REF0006: ErrorCode = ErrorCode::new(6);
pub const REF0007: ErrorCode = ErrorCode::new(7);
pub const REF0008: ErrorCode = ErrorCode::new(8);
pub const REF0009: ErrorCode = ErrorCode::new(9);

// Lookup errors
pub const REF0100: ErrorCode = ErrorCode::new(100);
pub const REF0101: ErrorCode = ErrorCode::new(101);
pub const REF0102: ErrorCode = ErrorCode::new(102);
pub const REF0103: ErrorCode = ErrorCode::new(103);
pub const REF0104: ErrorCode = ErrorCode::new(104);

// I/O errors
pub const REF0200: ErrorCode = ErrorCode::new(200);
pub const REF0201: ErrorCode = ErrorCode::new(201);
pub const REF0202: ErrorCode = ErrorCode::new(202);
pub const REF0203: ErrorCode = ErrorCode::new(203);

// Publish errors
pub const REF0300: ErrorCode = ErrorCode::new(300);
pub const REF0301: ErrorCode = ErrorCode::new(301);

// Configuration errors
pub const REF0400: ErrorCode = ErrorCode::new(400);
pub const REF0401: ErrorCode = ErrorCode::new(401);
pub const REF0402: ErrorCode = ErrorCode::new(402);
pub const REF0403: ErrorCode = ErrorCode::new(403);
pub const REF0404: ErrorCode = ErrorCode::new(404);
pub const REF0405: ErrorCode = ErrorCode::new(405);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(REF0001.to_string(), "REF0001");
        assert_eq!(REF0402.to_string(), "REF0402");
    }

    #[test]
    fn test_categories() {
        assert!(REF0006.is_compilation_error());
        assert!(REF0101.is_lookup_error());
        assert!(REF0201.is_io_error());
        assert!(REF0301.is_publish_error());
        assert!(REF0401.is_configuration_error());
        assert_eq!(ErrorCode::new(999).category(), ErrorCategory::Unknown);
    }

    #[test]
    fn test_info_lookup() {
        assert_eq!(REF0101.info().description, "Library dependency not found");
        assert!(REF0402.info().help.is_some());
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
    }
}
