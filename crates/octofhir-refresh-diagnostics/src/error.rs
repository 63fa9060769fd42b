//! Refresh error types

use crate::{ErrorCategory, ErrorCode, SourceLocation, Span};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Error - compilation cannot proceed
    Error,
    /// Warning - potential issue but can continue
    Warning,
    /// Information - informational message
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A compiler message with location and context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Source file the message refers to
    pub file: Option<PathBuf>,
    /// Source location
    pub location: Option<SourceLocation>,
    /// Additional context or help
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            file: None,
            location: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the span (converts to location using provided source)
    pub fn with_span(mut self, span: Span, source: &str) -> Self {
        self.location = Some(SourceLocation::from_span(span, source));
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render with terminal colors
    #[cfg(feature = "colored")]
    pub fn render_colored(&self) -> String {
        use colored::Colorize;

        let severity = match self.severity {
            Severity::Error => self.severity.to_string().red().bold(),
            Severity::Warning => self.severity.to_string().yellow().bold(),
            Severity::Info => self.severity.to_string().blue().bold(),
        };
        let mut out = format!("{}[{}]: {}", severity, self.code, self.message);
        match (&self.file, &self.location) {
            (Some(file), Some(loc)) => {
                out.push_str(&format!("\n  --> {}:{}", file.display(), loc).cyan().to_string())
            }
            (Some(file), None) => out.push_str(&format!("\n  --> {}", file.display()).cyan().to_string()),
            (None, Some(loc)) => out.push_str(&format!("\n  --> {}", loc).cyan().to_string()),
            (None, None) => {}
        }
        if let Some(help) = self.help.as_deref().or(self.code.info().help) {
            out.push_str(&format!("\n  {} {}", "help:".green(), help));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        match (&self.file, &self.location) {
            (Some(file), Some(loc)) => write!(f, " at {}:{}", file.display(), loc)?,
            (Some(file), None) => write!(f, " in {}", file.display())?,
            (None, Some(loc)) => write!(f, " at {}", loc)?,
            (None, None) => {}
        }
        Ok(())
    }
}

/// Main refresh error type
///
/// Every per-artifact failure is one of these variants; the batch orchestrator
/// turns them into report dispositions instead of aborting the run.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    /// Logic source failed to compile
    #[error("{code}: {message}")]
    Compilation {
        code: ErrorCode,
        message: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// A declared dependency could not be resolved
    #[error("{code}: {message}")]
    Lookup {
        code: ErrorCode,
        message: String,
        reference: String,
        root: Option<String>,
    },

    /// Read or write failure
    #[error("{code}: {message}")]
    Io {
        code: ErrorCode,
        message: String,
        path: Option<PathBuf>,
    },

    /// Remote publish failure
    #[error("{code}: {message}")]
    Publish {
        code: ErrorCode,
        message: String,
        endpoint: Option<String>,
    },

    /// Configuration failure, aborts the whole run
    #[error("{code}: {message}")]
    Configuration {
        code: ErrorCode,
        message: String,
        context: Option<String>,
    },
}

impl RefreshError {
    /// Create a compilation error from the compiler's diagnostics
    pub fn compilation(
        code: ErrorCode,
        message: impl Into<String>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self::Compilation {
            code,
            message: message.into(),
            diagnostics,
        }
    }

    /// Create a lookup error for an unresolvable reference
    pub fn lookup(code: ErrorCode, message: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::Lookup {
            code,
            message: message.into(),
            reference: reference.into(),
            root: None,
        }
    }

    /// Create an I/O error without a path
    pub fn io(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Io {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Create an I/O error for a failed operation on `path`
    pub fn io_at(code: ErrorCode, path: &Path, source: impl fmt::Display) -> Self {
        Self::Io {
            code,
            message: format!("{}: {}", path.display(), source),
            path: Some(path.to_path_buf()),
        }
    }

    /// Create a publish error
    pub fn publish(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Publish {
            code,
            message: message.into(),
            endpoint: None,
        }
    }

    /// Create a configuration error
    pub fn configuration(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Configuration {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Tag a lookup error with the root artifact it was recorded against
    pub fn with_root(mut self, artifact: impl Into<String>) -> Self {
        if let Self::Lookup { root, .. } = &mut self {
            *root = Some(artifact.into());
        }
        self
    }

    /// Attach the endpoint a publish error was raised for
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        if let Self::Publish { endpoint, .. } = &mut self {
            *endpoint = Some(url.into());
        }
        self
    }

    /// Attach free-form context to a configuration error
    pub fn with_context(mut self, value: impl Into<String>) -> Self {
        if let Self::Configuration { context, .. } = &mut self {
            *context = Some(value.into());
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Compilation { code, .. }
            | Self::Lookup { code, .. }
            | Self::Io { code, .. }
            | Self::Publish { code, .. }
            | Self::Configuration { code, .. } => *code,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Compilation { message, .. }
            | Self::Lookup { message, .. }
            | Self::Io { message, .. }
            | Self::Publish { message, .. }
            | Self::Configuration { message, .. } => message,
        }
    }

    /// Compiler diagnostics, empty for non-compilation errors
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Compilation { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    /// Convert to a diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Compilation { diagnostics, code, message } => diagnostics
                .first()
                .cloned()
                .unwrap_or_else(|| Diagnostic::error(*code, message.clone())),
            Self::Lookup { code, message, root, .. } => {
                let diag = Diagnostic::error(*code, message.clone());
                match root {
                    Some(root) => diag.with_help(format!("required by {}", root)),
                    None => diag,
                }
            }
            Self::Io { code, message, path } => {
                let diag = Diagnostic::error(*code, message.clone());
                match path {
                    Some(path) => diag.with_file(path.clone()),
                    None => diag,
                }
            }
            Self::Publish { code, message, endpoint } => {
                let diag = Diagnostic::error(*code, message.clone());
                match endpoint {
                    Some(url) => diag.with_help(format!("endpoint: {}", url)),
                    None => diag,
                }
            }
            Self::Configuration { code, message, context } => {
                let diag = Diagnostic::error(*code, message.clone());
                match context {
                    Some(ctx) => diag.with_help(ctx.clone()),
                    None => diag,
                }
            }
        }
    }
}
