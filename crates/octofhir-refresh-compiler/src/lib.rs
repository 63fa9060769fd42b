//! Logic compilation adapter
//!
//! Compiles CQL logic source into a [`CompiledUnit`]: the library identifier,
//! its includes, the data requirements its retrieves imply, the terminology it
//! declares, and ELM serializations in JSON and XML.
//!
//! The default [`CqlCompiler`] reads the declaration header of a library and
//! scans definition bodies for retrieves. It does not type-check expressions.

mod cache;
mod combinators;
mod compiler;
mod elm;
mod header;
mod retrieve;
mod source;
mod unit;

pub use cache::CachingCompiler;
pub use compiler::{CqlCompiler, compile_source};
pub use unit::*;

use octofhir_refresh_diagnostics::{Diagnostic, REF0001, RefreshError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turns one logic source file into a compiled unit
pub trait LogicCompiler: Send + Sync {
    /// Compile `source`, resolving includes against `include_paths`
    fn compile(
        &self,
        source: &Path,
        include_paths: &[PathBuf],
    ) -> Result<Arc<CompiledUnit>, CompileFailure>;
}

/// A failed compilation and the diagnostics that caused it
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} failed to compile with {} error(s)", path.display(), diagnostics.len())]
pub struct CompileFailure {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileFailure {
    pub fn new(path: impl Into<PathBuf>, diagnostics: Vec<Diagnostic>) -> Self {
        let path = path.into();
        let diagnostics = diagnostics
            .into_iter()
            .map(|d| match d.file {
                Some(_) => d,
                None => d.with_file(path.clone()),
            })
            .collect();
        Self { path, diagnostics }
    }
}

impl From<CompileFailure> for RefreshError {
    fn from(failure: CompileFailure) -> Self {
        let summary = failure
            .diagnostics
            .first()
            .map(|d| format!("{}: {}", failure, d.message))
            .unwrap_or_else(|| failure.to_string());
        RefreshError::compilation(REF0001, summary, failure.diagnostics)
    }
}
