//! Fake implementations for testing
//!
//! Provides a compiler wrapper that records calls and can trip a cancellation
//! token, and a publisher that records bodies and fails on demand.

use async_trait::async_trait;
use octofhir_refresh::diagnostics::{REF0300, RefreshError};
use octofhir_refresh::model::Encoding;
use octofhir_refresh::publish::Publisher;
use octofhir_refresh_compiler::{CompileFailure, CompiledUnit, CqlCompiler, LogicCompiler};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Real CQL compiler that records every source it is asked to compile
pub struct FakeCompiler {
    inner: CqlCompiler,
    calls: Mutex<Vec<PathBuf>>,
    cancel_on_first: Option<CancellationToken>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self {
            inner: CqlCompiler::new(),
            calls: Mutex::new(Vec::new()),
            cancel_on_first: None,
        }
    }

    /// Cancel `token` as soon as the first compilation starts
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_first: Some(token),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }
}

impl Default for FakeCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicCompiler for FakeCompiler {
    fn compile(
        &self,
        source: &Path,
        include_paths: &[PathBuf],
    ) -> Result<Arc<CompiledUnit>, CompileFailure> {
        self.calls.lock().push(source.to_path_buf());
        if let Some(token) = &self.cancel_on_first {
            token.cancel();
        }
        self.inner.compile(source, include_paths)
    }
}

/// Publisher that keeps every body it receives
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Encoding)>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::failing(0)
    }

    /// Fail the first `failures` attempts
    pub fn failing(failures: usize) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
        }
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn endpoint(&self) -> &str {
        "memory://publisher"
    }

    async fn publish(&self, name: &str, body: &str, encoding: Encoding) -> Result<(), RefreshError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RefreshError::publish(REF0300, format!("{}: HTTP 503", name)));
        }
        self.published.lock().push((name.to_string(), encoding));
        Ok(())
    }
}
