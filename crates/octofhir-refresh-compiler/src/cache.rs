//! Compiled-unit cache
//!
//! One instance lives for one run and is shared by every worker. Failures are
//! cached as well, so a broken source is compiled once no matter how many
//! artifacts reach it.

use crate::{CompileFailure, CompiledUnit, LogicCompiler};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CachedResult = Result<Arc<CompiledUnit>, CompileFailure>;

/// Memoizes another compiler per canonical source path
pub struct CachingCompiler<C> {
    inner: C,
    cache: RwLock<HashMap<PathBuf, CachedResult>>,
}

impl<C: LogicCompiler> CachingCompiler<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Number of sources compiled so far
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    fn key(source: &Path) -> PathBuf {
        source
            .canonicalize()
            .unwrap_or_else(|_| source.to_path_buf())
    }
}

impl<C: LogicCompiler> LogicCompiler for CachingCompiler<C> {
    fn compile(&self, source: &Path, include_paths: &[PathBuf]) -> CachedResult {
        let key = Self::key(source);
        if let Some(cached) = self.cache.read().get(&key) {
            log::trace!("compiled unit cache hit for {}", source.display());
            return cached.clone();
        }

        let result = self.inner.compile(source, include_paths);
        self.cache.write().entry(key).or_insert(result).clone()
    }
}
