//! Terminology cache keyed by canonical url

use octofhir_refresh_model::{Canonical, Resource, ResourceStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Value sets and code systems by url
///
/// Built once before any worker starts and never mutated afterwards. When two
/// files declare the same url, the first one loaded wins.
#[derive(Debug, Default)]
pub struct TerminologyCache {
    by_url: HashMap<String, (PathBuf, Arc<Resource>)>,
}

impl TerminologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every path in order
    pub fn load<'a>(store: &dyn ResourceStore, paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let mut cache = Self::new();
        for path in paths {
            match store.read(path) {
                Ok(Some(resource)) => cache.insert(path, resource),
                Ok(None) => {}
                Err(e) => log::warn!("terminology file {} skipped: {}", path.display(), e),
            }
        }
        log::debug!("terminology cache holds {} url(s)", cache.len());
        cache
    }

    /// Add a resource unless its url is already cached
    pub fn insert(&mut self, path: &Path, resource: Resource) {
        let Some(url) = resource.url().map(str::to_string) else {
            log::debug!("terminology file {} has no url", path.display());
            return;
        };
        match self.by_url.get(&url) {
            Some((first, _)) => log::warn!(
                "{} declares {} already loaded from {}; keeping the first",
                path.display(),
                url,
                first.display()
            ),
            None => {
                self.by_url.insert(url, (path.to_path_buf(), Arc::new(resource)));
            }
        }
    }

    /// Look a reference up by url, ignoring any version pin
    pub fn get(&self, reference: &Canonical) -> Option<&Arc<Resource>> {
        self.by_url.get(reference.unversioned()).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}
