//! Read-only snapshot of loaded resources
//!
//! The orchestrator builds one library catalog after every synchronization has
//! finished writing, then shares it with all resolver workers.

use crate::resolve::{IdPrecedence, resolve_id};
use octofhir_refresh_model::{Canonical, Resource, ResourceKey, ResourceStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A resource and the file it was loaded from
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub resource: Arc<Resource>,
}

impl CatalogEntry {
    pub fn new(path: impl Into<PathBuf>, resource: Resource) -> Self {
        Self {
            path: path.into(),
            resource: Arc::new(resource),
        }
    }
}

/// Resources sorted by path, at most one per path
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let by_path: BTreeMap<PathBuf, CatalogEntry> = entries
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        Self {
            entries: by_path.into_values().collect(),
        }
    }

    /// Read every path; unreadable files are left out
    pub fn load<'a>(store: &dyn ResourceStore, paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let entries = paths.into_iter().filter_map(|path| match store.read(path) {
            Ok(Some(resource)) => Some(CatalogEntry::new(path, resource)),
            Ok(None) => None,
            Err(e) => {
                log::warn!("leaving {} out of the catalog: {}", path.display(), e);
                None
            }
        });
        Self::from_entries(entries)
    }

    /// Copy of this catalog with `updated` replacing entries at the same path
    pub fn with_overrides(&self, updated: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self::from_entries(self.entries.iter().cloned().chain(updated))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry a reference resolves to under `precedence`
    pub fn resolve(&self, target: &Canonical, precedence: &IdPrecedence) -> Option<&CatalogEntry> {
        resolve_id(target, precedence, &self.entries)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|entry| entry.resource.key().as_ref() == Some(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_refresh_model::ResourceType;

    fn library(id: &str) -> Resource {
        let mut r = Resource::new(ResourceType::Library);
        r.set_id(id);
        r
    }

    #[test]
    fn test_sorted_by_path() {
        let catalog = Catalog::from_entries([
            CatalogEntry::new("b.json", library("B")),
            CatalogEntry::new("a.json", library("A")),
        ]);
        let ids: Vec<_> = catalog.entries().iter().map(|e| e.resource.id()).collect();
        assert_eq!(ids, vec![Some("A"), Some("B")]);
    }

    #[test]
    fn test_overrides_replace_same_path() {
        let catalog = Catalog::from_entries([CatalogEntry::new("a.json", library("Old"))]);
        let updated = catalog.with_overrides([
            CatalogEntry::new("a.json", library("New")),
            CatalogEntry::new("c.json", library("C")),
        ]);
        assert_eq!(updated.len(), 2);
        assert!(updated.get(&ResourceKey::new(ResourceType::Library, "New")).is_some());
        assert!(updated.get(&ResourceKey::new(ResourceType::Library, "Old")).is_none());
        assert_eq!(catalog.len(), 1);
    }
}
