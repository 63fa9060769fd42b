//! Resource directory index
//!
//! Classifies resource files by parsed type. Each kind is scanned at most once
//! per index; later lookups return the memoized set even when called with
//! different directories.

use octofhir_refresh_model::{Encoding, ResourceStore, ResourceType};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

/// Sorted set of paths holding one kind of resource
pub type PathSet = Arc<BTreeSet<PathBuf>>;

/// Memoized kind -> path set mapping
pub struct ResourceIndex {
    store: Arc<dyn ResourceStore>,
    cells: Mutex<HashMap<ResourceType, Arc<OnceCell<PathSet>>>>,
    scans: AtomicUsize,
}

impl ResourceIndex {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            cells: Mutex::new(HashMap::new()),
            scans: AtomicUsize::new(0),
        }
    }

    /// Paths under `directories` whose parsed type is `kind`
    pub fn index_of(&self, kind: &ResourceType, directories: &[PathBuf]) -> PathSet {
        let cell = {
            let mut cells = self.cells.lock();
            Arc::clone(cells.entry(kind.clone()).or_default())
        };
        Arc::clone(cell.get_or_init(|| {
            self.scans.fetch_add(1, Ordering::Relaxed);
            Arc::new(self.scan(kind, directories))
        }))
    }

    /// Number of directory scans performed so far
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    fn scan(&self, kind: &ResourceType, directories: &[PathBuf]) -> BTreeSet<PathBuf> {
        let mut found = BTreeSet::new();
        for dir in directories {
            if !dir.is_dir() {
                log::debug!("no {} directory at {}", kind, dir.display());
                continue;
            }
            let files = WalkDir::new(dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        log::warn!("cannot walk {}: {}", dir.display(), e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| Encoding::from_path(entry.path()).is_some());

            for entry in files {
                let path = entry.path();
                match self.store.read(path) {
                    Ok(Some(resource)) if resource.resource_type() == *kind => {
                        found.insert(path.to_path_buf());
                    }
                    Ok(Some(resource)) => {
                        if looks_like(path, kind) {
                            log::warn!(
                                "skipping {}: expected {}, found {}",
                                path.display(),
                                kind,
                                resource.resource_type()
                            );
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        if looks_like(path, kind) {
                            log::warn!("skipping {}: {}", path.display(), e);
                        }
                    }
                }
            }
        }
        log::debug!("indexed {} {} file(s)", found.len(), kind);
        found
    }
}

/// Whether the path suggests it should hold `kind`
fn looks_like(path: &Path, kind: &ResourceType) -> bool {
    let folder = kind.folder_name();
    path.iter()
        .filter_map(|part| part.to_str())
        .any(|part| part.to_ascii_lowercase().contains(&folder))
}
