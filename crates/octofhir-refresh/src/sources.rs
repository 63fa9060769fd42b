//! Logic source files of a guide

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every `.cql` file under a directory, sorted by path
#[derive(Debug, Clone, Default)]
pub struct LogicSources {
    files: Vec<PathBuf>,
    include_paths: Vec<PathBuf>,
}

impl LogicSources {
    pub fn scan(dir: &Path) -> Self {
        if !dir.is_dir() {
            log::debug!("no logic sources at {}", dir.display());
            return Self::default();
        }
        let files: Vec<PathBuf> = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("cql"))
            })
            .map(|entry| entry.into_path())
            .collect();

        let mut include_paths: Vec<PathBuf> = Vec::new();
        for parent in files.iter().filter_map(|f| f.parent()) {
            if !include_paths.iter().any(|p| p == parent) {
                include_paths.push(parent.to_path_buf());
            }
        }
        Self {
            files,
            include_paths,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Directories holding sources, for include resolution
    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    /// `<name>-<version>.cql` first, then `<name>.cql`
    pub fn find(&self, name: &str, version: Option<&str>) -> Option<&Path> {
        let stem_is = |wanted: &str| {
            self.files
                .iter()
                .find(|f| f.file_stem().and_then(|s| s.to_str()) == Some(wanted))
        };
        version
            .and_then(|v| stem_is(&format!("{}-{}", name, v)))
            .or_else(|| stem_is(name))
            .map(PathBuf::as_path)
    }
}
