//! Package output on disk
//!
//! ```text
//! <root>/bundles/<type>/<name>/
//!     <name>-bundle.<ext>
//!     <name>-files/
//!         <type>-<id>[-<version>].<ext>      focal artifact, primary library
//!         valuesets-<name>-bundle.<ext>
//!         library-deps-<name>-bundle.<ext>
//!         tests-<name>-bundle.<ext>          only with fixtures
//!         requests/..., responses/...
//! ```
//!
//! Every file is rendered to memory, written under a staging directory and the
//! staging directory is renamed over the previous package.

use super::{BundlePackage, SidecarCopy};
use crate::layout::{GuideLayout, output_file_name};
use octofhir_refresh_diagnostics::{REF0200, RefreshError, Result};
use octofhir_refresh_model::{Bundle, Encoding, FileResourceStore, Resource};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

/// Result of writing one package
#[derive(Debug, Clone)]
pub struct WrittenBundle {
    pub dir: PathBuf,
    pub bundle_file: PathBuf,
    /// Serialized main bundle, as written
    pub body: String,
    pub encoding: Encoding,
}

#[derive(Debug, Clone)]
pub struct BundleWriter {
    layout: GuideLayout,
    encoding: Encoding,
    versioned: bool,
}

impl BundleWriter {
    pub fn new(layout: GuideLayout, encoding: Encoding, versioned: bool) -> Self {
        Self {
            layout,
            encoding,
            versioned,
        }
    }

    pub fn write(&self, package: &BundlePackage) -> Result<WrittenBundle> {
        let body = FileResourceStore::serialize(&package.bundle.to_resource(), self.encoding)?;
        let files = self.render(package, &body)?;

        let target = self
            .layout
            .bundle_dir(&package.focal.resource_type(), &package.name);
        let staging =
            target.with_file_name(format!(".staging-{}-{}", package.name, Uuid::new_v4()));

        if let Err(e) = write_tree(&staging, &files) {
            discard(&staging);
            return Err(e);
        }
        if let Err(e) = replace_dir(&staging, &target) {
            discard(&staging);
            return Err(e);
        }

        log::info!("wrote bundle {} ({} entries)", target.display(), package.bundle.len());
        Ok(WrittenBundle {
            bundle_file: target.join(self.bundle_file_name(&package.name)),
            dir: target,
            body,
            encoding: self.encoding,
        })
    }

    fn bundle_file_name(&self, name: &str) -> String {
        format!("{}-bundle.{}", name, self.encoding.extension())
    }

    /// Package-relative path and content of every file
    fn render(&self, package: &BundlePackage, body: &str) -> Result<Vec<(PathBuf, Vec<u8>)>> {
        let ext = self.encoding.extension();
        let name = &package.name;
        let sidecar = PathBuf::from(format!("{}-files", name));
        let mut files = Vec::new();

        files.push((
            PathBuf::from(self.bundle_file_name(name)),
            body.as_bytes().to_vec(),
        ));
        files.push((
            sidecar.join(self.resource_file_name(&package.focal)),
            self.serialize(&package.focal)?,
        ));
        if let Some(library) = &package.library {
            files.push((
                sidecar.join(self.resource_file_name(library)),
                self.serialize(library)?,
            ));
        }
        // terminology and library-deps are written even when empty
        let mut sub_bundles = vec![
            ("valuesets", &package.terminology),
            ("library-deps", &package.library_dependencies),
        ];
        if !package.tests.is_empty() {
            sub_bundles.push(("tests", &package.tests));
        }
        for (prefix, bundle) in sub_bundles {
            files.push((
                sidecar.join(format!("{}-{}-bundle.{}", prefix, name, ext)),
                self.serialize_bundle(bundle)?,
            ));
        }
        for copy in &package.copies {
            let bytes = fs::read(&copy.source)
                .map_err(|e| RefreshError::io_at(REF0200, &copy.source, e))?;
            files.push((sidecar.join(&copy.destination), bytes));
        }
        Ok(files)
    }

    /// `<type>-<id>[-<version>].<ext>`
    fn resource_file_name(&self, resource: &Resource) -> String {
        format!(
            "{}-{}",
            resource.resource_type().folder_name(),
            output_file_name(
                resource.id().unwrap_or("unnamed"),
                resource.version(),
                self.versioned,
                self.encoding,
            )
        )
    }

    fn serialize(&self, resource: &Resource) -> Result<Vec<u8>> {
        FileResourceStore::serialize(resource, self.encoding).map(String::into_bytes)
    }

    fn serialize_bundle(&self, bundle: &Bundle) -> Result<Vec<u8>> {
        self.serialize(&bundle.to_resource())
    }
}

/// Interaction logs of an artifact, copied under `requests/` and `responses/`
pub fn interaction_logs(layout: &GuideLayout, artifact: &str) -> Vec<SidecarCopy> {
    let mut copies = Vec::new();
    for (folder, dir) in [
        ("requests", layout.requests_dir(artifact)),
        ("responses", layout.responses_dir(artifact)),
    ] {
        if !dir.is_dir() {
            continue;
        }
        let files = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file());
        for entry in files {
            let Ok(relative) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            copies.push(SidecarCopy {
                destination: Path::new(folder).join(relative),
                source: entry.path().to_path_buf(),
            });
        }
    }
    copies
}

fn write_tree(root: &Path, files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    for (relative, bytes) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RefreshError::io_at(REF0200, parent, e))?;
        }
        fs::write(&path, bytes).map_err(|e| RefreshError::io_at(REF0200, &path, e))?;
    }
    Ok(())
}

fn replace_dir(staging: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_dir_all(target).map_err(|e| RefreshError::io_at(REF0200, target, e))?;
    }
    fs::rename(staging, target).map_err(|e| RefreshError::io_at(REF0200, target, e))
}

fn discard(staging: &Path) {
    if staging.exists() {
        if let Err(e) = fs::remove_dir_all(staging) {
            log::warn!("cannot remove staging directory {}: {}", staging.display(), e);
        }
    }
}
