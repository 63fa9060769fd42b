//! Run configuration
//!
//! [`RefreshConfig`] is what users write (`refresh.toml` or CLI flags);
//! [`RefreshSettings`] is the validated form every component reads. Any
//! validation failure is a configuration error and stops the run before any
//! artifact is touched.

use crate::layout::GuideLayout;
use crate::resolve::{IdPrecedence, IdStrategy};
use octofhir_refresh_diagnostics::{REF0400, REF0401, REF0404, REF0405, RefreshError, Result};
use octofhir_refresh_model::{
    Canonical, Encoding, FhirVersion, ResourceStore, ResourceType,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Raw, user-facing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    /// Guide root directory
    pub root: PathBuf,
    /// Encoding of written resources and bundles
    pub encoding: Encoding,
    /// Encoding of the compiled ELM attachment
    pub elm_format: Encoding,
    pub include_terminology: bool,
    /// Follow library dependencies transitively in the primary bundle
    pub include_dependencies: bool,
    pub include_tests: bool,
    /// Append versions to generated ids and file names
    pub versioned: bool,
    pub fhir_version: String,
    /// Base of generated canonical urls; derived from the ImplementationGuide when unset
    pub canonical_base: Option<String>,
    /// FHIR server endpoint bundles are POSTed to
    pub publish_url: Option<String>,
    /// Worker count, defaults to available parallelism
    pub jobs: Option<usize>,
    /// Stop dispatching new artifacts after this many seconds
    pub timeout_secs: Option<u64>,
    pub id_precedence: Vec<IdStrategy>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            encoding: Encoding::Json,
            elm_format: Encoding::Json,
            include_terminology: true,
            include_dependencies: false,
            include_tests: false,
            versioned: false,
            fhir_version: FhirVersion::R4.as_str().to_string(),
            canonical_base: None,
            publish_url: None,
            jobs: None,
            timeout_secs: None,
            id_precedence: IdPrecedence::default().strategies().to_vec(),
        }
    }
}

impl RefreshConfig {
    /// File looked for in the guide root
    pub const FILE_NAME: &'static str = "refresh.toml";

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            RefreshError::configuration(REF0405, format!("Invalid configuration: {}", e))
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            RefreshError::configuration(REF0405, format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text).map_err(|e| e.with_context(path.display().to_string()))
    }

    /// `<root>/refresh.toml` when present, defaults rooted at `root` otherwise
    pub fn discover(root: &Path) -> Result<Self> {
        let path = root.join(Self::FILE_NAME);
        if path.is_file() {
            log::debug!("loading configuration from {}", path.display());
            let mut config = Self::load(&path)?;
            if config.root.is_relative() {
                config.root = root.join(&config.root);
            }
            Ok(config)
        } else {
            Ok(Self {
                root: root.to_path_buf(),
                ..Self::default()
            })
        }
    }

    /// Check every setting and resolve derived values
    pub fn validate(&self, store: &dyn ResourceStore) -> Result<RefreshSettings> {
        if !self.root.is_dir() {
            return Err(RefreshError::configuration(
                REF0401,
                format!("Guide root {} is not a directory", self.root.display()),
            ));
        }
        let layout = GuideLayout::new(&self.root);
        let fhir_version: FhirVersion = self.fhir_version.parse()?;
        let id_precedence = IdPrecedence::new(self.id_precedence.clone())?;

        let jobs = match self.jobs {
            Some(0) => {
                return Err(RefreshError::configuration(REF0400, "jobs must be at least 1"));
            }
            Some(n) => n,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };

        let canonical_base = match &self.canonical_base {
            Some(base) if !base.trim().is_empty() => base.trim().trim_end_matches('/').to_string(),
            _ => canonical_base_from_guide(store, &layout.input_dir()).ok_or_else(|| {
                RefreshError::configuration(
                    REF0404,
                    format!(
                        "No canonical_base configured and no ImplementationGuide under {}",
                        layout.input_dir().display()
                    ),
                )
            })?,
        };

        Ok(RefreshSettings {
            layout,
            encoding: self.encoding,
            elm_format: self.elm_format,
            include_terminology: self.include_terminology,
            include_dependencies: self.include_dependencies,
            include_tests: self.include_tests,
            versioned: self.versioned,
            fhir_version,
            canonical_base,
            publish_url: self.publish_url.clone().filter(|u| !u.trim().is_empty()),
            jobs,
            timeout: self.timeout_secs.map(Duration::from_secs),
            id_precedence,
        })
    }
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub layout: GuideLayout,
    pub encoding: Encoding,
    pub elm_format: Encoding,
    pub include_terminology: bool,
    pub include_dependencies: bool,
    pub include_tests: bool,
    pub versioned: bool,
    pub fhir_version: FhirVersion,
    pub canonical_base: String,
    pub publish_url: Option<String>,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    pub id_precedence: IdPrecedence,
}

/// Base url of the first ImplementationGuide directly under `input`
fn canonical_base_from_guide(store: &dyn ResourceStore, input: &Path) -> Option<String> {
    WalkDir::new(input)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| Encoding::from_path(entry.path()).is_some())
        .filter_map(|entry| store.read(entry.path()).ok().flatten())
        .filter(|resource| resource.resource_type() == ResourceType::ImplementationGuide)
        .find_map(|guide| {
            let url = Canonical::parse(guide.url()?);
            url.base().map(str::to_string)
        })
}
