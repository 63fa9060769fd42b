//! Directory conventions of an implementation guide

use octofhir_refresh_model::{Encoding, ResourceType};
use std::path::{Path, PathBuf};

/// Paths of a guide rooted at one directory
///
/// ```text
/// <root>/input/cql/                        logic sources
/// <root>/input/resources/<type>/           libraries, measures, plan definitions
/// <root>/input/vocabulary/                 value sets and code systems
/// <root>/input/tests/<Type>/<artifact>/    test fixtures
/// <root>/requests|responses/<artifact>/    interaction logs
/// <root>/bundles/<type>/<artifact>/        output packages
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideLayout {
    root: PathBuf,
}

impl GuideLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join("input")
    }

    pub fn cql_dir(&self) -> PathBuf {
        self.input_dir().join("cql")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.input_dir().join("resources")
    }

    pub fn vocabulary_dir(&self) -> PathBuf {
        self.input_dir().join("vocabulary")
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.input_dir().join("tests")
    }

    pub fn bundles_dir(&self) -> PathBuf {
        self.root.join("bundles")
    }

    /// Where resources of `kind` are authored
    pub fn resource_dir(&self, kind: &ResourceType) -> PathBuf {
        self.resources_dir().join(kind.folder_name())
    }

    /// Directories the index scans for `kind`
    pub fn directories_for(&self, kind: &ResourceType) -> Vec<PathBuf> {
        match kind {
            ResourceType::ValueSet | ResourceType::CodeSystem => vec![self.vocabulary_dir()],
            ResourceType::Bundle => vec![self.tests_dir()],
            other => vec![self.resource_dir(other)],
        }
    }

    /// Test fixtures of one artifact
    pub fn test_fixture_dir(&self, kind: &ResourceType, artifact: &str) -> PathBuf {
        self.tests_dir().join(kind.as_str()).join(artifact)
    }

    pub fn requests_dir(&self, artifact: &str) -> PathBuf {
        self.root.join("requests").join(artifact)
    }

    pub fn responses_dir(&self, artifact: &str) -> PathBuf {
        self.root.join("responses").join(artifact)
    }

    /// `<root>/bundles/<type>/<artifact>/`
    ///
    /// A measure and its primary library usually share a name, so the type
    /// keeps their packages apart.
    pub fn bundle_dir(&self, kind: &ResourceType, artifact: &str) -> PathBuf {
        self.bundles_dir().join(kind.folder_name()).join(artifact)
    }
}

/// `<id>[-<version>].<ext>`
///
/// The version suffix is only added for versioned output, and never twice.
pub fn output_file_name(
    id: &str,
    version: Option<&str>,
    versioned: bool,
    encoding: Encoding,
) -> String {
    match version {
        Some(version) if versioned && !version.is_empty() && !id.ends_with(version) => {
            format!("{}-{}.{}", id, version, encoding.extension())
        }
        _ => format!("{}.{}", id, encoding.extension()),
    }
}
