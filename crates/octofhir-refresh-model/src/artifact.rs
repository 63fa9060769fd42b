//! Release-neutral derived fields of a knowledge artifact
//!
//! These are the collections a refresh rebuilds from compiled logic. Each FHIR
//! release encodes them slightly differently; the encoding lives with the
//! release adapters, not here.

use crate::Canonical;
use std::fmt;

/// Kind of a `relatedArtifact` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelatedArtifactKind {
    DependsOn,
    ComposedOf,
    Documentation,
}

impl RelatedArtifactKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DependsOn => "depends-on",
            Self::ComposedOf => "composed-of",
            Self::Documentation => "documentation",
        }
    }
}

impl fmt::Display for RelatedArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A dependency reference to another artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedArtifact {
    pub kind: RelatedArtifactKind,
    pub display: Option<String>,
    pub resource: Canonical,
}

impl RelatedArtifact {
    pub fn depends_on(resource: Canonical, display: impl Into<String>) -> Self {
        Self {
            kind: RelatedArtifactKind::DependsOn,
            display: Some(display.into()),
            resource,
        }
    }
}

/// Code filter of a data requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFilter {
    pub path: String,
    pub value_set: Option<String>,
}

/// A data type the logic retrieves, optionally filtered by a value set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequirement {
    pub data_type: String,
    pub profile: Option<String>,
    pub code_filters: Vec<CodeFilter>,
}

/// Embedded library content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn text(content_type: impl Into<String>, text: &str) -> Self {
        Self {
            content_type: content_type.into(),
            data: text.as_bytes().to_vec(),
        }
    }
}

/// The three collections a refresh replaces wholesale
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedFields {
    pub related_artifacts: Vec<RelatedArtifact>,
    pub data_requirements: Vec<DataRequirement>,
    pub content: Vec<Attachment>,
}
