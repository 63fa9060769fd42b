//! Id resolution precedence
//!
//! A reference names its target by canonical url; guides on disk name the same
//! artifact by id, by file name, or by url, and these can disagree. Resolution
//! tries each strategy in a configured order and takes the first strategy that
//! matches anything. Within one strategy, catalog order (sorted by path) breaks
//! ties.

use crate::catalog::CatalogEntry;
use octofhir_refresh_diagnostics::{REF0403, RefreshError};
use octofhir_refresh_model::Canonical;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One way of matching a reference to a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdStrategy {
    /// `Resource.id` equals the reference's last segment
    ExactId,
    /// The file stem follows `[<type>-]<name>[-<version>]`
    FileName,
    /// `Resource.url` (and version, when pinned) equals the reference
    CanonicalUrl,
}

impl fmt::Display for IdStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExactId => "exact-id",
            Self::FileName => "file-name",
            Self::CanonicalUrl => "canonical-url",
        })
    }
}

/// Ordered, duplicate-free list of strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPrecedence(Vec<IdStrategy>);

impl IdPrecedence {
    pub fn new(strategies: Vec<IdStrategy>) -> Result<Self, RefreshError> {
        if strategies.is_empty() {
            return Err(RefreshError::configuration(
                REF0403,
                "id_precedence must name at least one strategy",
            ));
        }
        for (i, strategy) in strategies.iter().enumerate() {
            if strategies[..i].contains(strategy) {
                return Err(RefreshError::configuration(
                    REF0403,
                    format!("id_precedence lists {} more than once", strategy),
                ));
            }
        }
        Ok(Self(strategies))
    }

    pub fn strategies(&self) -> &[IdStrategy] {
        &self.0
    }
}

impl Default for IdPrecedence {
    fn default() -> Self {
        Self(vec![
            IdStrategy::ExactId,
            IdStrategy::FileName,
            IdStrategy::CanonicalUrl,
        ])
    }
}

/// Pick the entry `target` refers to
pub fn resolve_id<'a>(
    target: &Canonical,
    precedence: &IdPrecedence,
    entries: &'a [CatalogEntry],
) -> Option<&'a CatalogEntry> {
    let kind = target.resource_type();
    let kind = kind.as_ref();
    let candidates = || {
        entries
            .iter()
            .filter(move |entry| kind.is_none_or(|k| entry.resource.resource_type() == *k))
    };

    precedence
        .strategies()
        .iter()
        .find_map(|strategy| candidates().find(|entry| matches(*strategy, target, entry)))
}

fn matches(strategy: IdStrategy, target: &Canonical, entry: &CatalogEntry) -> bool {
    let name = target.tail();
    match strategy {
        IdStrategy::ExactId => match entry.resource.id() {
            Some(id) if id == name => true,
            Some(id) => target
                .version
                .as_deref()
                .is_some_and(|v| id == format!("{}-{}", name, v)),
            None => false,
        },
        IdStrategy::FileName => {
            let Some(stem) = entry.path.file_stem().and_then(|s| s.to_str()) else {
                return false;
            };
            let prefix = entry.resource.resource_type().folder_name();
            let mut accepted = vec![name.to_string(), format!("{}-{}", prefix, name)];
            if let Some(version) = target.version.as_deref() {
                accepted.push(format!("{}-{}", name, version));
                accepted.push(format!("{}-{}-{}", prefix, name, version));
            }
            accepted.iter().any(|a| a.eq_ignore_ascii_case(stem))
        }
        IdStrategy::CanonicalUrl => {
            entry.resource.url() == Some(target.url.as_str())
                && match (&target.version, entry.resource.version()) {
                    (Some(wanted), Some(found)) => wanted == found,
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        }
    }
}
