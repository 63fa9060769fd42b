//! Canonical url references (`<url>[|<version>]`)

use crate::ResourceType;
use std::fmt;

/// A canonical reference, optionally pinned to a version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Canonical {
    pub url: String,
    pub version: Option<String>,
}

impl Canonical {
    pub fn new(url: impl Into<String>, version: Option<String>) -> Self {
        Self {
            url: url.into(),
            version: version.filter(|v| !v.is_empty()),
        }
    }

    /// Parse `url|version`; the version part is optional
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('|') {
            Some((url, version)) => Self::new(url.trim(), Some(version.trim().to_string())),
            None => Self::new(reference.trim(), None),
        }
    }

    /// Build `<base>/<Type>/<name>`
    pub fn for_artifact(base: &str, resource_type: &ResourceType, name: &str) -> Self {
        Self::new(
            format!("{}/{}/{}", base.trim_end_matches('/'), resource_type, name),
            None,
        )
    }

    pub fn with_version(mut self, version: Option<&str>) -> Self {
        self.version = version.filter(|v| !v.is_empty()).map(str::to_string);
        self
    }

    /// Last path segment, normally the artifact's id or name
    pub fn tail(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }

    /// Resource type encoded in the url (`.../Library/X` -> Library)
    pub fn resource_type(&self) -> Option<ResourceType> {
        let mut segments = self.url.rsplit('/');
        segments.next()?;
        let segment = segments.next()?;
        match ResourceType::from(segment) {
            ResourceType::Other(_) => None,
            known => Some(known),
        }
    }

    /// Everything before `/<Type>/<tail>`
    pub fn base(&self) -> Option<&str> {
        self.resource_type()?;
        let mut cut = self.url.len();
        for _ in 0..2 {
            cut = self.url[..cut].rfind('/')?;
        }
        Some(&self.url[..cut])
    }

    /// Url without version, for cache keys
    pub fn unversioned(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}|{}", self.url, version),
            None => f.write_str(&self.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versioned() {
        let c = Canonical::parse("http://example.org/fhir/Library/Common|1.2.0");
        assert_eq!(c.url, "http://example.org/fhir/Library/Common");
        assert_eq!(c.version.as_deref(), Some("1.2.0"));
        assert_eq!(c.tail(), "Common");
        assert_eq!(c.resource_type(), Some(ResourceType::Library));
        assert_eq!(c.base(), Some("http://example.org/fhir"));
        assert_eq!(c.to_string(), "http://example.org/fhir/Library/Common|1.2.0");
    }

    #[test]
    fn test_parse_plain() {
        let c = Canonical::parse("http://cts.nlm.nih.gov/fhir/ValueSet/2.16.840.1");
        assert_eq!(c.version, None);
        assert_eq!(c.resource_type(), Some(ResourceType::ValueSet));
        assert_eq!(c.tail(), "2.16.840.1");
    }

    #[test]
    fn test_unknown_type_segment() {
        let c = Canonical::parse("urn:oid:1.2.3");
        assert_eq!(c.resource_type(), None);
        assert_eq!(c.base(), None);
    }

    #[test]
    fn test_for_artifact() {
        let c = Canonical::for_artifact("http://example.org/fhir/", &ResourceType::Library, "A")
            .with_version(Some("1.0.0"));
        assert_eq!(c.to_string(), "http://example.org/fhir/Library/A|1.0.0");
    }
}
