//! Resource types handled by the refresh tooling

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// FHIR resource type of a knowledge artifact or supporting resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ResourceType {
    /// Logic library
    Library,
    /// Quality measure
    Measure,
    /// Care-plan definition
    PlanDefinition,
    ValueSet,
    CodeSystem,
    /// Bundle (test scenarios, published packages)
    Bundle,
    ImplementationGuide,
    /// Any other resource, typically test fixture data
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Library => "Library",
            Self::Measure => "Measure",
            Self::PlanDefinition => "PlanDefinition",
            Self::ValueSet => "ValueSet",
            Self::CodeSystem => "CodeSystem",
            Self::Bundle => "Bundle",
            Self::ImplementationGuide => "ImplementationGuide",
            Self::Other(name) => name,
        }
    }

    /// Value sets and code systems
    pub fn is_terminology(&self) -> bool {
        matches!(self, Self::ValueSet | Self::CodeSystem)
    }

    /// Artifacts that carry logic and get refreshed from compiled output
    pub fn is_knowledge_artifact(&self) -> bool {
        matches!(self, Self::Library | Self::Measure | Self::PlanDefinition)
    }

    /// Lowercase folder name used by guide layouts (`input/resources/<folder>`)
    pub fn folder_name(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        match s {
            "Library" => Self::Library,
            "Measure" => Self::Measure,
            "PlanDefinition" => Self::PlanDefinition,
            "ValueSet" => Self::ValueSet,
            "CodeSystem" => Self::CodeSystem,
            "Bundle" => Self::Bundle,
            "ImplementationGuide" => Self::ImplementationGuide,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ResourceType> for String {
    fn from(t: ResourceType) -> Self {
        t.as_str().to_string()
    }
}

impl FromStr for ResourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}
