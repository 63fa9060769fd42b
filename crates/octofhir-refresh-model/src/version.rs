//! FHIR release selection

use octofhir_refresh_diagnostics::{REF0402, RefreshError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported FHIR releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FhirVersion {
    /// STU3 (3.0.x)
    Dstu3,
    /// R4 (4.0.x)
    #[default]
    R4,
    /// R5 (5.0.x)
    R5,
}

impl FhirVersion {
    /// Full version string written into generated resources
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dstu3 => "3.0.2",
            Self::R4 => "4.0.1",
            Self::R5 => "5.0.0",
        }
    }

    /// Code system for `Library.type`
    pub fn library_type_system(&self) -> &'static str {
        match self {
            Self::Dstu3 => "http://hl7.org/fhir/library-type",
            Self::R4 | Self::R5 => "http://terminology.hl7.org/CodeSystem/library-type",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FhirVersion {
    type Err = RefreshError;

    /// Accepts release labels (`r4`, `dstu3`, `stu3`, `r5`) and version numbers (`4.0.1`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "dstu3" | "stu3" | "r3" => return Ok(Self::Dstu3),
            "r4" => return Ok(Self::R4),
            "r5" => return Ok(Self::R5),
            _ => {}
        }
        match normalized.split('.').next() {
            Some("3") => Ok(Self::Dstu3),
            Some("4") => Ok(Self::R4),
            Some("5") => Ok(Self::R5),
            _ => Err(RefreshError::configuration(
                REF0402,
                format!("Unsupported FHIR version '{}'", s),
            )),
        }
    }
}
