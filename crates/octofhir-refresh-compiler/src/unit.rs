//! Compiled unit produced from one logic source file

use octofhir_refresh_model::{DataRequirement, Encoding};
use std::fmt;
use std::path::PathBuf;

/// `library <name> version '<version>'`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryIdentifier {
    pub name: String,
    pub version: Option<String>,
}

impl fmt::Display for LibraryIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{} version '{}'", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

/// `using <model> version '<version>'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingRef {
    pub model: String,
    pub version: Option<String>,
}

/// `include <name> version '<version>' called <alias>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRef {
    pub name: String,
    pub version: Option<String>,
    pub alias: Option<String>,
    /// Logic source the include was found at, `None` for built-in libraries
    pub source_path: Option<PathBuf>,
}

impl IncludeRef {
    /// Local name used to qualify references into the included library
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A declared value set or code system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminologyRef {
    pub name: String,
    pub url: String,
    pub version: Option<String>,
}

/// One `[Type: path in "ValueSet"]` retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieve {
    pub data_type: String,
    pub code_path: Option<String>,
    /// Name the retrieve filtered on, as written
    pub terminology: Option<String>,
    /// Include alias qualifying `terminology`
    pub qualifier: Option<String>,
    /// Canonical url of the bound value set when the name resolved to one
    pub value_set: Option<String>,
}

/// A `define` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub name: String,
    pub context: Option<String>,
    pub private: bool,
    pub function: bool,
    pub retrieves: Vec<Retrieve>,
}

/// Everything a refresh needs from a compiled logic source
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledUnit {
    pub identifier: LibraryIdentifier,
    pub source_path: PathBuf,
    pub source: String,
    pub usings: Vec<UsingRef>,
    pub includes: Vec<IncludeRef>,
    pub parameters: Vec<String>,
    pub value_sets: Vec<TerminologyRef>,
    pub code_systems: Vec<TerminologyRef>,
    pub statements: Vec<Statement>,
    pub data_requirements: Vec<DataRequirement>,
    pub elm_json: String,
    pub elm_xml: String,
}

impl CompiledUnit {
    /// ELM serialization in the requested format
    pub fn elm(&self, format: Encoding) -> &str {
        match format {
            Encoding::Json => &self.elm_json,
            Encoding::Xml => &self.elm_xml,
        }
    }

    /// Urls of every referenced value set and code system, in declaration order
    pub fn terminology_urls(&self) -> impl Iterator<Item = &str> {
        self.value_sets
            .iter()
            .chain(self.code_systems.iter())
            .map(|t| t.url.as_str())
    }
}
