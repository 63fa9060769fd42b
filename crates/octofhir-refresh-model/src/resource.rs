//! Order-preserving FHIR resource wrapper
//!
//! Resources are kept as the JSON object they were read from, so fields this
//! tooling never touches serialize back exactly as they were authored.

use crate::{Canonical, ResourceType};
use octofhir_refresh_diagnostics::{REF0201, RefreshError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// `(type, id)` identity of a resource; the deduplication key of every resource set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub resource_type: ResourceType,
    pub id: String,
}

impl ResourceKey {
    pub fn new(resource_type: ResourceType, id: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

/// A FHIR resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Resource {
    fields: Map<String, Value>,
}

impl Resource {
    /// Create an empty resource of the given type
    pub fn new(resource_type: ResourceType) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "resourceType".to_string(),
            Value::String(resource_type.to_string()),
        );
        Self { fields }
    }

    /// Wrap a JSON value; it must be an object with a string `resourceType`
    pub fn from_value(value: Value) -> Result<Self, RefreshError> {
        match value {
            Value::Object(fields) => match fields.get("resourceType") {
                Some(Value::String(t)) if !t.is_empty() => Ok(Self { fields }),
                _ => Err(RefreshError::io(REF0201, "Resource has no resourceType")),
            },
            _ => Err(RefreshError::io(REF0201, "Resource is not a JSON object")),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn resource_type(&self) -> ResourceType {
        self.str_field("resourceType")
            .map(ResourceType::from)
            .unwrap_or_else(|| ResourceType::Other(String::new()))
    }

    /// Non-empty logical id
    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.set("id", Value::String(id.into()));
    }

    pub fn url(&self) -> Option<&str> {
        self.str_field("url")
    }

    pub fn version(&self) -> Option<&str> {
        self.str_field("version")
    }

    pub fn name(&self) -> Option<&str> {
        self.str_field("name")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// `(type, id)` key, `None` while the resource has no id
    pub fn key(&self) -> Option<ResourceKey> {
        self.id()
            .map(|id| ResourceKey::new(self.resource_type(), id))
    }

    /// Relative reference `Type/id`
    pub fn reference(&self) -> Option<String> {
        self.key().map(|k| k.to_string())
    }

    /// Canonical url with the resource's version
    pub fn canonical(&self) -> Option<Canonical> {
        self.url()
            .map(|url| Canonical::new(url, self.version().map(str::to_string)))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a field, keeping its position when it already exists
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Items of an array field, empty when absent
    pub fn array(&self, key: &str) -> &[Value] {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// Canonicals of `relatedArtifact` entries typed `depends-on`
    ///
    /// Reads both the canonical-string form and the Reference/url forms used by
    /// older releases.
    pub fn depends_on(&self) -> Vec<Canonical> {
        self.array("relatedArtifact")
            .iter()
            .filter(|ra| ra.get("type").and_then(Value::as_str) == Some("depends-on"))
            .filter_map(|ra| {
                let target = match ra.get("resource") {
                    Some(Value::String(s)) => Some(s.as_str()),
                    Some(Value::Object(r)) => r.get("reference").and_then(Value::as_str),
                    _ => None,
                };
                target.or_else(|| ra.get("url").and_then(Value::as_str))
            })
            .map(Canonical::parse)
            .collect()
    }

    /// Libraries named by the `library` element of measures and plan definitions
    pub fn library_references(&self) -> Vec<Canonical> {
        self.array("library")
            .iter()
            .filter_map(|lib| match lib {
                Value::String(s) => Some(s.as_str()),
                Value::Object(r) => r.get("reference").and_then(Value::as_str),
                _ => None,
            })
            .map(Canonical::parse)
            .collect()
    }

    /// Value set canonicals bound by data requirement code filters
    pub fn code_filter_value_sets(&self) -> Vec<Canonical> {
        self.array("dataRequirement")
            .iter()
            .flat_map(|dr| {
                dr.get("codeFilter")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
            })
            .filter_map(|cf| {
                cf.get("valueSet")
                    .and_then(Value::as_str)
                    .or_else(|| cf.get("valueSetString").and_then(Value::as_str))
                    .or_else(|| {
                        cf.get("valueSetReference")
                            .and_then(|r| r.get("reference"))
                            .and_then(Value::as_str)
                    })
            })
            .map(Canonical::parse)
            .collect()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

impl TryFrom<Value> for Resource {
    type Error = RefreshError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        resource.into_value()
    }
}
