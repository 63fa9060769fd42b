//! Bundle shape used for deployable packages and test scenarios

use crate::{Resource, ResourceKey, ResourceType};
use octofhir_refresh_diagnostics::{REF0201, RefreshError};
use serde_json::{Map, Value, json};

/// `Bundle.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleType {
    Transaction,
    Collection,
    Other,
}

impl BundleType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::Collection => "collection",
            Self::Other => "other",
        }
    }

    fn from_code(code: &str) -> Self {
        match code {
            "transaction" => Self::Transaction,
            "collection" => Self::Collection,
            _ => Self::Other,
        }
    }
}

/// Transaction request of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    pub method: &'static str,
    pub url: String,
}

impl EntryRequest {
    /// Overwrite-by-reference request, so redeploying never duplicates data
    pub fn upsert(key: &ResourceKey) -> Self {
        Self {
            method: "PUT",
            url: key.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BundleEntry {
    pub resource: Resource,
    pub request: Option<EntryRequest>,
}

/// An ordered collection of resources with a synthetic id
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub id: String,
    pub bundle_type: BundleType,
    pub entries: Vec<BundleEntry>,
}

impl Bundle {
    pub fn new(id: impl Into<String>, bundle_type: BundleType) -> Self {
        Self {
            id: id.into(),
            bundle_type,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entries.iter().map(|e| &e.resource)
    }

    /// Keys of all entries in order
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.resources().filter_map(Resource::key).collect()
    }

    /// Render as a FHIR `Bundle` resource
    pub fn to_resource(&self) -> Resource {
        let mut bundle = Resource::new(ResourceType::Bundle);
        bundle.set_id(self.id.clone());
        bundle.set("type", Value::String(self.bundle_type.code().to_string()));
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|entry| {
                let mut obj = Map::new();
                obj.insert("resource".into(), entry.resource.to_value());
                if let Some(request) = &entry.request {
                    obj.insert(
                        "request".into(),
                        json!({ "method": request.method, "url": request.url }),
                    );
                }
                Value::Object(obj)
            })
            .collect();
        // FHIR forbids empty arrays
        if !entries.is_empty() {
            bundle.set("entry", Value::Array(entries));
        }
        bundle
    }

    /// Read a FHIR `Bundle` resource back
    pub fn from_resource(resource: &Resource) -> Result<Self, RefreshError> {
        if resource.resource_type() != ResourceType::Bundle {
            return Err(RefreshError::io(
                REF0201,
                format!("Expected a Bundle, found {}", resource.resource_type()),
            ));
        }
        let bundle_type = resource
            .get("type")
            .and_then(Value::as_str)
            .map(BundleType::from_code)
            .unwrap_or(BundleType::Other);
        let mut bundle = Self::new(resource.id().unwrap_or_default(), bundle_type);
        for entry in resource.array("entry") {
            let Some(inner) = entry.get("resource") else {
                continue;
            };
            let request = entry.get("request").and_then(|r| {
                let url = r.get("url").and_then(Value::as_str)?;
                let method = match r.get("method").and_then(Value::as_str)? {
                    "PUT" => "PUT",
                    "POST" => "POST",
                    "DELETE" => "DELETE",
                    _ => "GET",
                };
                Some(EntryRequest {
                    method,
                    url: url.to_string(),
                })
            });
            bundle.entries.push(BundleEntry {
                resource: Resource::from_value(inner.clone())?,
                request,
            });
        }
        Ok(bundle)
    }
}
