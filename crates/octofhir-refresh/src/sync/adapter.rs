//! Per-release encoding of derived fields

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use octofhir_refresh_diagnostics::RefreshError;
use octofhir_refresh_model::{
    Attachment, CodeFilter, DataRequirement, DerivedFields, Encoding, FhirVersion,
    RelatedArtifact, Resource, ResourceStore, ResourceType,
};
use serde_json::{Map, Value, json};
use std::path::Path;
use std::sync::Arc;

/// What the synchronizer needs from a FHIR release
pub trait VersionAdapter: Send + Sync {
    fn fhir_version(&self) -> FhirVersion;

    /// Encode one dependency reference
    fn related_artifact(&self, artifact: &RelatedArtifact) -> Value;

    /// Encode one code filter
    fn code_filter(&self, filter: &CodeFilter) -> Value;

    /// Load the hand-authored resource at `path`, `None` when there is none
    fn read_existing(
        &self,
        store: &dyn ResourceStore,
        path: &Path,
    ) -> Result<Option<Resource>, RefreshError> {
        store.read(path)
    }

    /// Replace the derived collections of `resource`, leaving every other field alone
    ///
    /// Libraries carry all three collections; measures and plan definitions
    /// only carry `relatedArtifact`.
    fn merge_fields(&self, resource: &mut Resource, derived: &DerivedFields) {
        let related = derived
            .related_artifacts
            .iter()
            .map(|ra| self.related_artifact(ra))
            .collect();
        replace(resource, "relatedArtifact", related);

        if resource.resource_type() != ResourceType::Library {
            return;
        }
        let requirements = derived
            .data_requirements
            .iter()
            .map(|dr| self.data_requirement(dr))
            .collect();
        replace(resource, "dataRequirement", requirements);
        let content = derived.content.iter().map(attachment).collect();
        replace(resource, "content", content);
    }

    fn write_output(
        &self,
        store: &dyn ResourceStore,
        path: &Path,
        resource: &Resource,
        encoding: Encoding,
    ) -> Result<(), RefreshError> {
        store.write(path, resource, encoding)
    }

    fn data_requirement(&self, requirement: &DataRequirement) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(requirement.data_type.clone()));
        if let Some(profile) = &requirement.profile {
            obj.insert("profile".into(), json!([profile]));
        }
        if !requirement.code_filters.is_empty() {
            let filters = requirement
                .code_filters
                .iter()
                .map(|cf| self.code_filter(cf))
                .collect();
            obj.insert("codeFilter".into(), Value::Array(filters));
        }
        Value::Object(obj)
    }

    /// `Library.type` for logic libraries
    fn library_type(&self) -> Value {
        json!({
            "coding": [{
                "system": self.fhir_version().library_type_system(),
                "code": "logic-library"
            }]
        })
    }
}

/// STU3: references as `Reference` objects, code filters as `valueSetString`
#[derive(Debug, Clone, Copy, Default)]
pub struct Dstu3Adapter;

impl VersionAdapter for Dstu3Adapter {
    fn fhir_version(&self) -> FhirVersion {
        FhirVersion::Dstu3
    }

    fn related_artifact(&self, artifact: &RelatedArtifact) -> Value {
        let mut obj = related_artifact_head(artifact);
        obj.insert(
            "resource".into(),
            json!({ "reference": artifact.resource.to_string() }),
        );
        Value::Object(obj)
    }

    fn code_filter(&self, filter: &CodeFilter) -> Value {
        let mut obj = Map::new();
        obj.insert("path".into(), Value::String(filter.path.clone()));
        if let Some(vs) = &filter.value_set {
            obj.insert("valueSetString".into(), Value::String(vs.clone()));
        }
        Value::Object(obj)
    }
}

/// R4 and R5: canonical strings and `valueSet`
#[derive(Debug, Clone, Copy)]
pub struct CanonicalAdapter {
    version: FhirVersion,
}

impl CanonicalAdapter {
    pub fn new(version: FhirVersion) -> Self {
        Self { version }
    }
}

impl VersionAdapter for CanonicalAdapter {
    fn fhir_version(&self) -> FhirVersion {
        self.version
    }

    fn related_artifact(&self, artifact: &RelatedArtifact) -> Value {
        let mut obj = related_artifact_head(artifact);
        obj.insert(
            "resource".into(),
            Value::String(artifact.resource.to_string()),
        );
        Value::Object(obj)
    }

    fn code_filter(&self, filter: &CodeFilter) -> Value {
        let mut obj = Map::new();
        obj.insert("path".into(), Value::String(filter.path.clone()));
        if let Some(vs) = &filter.value_set {
            obj.insert("valueSet".into(), Value::String(vs.clone()));
        }
        Value::Object(obj)
    }
}

/// Adapter for the configured release
pub fn adapter_for(version: FhirVersion) -> Arc<dyn VersionAdapter> {
    match version {
        FhirVersion::Dstu3 => Arc::new(Dstu3Adapter),
        FhirVersion::R4 | FhirVersion::R5 => Arc::new(CanonicalAdapter::new(version)),
    }
}

fn related_artifact_head(artifact: &RelatedArtifact) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("type".into(), Value::String(artifact.kind.code().to_string()));
    if let Some(display) = &artifact.display {
        obj.insert("display".into(), Value::String(display.clone()));
    }
    obj
}

fn attachment(attachment: &Attachment) -> Value {
    json!({
        "contentType": attachment.content_type,
        "data": STANDARD.encode(&attachment.data)
    })
}

/// Set `key` to `items`, dropping the field when there are none
fn replace(resource: &mut Resource, key: &str, items: Vec<Value>) {
    if items.is_empty() {
        resource.remove(key);
    } else {
        resource.set(key, Value::Array(items));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_refresh_model::Canonical;
    use pretty_assertions::assert_eq;

    fn derived() -> DerivedFields {
        DerivedFields {
            related_artifacts: vec![RelatedArtifact::depends_on(
                Canonical::parse("http://x/Library/Common|2.0.0"),
                "Library Common",
            )],
            data_requirements: vec![DataRequirement {
                data_type: "Condition".into(),
                profile: None,
                code_filters: vec![CodeFilter {
                    path: "code".into(),
                    value_set: Some("http://vs/A".into()),
                }],
            }],
            content: vec![Attachment::text("text/cql", "library A")],
        }
    }

    #[test]
    fn test_r4_encoding() {
        let mut lib = Resource::new(ResourceType::Library);
        CanonicalAdapter::new(FhirVersion::R4).merge_fields(&mut lib, &derived());

        assert_eq!(
            lib.array("relatedArtifact")[0],
            json!({
                "type": "depends-on",
                "display": "Library Common",
                "resource": "http://x/Library/Common|2.0.0"
            })
        );
        assert_eq!(
            lib.array("dataRequirement")[0]["codeFilter"][0],
            json!({ "path": "code", "valueSet": "http://vs/A" })
        );
        assert_eq!(lib.array("content")[0]["data"], json!("bGlicmFyeSBB"));
    }

    #[test]
    fn test_stu3_encoding() {
        let mut lib = Resource::new(ResourceType::Library);
        let adapter = Dstu3Adapter;
        adapter.merge_fields(&mut lib, &derived());

        assert_eq!(
            lib.array("relatedArtifact")[0]["resource"],
            json!({ "reference": "http://x/Library/Common|2.0.0" })
        );
        assert_eq!(
            lib.array("dataRequirement")[0]["codeFilter"][0],
            json!({ "path": "code", "valueSetString": "http://vs/A" })
        );
        assert_eq!(
            adapter.library_type()["coding"][0]["system"],
            "http://hl7.org/fhir/library-type"
        );
        // read back through the model accessors
        assert_eq!(lib.code_filter_value_sets()[0].url, "http://vs/A");
        assert_eq!(lib.depends_on()[0].tail(), "Common");
    }

    #[test]
    fn test_measure_only_gets_related_artifacts() {
        let mut measure = Resource::from_value(json!({
            "resourceType": "Measure",
            "content": "untouched"
        }))
        .unwrap();
        adapter_for(FhirVersion::R5).merge_fields(&mut measure, &derived());
        assert_eq!(measure.array("relatedArtifact").len(), 1);
        assert!(!measure.contains("dataRequirement"));
        assert_eq!(measure.get("content"), Some(&json!("untouched")));
    }

    #[test]
    fn test_empty_collection_removes_field() {
        let mut lib = Resource::from_value(json!({
            "resourceType": "Library",
            "relatedArtifact": [ { "type": "depends-on", "resource": "http://old" } ]
        }))
        .unwrap();
        CanonicalAdapter::new(FhirVersion::R4).merge_fields(&mut lib, &DerivedFields::default());
        assert!(!lib.contains("relatedArtifact"));
    }
}
