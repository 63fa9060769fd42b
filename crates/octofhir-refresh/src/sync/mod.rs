//! Artifact synchronizer
//!
//! Merges compiled logic output into hand-authored definitional resources.
//! Only the derived collections (`relatedArtifact`, `dataRequirement`,
//! `content`) are replaced; every other field of an existing resource is kept
//! as authored. A resource is synthesized when none exists yet.

mod adapter;
mod narrative;
mod slug;

pub use adapter::{CanonicalAdapter, Dstu3Adapter, VersionAdapter, adapter_for};
pub use narrative::regenerate as regenerate_narrative;
pub use slug::{artifact_id, slug};

use octofhir_refresh_compiler::CompiledUnit;
use octofhir_refresh_model::{
    Attachment, Canonical, DerivedFields, Encoding, RelatedArtifact, Resource, ResourceType,
};
use serde_json::Value;
use std::sync::Arc;

/// Content type of the raw logic attachment
pub const CQL_CONTENT_TYPE: &str = "text/cql";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Append versions to synthesized ids and dependency references
    pub versioned: bool,
    /// Base of generated canonical urls, without trailing slash
    pub canonical_base: String,
    /// Which ELM serialization goes into `content`
    pub elm_format: Encoding,
}

/// Release-neutral synchronizer parameterized by a [`VersionAdapter`]
pub struct Synchronizer {
    adapter: Arc<dyn VersionAdapter>,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(adapter: Arc<dyn VersionAdapter>, options: SyncOptions) -> Self {
        Self { adapter, options }
    }

    pub fn adapter(&self) -> &dyn VersionAdapter {
        self.adapter.as_ref()
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Refresh (or synthesize) the library backing `unit`
    pub fn refresh(&self, existing: Option<Resource>, unit: &CompiledUnit) -> Resource {
        let mut resource = match existing {
            Some(resource) => resource,
            None => self.synthesize(unit),
        };
        self.adapter.merge_fields(&mut resource, &self.library_fields(unit));
        narrative::regenerate(&mut resource);
        resource
    }

    /// Refresh a measure or plan definition from its primary library
    ///
    /// `relatedArtifact` becomes: the primary library as the artifact names it,
    /// then the library's own dependencies.
    pub fn refresh_artifact(&self, existing: Resource, primary: &CompiledUnit) -> Resource {
        let mut resource = existing;
        let identifier = &primary.identifier;
        let primary_ref = resource
            .library_references()
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                self.library_canonical(&identifier.name, identifier.version.as_deref())
            });

        let mut fields = DerivedFields::default();
        fields.related_artifacts.push(RelatedArtifact::depends_on(
            primary_ref,
            format!("Library {}", identifier.name),
        ));
        fields.related_artifacts.extend(self.dependencies(primary));

        self.adapter.merge_fields(&mut resource, &fields);
        narrative::regenerate(&mut resource);
        resource
    }

    /// Derived collections of the library compiled into `unit`
    pub fn library_fields(&self, unit: &CompiledUnit) -> DerivedFields {
        let format = self.options.elm_format;
        DerivedFields {
            related_artifacts: self.dependencies(unit),
            data_requirements: unit.data_requirements.clone(),
            content: vec![
                Attachment::text(CQL_CONTENT_TYPE, &unit.source),
                Attachment::text(format.elm_content_type(), unit.elm(format)),
            ],
        }
    }

    /// Included libraries, value sets and code systems as depends-on references
    fn dependencies(&self, unit: &CompiledUnit) -> Vec<RelatedArtifact> {
        let mut related: Vec<RelatedArtifact> = Vec::new();
        let mut push = |artifact: RelatedArtifact| {
            if !related.iter().any(|r| r.resource == artifact.resource) {
                related.push(artifact);
            }
        };

        for include in &unit.includes {
            push(RelatedArtifact::depends_on(
                self.library_canonical(&include.name, include.version.as_deref()),
                format!("Library {}", include.name),
            ));
        }
        for vs in &unit.value_sets {
            push(RelatedArtifact::depends_on(
                Canonical::new(vs.url.clone(), vs.version.clone()),
                format!("Value set {}", vs.name),
            ));
        }
        for cs in &unit.code_systems {
            push(RelatedArtifact::depends_on(
                Canonical::new(cs.url.clone(), cs.version.clone()),
                format!("Code system {}", cs.name),
            ));
        }
        related
    }

    fn library_canonical(&self, name: &str, version: Option<&str>) -> Canonical {
        let canonical =
            Canonical::for_artifact(&self.options.canonical_base, &ResourceType::Library, name);
        if self.options.versioned {
            canonical.with_version(version)
        } else {
            canonical
        }
    }

    fn synthesize(&self, unit: &CompiledUnit) -> Resource {
        let name = &unit.identifier.name;
        let version = unit.identifier.version.as_deref();
        log::info!("no Library resource for {}, creating one", unit.identifier);

        let mut resource = Resource::new(ResourceType::Library);
        resource.set_id(artifact_id(name, version, self.options.versioned));
        resource.set("url", Value::String(self.library_canonical(name, None).url));
        if let Some(version) = version {
            resource.set("version", Value::String(version.to_string()));
        }
        resource.set("name", Value::String(name.clone()));
        resource.set("status", Value::String("active".into()));
        resource.set("experimental", Value::Bool(true));
        resource.set("type", self.adapter.library_type());
        resource
    }
}
