//! Bundle assembly
//!
//! A package is built completely in memory first ([`BundlePackage`]) and only
//! then handed to the [`BundleWriter`], so no partially built bundle ever
//! reaches disk.

mod writer;

pub use writer::{BundleWriter, WrittenBundle, interaction_logs};

use crate::resource_set::{Member, ResourceSet, Role};
use crate::sync::slug;
use octofhir_refresh_model::{
    Bundle, BundleEntry, BundleType, EntryRequest, Resource, ResourceKey,
};
use std::path::PathBuf;
use uuid::Uuid;

/// Transaction bundle of `resources` with one upsert entry per resource
///
/// Resources without an id get `<bundle_id>-<uuid>`.
pub fn assemble(bundle_id: &str, resources: &ResourceSet) -> Bundle {
    assemble_resources(bundle_id, resources.iter().map(|m| m.resource.as_ref()))
}

pub fn assemble_resources<'a>(
    bundle_id: &str,
    resources: impl IntoIterator<Item = &'a Resource>,
) -> Bundle {
    let mut bundle = Bundle::new(bundle_id, BundleType::Transaction);
    for resource in resources {
        let mut resource = resource.clone();
        let id = match resource.id() {
            Some(id) => id.to_string(),
            None => {
                let id = format!("{}-{}", bundle_id, Uuid::new_v4());
                resource.set_id(id.clone());
                id
            }
        };
        let key = ResourceKey::new(resource.resource_type(), id);
        bundle.entries.push(BundleEntry {
            request: Some(EntryRequest::upsert(&key)),
            resource,
        });
    }
    bundle
}

/// A copied file: sidecar-relative destination and source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarCopy {
    pub destination: PathBuf,
    pub source: PathBuf,
}

/// Everything written for one artifact
#[derive(Debug, Clone)]
pub struct BundlePackage {
    /// Artifact name, the package directory name
    pub name: String,
    pub bundle: Bundle,
    pub focal: Resource,
    /// Primary library of a measure or plan definition
    pub library: Option<Resource>,
    pub terminology: Bundle,
    pub library_dependencies: Bundle,
    pub tests: Bundle,
    pub copies: Vec<SidecarCopy>,
}

impl BundlePackage {
    /// Assemble the main bundle and its sub-bundles from a closure
    ///
    /// `None` when the closure has no root.
    pub fn build(
        name: &str,
        closure: &ResourceSet,
        library: Option<&Resource>,
        library_dependencies: &[Member],
        copies: Vec<SidecarCopy>,
    ) -> Option<Self> {
        let id = slug(name);
        let bundle = assemble(&format!("{}-bundle", id), closure);
        // sub-bundles reuse the main bundle's entries so synthesized ids agree
        let bundled = |role: Role| {
            closure
                .iter()
                .zip(&bundle.entries)
                .filter(move |(member, _)| member.role == role)
                .map(|(_, entry)| &entry.resource)
        };

        let focal = bundled(Role::Root).next()?.clone();
        let terminology =
            assemble_resources(&format!("valuesets-{}-bundle", id), bundled(Role::Terminology));
        let tests = assemble_resources(&format!("tests-{}-bundle", id), bundled(Role::TestFixture));
        let library_dependencies = assemble_resources(
            &format!("library-deps-{}-bundle", id),
            library_dependencies.iter().map(|m| m.resource.as_ref()),
        );

        Some(Self {
            name: name.to_string(),
            bundle,
            focal,
            library: library.cloned(),
            terminology,
            library_dependencies,
            tests,
            copies,
        })
    }
}
