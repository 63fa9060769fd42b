//! Breadth-first dependency closure

use crate::catalog::Catalog;
use crate::layout::GuideLayout;
use crate::resolve::IdPrecedence;
use crate::resource_set::{Member, ResourceSet, Role};
use crate::terminology::TerminologyCache;
use octofhir_refresh_diagnostics::{REF0101, REF0102, RefreshError};
use octofhir_refresh_model::{Canonical, Encoding, Resource, ResourceStore, ResourceType};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Which edges a closure follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClosureOptions {
    pub include_terminology: bool,
    /// Follow the dependencies of attached libraries, not just the root's
    pub include_dependencies: bool,
    pub include_tests: bool,
}

/// Result of a traversal: everything that resolved, and every edge that did not
#[derive(Debug, Default)]
pub struct Closure {
    pub resources: ResourceSet,
    pub errors: Vec<RefreshError>,
}

/// Walks the reference graph against read-only lookups
pub struct Resolver<'a> {
    libraries: &'a Catalog,
    terminology: &'a TerminologyCache,
    precedence: &'a IdPrecedence,
    store: &'a dyn ResourceStore,
    layout: &'a GuideLayout,
}

impl<'a> Resolver<'a> {
    pub fn new(
        libraries: &'a Catalog,
        terminology: &'a TerminologyCache,
        precedence: &'a IdPrecedence,
        store: &'a dyn ResourceStore,
        layout: &'a GuideLayout,
    ) -> Self {
        Self {
            libraries,
            terminology,
            precedence,
            store,
            layout,
        }
    }

    /// Deduplicated closure of `root` in first-seen order
    ///
    /// Edges back into already visited resources are dropped. Unresolvable
    /// edges are recorded against the root and skipped.
    pub fn closure(
        &self,
        root: Arc<Resource>,
        root_path: Option<&Path>,
        options: ClosureOptions,
    ) -> Closure {
        let root_label = label(&root);
        let mut closure = Closure::default();
        let mut queue: VecDeque<(Arc<Resource>, bool)> = VecDeque::new();
        // each terminology reference is looked up once per closure
        let mut attempted: HashSet<Canonical> = HashSet::new();

        closure
            .resources
            .insert(Arc::clone(&root), Role::Root, root_path.map(Path::to_path_buf));
        queue.push_back((Arc::clone(&root), true));

        while let Some((current, expand)) = queue.pop_front() {
            if options.include_terminology {
                self.attach_terminology(&current, &root_label, &mut attempted, &mut closure);
            }
            if !expand {
                continue;
            }
            for reference in library_edges(&current) {
                let Some(entry) = self.libraries.resolve(&reference, self.precedence) else {
                    log::warn!("{}: library {} not found", root_label, reference);
                    closure.errors.push(
                        RefreshError::lookup(
                            REF0101,
                            format!("Library {} not found", reference),
                            reference.to_string(),
                        )
                        .with_root(root_label.clone()),
                    );
                    continue;
                };
                let inserted = closure.resources.insert(
                    Arc::clone(&entry.resource),
                    Role::Library,
                    Some(entry.path.clone()),
                );
                if inserted {
                    queue.push_back((Arc::clone(&entry.resource), options.include_dependencies));
                } else {
                    log::debug!("{}: already visited {}", root_label, reference);
                }
            }
        }

        if options.include_tests {
            self.attach_fixtures(&root, &mut closure);
        }
        closure
    }

    /// Every library reachable from `root`, root excluded
    pub fn library_dependencies(&self, root: Arc<Resource>) -> Vec<Member> {
        let options = ClosureOptions {
            include_dependencies: true,
            ..ClosureOptions::default()
        };
        self.closure(root, None, options)
            .resources
            .with_role(Role::Library)
            .cloned()
            .collect()
    }

    fn attach_terminology(
        &self,
        resource: &Resource,
        root_label: &str,
        attempted: &mut HashSet<Canonical>,
        closure: &mut Closure,
    ) {
        let bound = resource
            .code_filter_value_sets()
            .into_iter()
            .map(|c| (c, true));
        let declared = resource.depends_on().into_iter().filter_map(|c| match c.resource_type() {
            Some(kind) if kind.is_terminology() => Some((c, true)),
            Some(_) => None,
            None => Some((c, false)),
        });

        for (reference, required) in bound.chain(declared) {
            if !attempted.insert(reference.clone()) {
                continue;
            }
            match self.terminology.get(&reference) {
                Some(found) => {
                    closure
                        .resources
                        .insert(Arc::clone(found), Role::Terminology, None);
                }
                None if required => {
                    log::warn!("{}: terminology {} not found", root_label, reference);
                    closure.errors.push(
                        RefreshError::lookup(
                            REF0102,
                            format!("Terminology {} not found", reference),
                            reference.to_string(),
                        )
                        .with_root(root_label.to_string()),
                    );
                }
                None => log::trace!("{}: {} is not local terminology", root_label, reference),
            }
        }
    }

    fn attach_fixtures(&self, root: &Resource, closure: &mut Closure) {
        let dir = self
            .layout
            .test_fixture_dir(&root.resource_type(), &artifact_name(root));
        for path in resource_files(&dir) {
            match self.store.read(&path) {
                Ok(Some(resource)) => {
                    closure
                        .resources
                        .insert(Arc::new(resource), Role::TestFixture, Some(path));
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("test fixture {} skipped: {}", path.display(), e);
                    closure.errors.push(e);
                }
            }
        }
    }
}

/// Library references a resource's traversal follows
fn library_edges(resource: &Resource) -> Vec<Canonical> {
    match resource.resource_type() {
        ResourceType::Library => resource
            .depends_on()
            .into_iter()
            .filter(|c| c.resource_type() == Some(ResourceType::Library))
            .collect(),
        _ => resource.library_references(),
    }
}

/// Name used for per-artifact folders: `name`, else `id`
pub fn artifact_name(resource: &Resource) -> String {
    resource
        .name()
        .or_else(|| resource.id())
        .unwrap_or("unnamed")
        .to_string()
}

fn label(resource: &Resource) -> String {
    resource
        .reference()
        .unwrap_or_else(|| format!("{} {}", resource.resource_type(), artifact_name(resource)))
}

/// Resource files under `dir`, sorted, empty when it does not exist
pub(crate) fn resource_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| Encoding::from_path(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use octofhir_refresh_model::{FileResourceStore, ResourceKey};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const BASE: &str = "http://x";

    fn library(id: &str, deps: &[&str]) -> CatalogEntry {
        let related: Vec<_> = deps
            .iter()
            .map(|d| json!({ "type": "depends-on", "resource": format!("{}/Library/{}", BASE, d) }))
            .collect();
        let resource = Resource::from_value(json!({
            "resourceType": "Library",
            "id": id,
            "url": format!("{}/Library/{}", BASE, id),
            "relatedArtifact": related
        }))
        .unwrap();
        CatalogEntry::new(format!("lib/{}.json", id), resource)
    }

    fn ids(closure: &Closure) -> Vec<String> {
        closure.resources.keys().into_iter().map(|k| k.id).collect()
    }

    struct Fixture {
        catalog: Catalog,
        terminology: TerminologyCache,
        precedence: IdPrecedence,
        store: FileResourceStore,
        layout: GuideLayout,
    }

    impl Fixture {
        fn new(entries: Vec<CatalogEntry>) -> Self {
            Self {
                catalog: Catalog::from_entries(entries),
                terminology: TerminologyCache::new(),
                precedence: IdPrecedence::default(),
                store: FileResourceStore::new(),
                layout: GuideLayout::new("/nonexistent"),
            }
        }

        fn resolver(&self) -> Resolver<'_> {
            Resolver::new(
                &self.catalog,
                &self.terminology,
                &self.precedence,
                &self.store,
                &self.layout,
            )
        }

        fn root(&self, id: &str) -> Arc<Resource> {
            let key = ResourceKey::new(ResourceType::Library, id);
            Arc::clone(&self.catalog.get(&key).unwrap().resource)
        }
    }

    fn deep() -> ClosureOptions {
        ClosureOptions {
            include_dependencies: true,
            ..ClosureOptions::default()
        }
    }

    #[test]
    fn test_diamond_contains_shared_dependency_once() {
        let fx = Fixture::new(vec![
            library("A", &["B", "C"]),
            library("B", &["D"]),
            library("C", &["D"]),
            library("D", &[]),
        ]);
        let closure = fx.resolver().closure(fx.root("A"), None, deep());
        assert_eq!(ids(&closure), vec!["A", "B", "C", "D"]);
        assert!(closure.errors.is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let fx = Fixture::new(vec![library("A", &["B"]), library("B", &["A"])]);
        let closure = fx.resolver().closure(fx.root("A"), None, deep());
        assert_eq!(ids(&closure), vec!["A", "B"]);
        assert!(closure.errors.is_empty());
    }

    #[test]
    fn test_shallow_attaches_direct_dependencies_only() {
        let fx = Fixture::new(vec![
            library("A", &["B"]),
            library("B", &["C"]),
            library("C", &[]),
        ]);
        let closure = fx
            .resolver()
            .closure(fx.root("A"), None, ClosureOptions::default());
        assert_eq!(ids(&closure), vec!["A", "B"]);

        let deps: Vec<_> = fx
            .resolver()
            .library_dependencies(fx.root("A"))
            .into_iter()
            .map(|m| m.resource.id().unwrap().to_string())
            .collect();
        assert_eq!(deps, vec!["B", "C"]);
    }

    #[test]
    fn test_missing_dependency_recorded_and_skipped() {
        let fx = Fixture::new(vec![library("A", &["Missing", "B"]), library("B", &[])]);
        let closure = fx.resolver().closure(fx.root("A"), None, deep());
        assert_eq!(ids(&closure), vec!["A", "B"]);
        assert_eq!(closure.errors.len(), 1);
        match &closure.errors[0] {
            RefreshError::Lookup { code, root, .. } => {
                assert_eq!(*code, REF0101);
                assert_eq!(root.as_deref(), Some("Library/A"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_terminology_attached_when_enabled() {
        let mut fx = Fixture::new(vec![library("A", &[])]);
        let mut vs = Resource::new(ResourceType::ValueSet);
        vs.set_id("vs1");
        vs.set("url", json!("http://vs/1"));
        fx.terminology.insert(Path::new("vs1.json"), vs);

        let mut root = (*fx.root("A")).clone();
        root.set(
            "dataRequirement",
            json!([
                { "type": "Condition", "codeFilter": [ { "path": "code", "valueSet": "http://vs/1" } ] },
                { "type": "Encounter", "codeFilter": [ { "path": "type", "valueSet": "http://vs/2" } ] }
            ]),
        );
        let root = Arc::new(root);

        let off = fx.resolver().closure(Arc::clone(&root), None, deep());
        assert_eq!(ids(&off), vec!["A"]);

        let on = fx.resolver().closure(
            root,
            None,
            ClosureOptions {
                include_terminology: true,
                ..deep()
            },
        );
        assert_eq!(ids(&on), vec!["A", "vs1"]);
        assert_eq!(on.errors.len(), 1);
        assert_eq!(on.errors[0].code(), REF0102);
    }

    #[test]
    fn test_missing_terminology_reported_once_per_closure() {
        let fx = Fixture::new(vec![library("A", &["B"]), library("B", &[])]);
        let filter = json!([
            { "type": "Condition", "codeFilter": [ { "path": "code", "valueSet": "http://x/ValueSet/missing" } ] }
        ]);
        let declared = json!({ "type": "depends-on", "resource": "http://x/ValueSet/missing" });

        let mut a = (*fx.root("A")).clone();
        let mut related = a.array("relatedArtifact").to_vec();
        related.push(declared.clone());
        a.set("relatedArtifact", json!(related));
        a.set("dataRequirement", filter.clone());

        let mut b = (*fx.root("B")).clone();
        b.set("relatedArtifact", json!([declared]));
        b.set("dataRequirement", filter);
        let fx = Fixture::new(vec![
            CatalogEntry::new("lib/A.json", a),
            CatalogEntry::new("lib/B.json", b),
        ]);

        let closure = fx.resolver().closure(
            fx.root("A"),
            None,
            ClosureOptions {
                include_terminology: true,
                ..deep()
            },
        );
        assert_eq!(ids(&closure), vec!["A", "B"]);
        assert_eq!(closure.errors.len(), 1);
        assert_eq!(closure.errors[0].code(), REF0102);
    }
}
