//! Batch orchestrator
//!
//! A run goes through four phases:
//!
//! 1. Shared read-only state is built: the resource index, the terminology
//!    cache and a catalog of the libraries on disk.
//! 2. Every logic source, measure and plan definition is synchronized on the
//!    worker pool.
//! 3. After every refreshed library has been written, the library catalog is
//!    rebuilt once and closures are resolved and packaged on the worker pool.
//! 4. Written bundles are published, when a publisher is configured.
//!
//! Per-artifact errors end up in the [`RefreshReport`]; a run never returns
//! an error.

mod pool;
mod report;

pub use pool::{TaskOutcome, WorkerPool};
pub use report::{ArtifactReport, Disposition, RefreshReport};

use crate::bundle::{BundlePackage, BundleWriter, WrittenBundle, interaction_logs};
use crate::catalog::{Catalog, CatalogEntry};
use crate::context::RefreshContext;
use crate::layout::output_file_name;
use crate::publish::{Publisher, publish_with_retry};
use crate::resolve::{ClosureOptions, Resolver, artifact_name};
use crate::sources::LogicSources;
use crate::sync::artifact_id;
use crate::terminology::TerminologyCache;
use chrono::Utc;
use octofhir_refresh_diagnostics::{REF0103, REF0200, REF0300, RefreshError};
use octofhir_refresh_model::{Canonical, Encoding, Resource, ResourceType};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One unit of synchronization work
#[derive(Debug, Clone)]
enum Candidate {
    /// A `.cql` file, refreshed into its library
    Logic(PathBuf),
    /// A measure or plan definition, refreshed from its primary library
    Artifact { kind: ResourceType, path: PathBuf },
}

impl Candidate {
    fn kind(&self) -> ResourceType {
        match self {
            Self::Logic(_) => ResourceType::Library,
            Self::Artifact { kind, .. } => kind.clone(),
        }
    }

    /// Name to report before anything has been loaded
    fn label(&self) -> String {
        let path = match self {
            Self::Logic(path) | Self::Artifact { path, .. } => path,
        };
        file_stem(path)
    }
}

/// A synchronized artifact waiting to be bundled
#[derive(Debug)]
struct Synced {
    name: String,
    kind: ResourceType,
    path: PathBuf,
    resource: Resource,
    /// Primary library of a measure or plan definition
    primary: Option<Canonical>,
}

#[derive(Debug)]
struct Failure {
    name: String,
    error: RefreshError,
}

impl Failure {
    fn new(name: &str, error: impl Into<RefreshError>) -> Self {
        Self {
            name: name.to_string(),
            error: error.into(),
        }
    }
}

enum BundleOutcome {
    Bundled {
        report: ArtifactReport,
        written: WrittenBundle,
    },
    NotBundled(ArtifactReport),
}

/// What a synchronization worker can see
#[derive(Clone)]
struct SyncScope {
    context: Arc<RefreshContext>,
    libraries: Arc<Catalog>,
    sources: Arc<LogicSources>,
}

impl SyncScope {
    fn synchronize(&self, candidate: Candidate) -> Result<Synced, Failure> {
        match candidate {
            Candidate::Logic(path) => self.library(&path),
            Candidate::Artifact { kind, path } => self.artifact(kind, &path),
        }
    }

    fn library(&self, source: &Path) -> Result<Synced, Failure> {
        let context = &self.context;
        let settings = &context.settings;
        let adapter = context.synchronizer.adapter();

        let unit = context
            .compiler
            .compile(source, self.sources.include_paths())
            .map_err(|e| Failure::new(&file_stem(source), e))?;
        let name = unit.identifier.name.clone();
        let version = unit.identifier.version.as_deref();

        let target = Canonical::for_artifact(&settings.canonical_base, &ResourceType::Library, &name)
            .with_version(version);
        let (existing, path, encoding) =
            match self.libraries.resolve(&target, &settings.id_precedence) {
                Some(entry) => {
                    let existing = adapter
                        .read_existing(context.store.as_ref(), &entry.path)
                        .map_err(|e| Failure::new(&name, e))?;
                    let encoding = Encoding::from_path(&entry.path).unwrap_or(settings.encoding);
                    (existing, entry.path.clone(), encoding)
                }
                None => {
                    let id = artifact_id(&name, version, settings.versioned);
                    let file = output_file_name(&id, version, settings.versioned, settings.encoding);
                    let path = context.layout().resource_dir(&ResourceType::Library).join(file);
                    (None, path, settings.encoding)
                }
            };

        if existing.is_none() {
            log::info!("creating library {} at {}", name, path.display());
        }
        let resource = context.synchronizer.refresh(existing, &unit);
        adapter
            .write_output(context.store.as_ref(), &path, &resource, encoding)
            .map_err(|e| Failure::new(&name, e))?;
        log::debug!("refreshed library {}", name);

        Ok(Synced {
            name,
            kind: ResourceType::Library,
            path,
            resource,
            primary: None,
        })
    }

    fn artifact(&self, kind: ResourceType, path: &Path) -> Result<Synced, Failure> {
        let context = &self.context;
        let adapter = context.synchronizer.adapter();
        let label = file_stem(path);

        let existing = adapter
            .read_existing(context.store.as_ref(), path)
            .map_err(|e| Failure::new(&label, e))?
            .ok_or_else(|| {
                Failure::new(
                    &label,
                    RefreshError::io(REF0200, format!("{} no longer exists", path.display())),
                )
            })?;
        let name = artifact_name(&existing);
        let primary = existing.library_references().into_iter().next();
        let source = primary
            .as_ref()
            .and_then(|p| self.sources.find(p.tail(), p.version.as_deref()));

        let resource = match source {
            Some(source) => {
                let unit = context
                    .compiler
                    .compile(source, self.sources.include_paths())
                    .map_err(|e| Failure::new(&name, e))?;
                let refreshed = context.synchronizer.refresh_artifact(existing, &unit);
                let encoding = Encoding::from_path(path).unwrap_or(context.settings.encoding);
                adapter
                    .write_output(context.store.as_ref(), path, &refreshed, encoding)
                    .map_err(|e| Failure::new(&name, e))?;
                log::debug!("refreshed {} {}", kind, name);
                refreshed
            }
            None => {
                log::warn!(
                    "{} {}: no logic source for its primary library, left as authored",
                    kind,
                    name
                );
                existing
            }
        };

        Ok(Synced {
            name,
            kind,
            path: path.to_path_buf(),
            resource,
            primary,
        })
    }
}

/// What a bundling worker can see
#[derive(Clone)]
struct BundleScope {
    context: Arc<RefreshContext>,
    libraries: Arc<Catalog>,
    terminology: Arc<TerminologyCache>,
    writer: BundleWriter,
}

impl BundleScope {
    fn bundle(&self, synced: Synced) -> BundleOutcome {
        let Synced {
            name,
            kind,
            path,
            resource,
            primary,
        } = synced;
        let context = &self.context;
        let settings = &context.settings;

        let library = match kind {
            ResourceType::Library => None,
            _ => {
                let found = primary
                    .as_ref()
                    .and_then(|p| self.libraries.resolve(p, &settings.id_precedence));
                match found {
                    Some(entry) => Some(Arc::clone(&entry.resource)),
                    None => {
                        let reference = primary.map(|p| p.to_string()).unwrap_or_default();
                        let error = RefreshError::lookup(
                            REF0103,
                            format!("primary library '{}' not found", reference),
                            reference,
                        )
                        .with_root(format!("{}/{}", kind, name));
                        log::warn!("{} {} not bundled: {}", kind, name, error);
                        return BundleOutcome::NotBundled(ArtifactReport::not_bundled(
                            name, kind, &error,
                        ));
                    }
                }
            }
        };

        let resolver = Resolver::new(
            &self.libraries,
            &self.terminology,
            &settings.id_precedence,
            context.store.as_ref(),
            context.layout(),
        );
        let options = ClosureOptions {
            include_terminology: settings.include_terminology,
            include_dependencies: settings.include_dependencies,
            include_tests: settings.include_tests,
        };
        let root = Arc::new(resource);
        let closure = resolver.closure(Arc::clone(&root), Some(&path), options);
        let dependencies = resolver.library_dependencies(root);
        let copies = interaction_logs(context.layout(), &name);

        let Some(package) = BundlePackage::build(
            &name,
            &closure.resources,
            library.as_deref(),
            &dependencies,
            copies,
        ) else {
            return BundleOutcome::NotBundled(ArtifactReport::not_bundled(
                name,
                kind,
                "empty dependency closure",
            ));
        };

        match self.writer.write(&package) {
            Ok(written) => BundleOutcome::Bundled {
                report: ArtifactReport::bundled(&name, kind, written.dir.clone())
                    .with_warnings(&closure.errors),
                written,
            },
            Err(e) => {
                log::error!("{} {}: writing bundle failed: {}", kind, name, e);
                BundleOutcome::NotBundled(
                    ArtifactReport::not_bundled(name, kind, &e).with_warnings(&closure.errors),
                )
            }
        }
    }
}

pub struct Orchestrator {
    context: Arc<RefreshContext>,
    writer: BundleWriter,
}

impl Orchestrator {
    pub fn new(context: Arc<RefreshContext>) -> Self {
        let settings = &context.settings;
        let writer = BundleWriter::new(settings.layout.clone(), settings.encoding, settings.versioned);
        Self { context, writer }
    }

    pub fn context(&self) -> &RefreshContext {
        &self.context
    }

    /// Refresh, bundle and publish every artifact of the guide
    pub async fn run(&self, cancel: CancellationToken) -> RefreshReport {
        let context = &self.context;
        let settings = &context.settings;
        let mut report = RefreshReport::new(Utc::now());

        let timer = settings.timeout.map(|timeout| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                log::warn!("run timed out after {:?}, finishing in-flight work", timeout);
                token.cancel();
            })
        });

        // Shared state is complete before the first worker starts
        let sources = context.logic_sources();
        let terminology = if settings.include_terminology {
            context.terminology()
        } else {
            Arc::new(TerminologyCache::new())
        };
        let library_paths = context.paths_of(&ResourceType::Library);
        let on_disk = Catalog::load(
            context.store.as_ref(),
            library_paths.iter().map(PathBuf::as_path),
        );

        let mut candidates: Vec<Candidate> =
            sources.files().iter().cloned().map(Candidate::Logic).collect();
        for kind in [ResourceType::Measure, ResourceType::PlanDefinition] {
            candidates.extend(context.paths_of(&kind).iter().map(|path| Candidate::Artifact {
                kind: kind.clone(),
                path: path.clone(),
            }));
        }
        log::info!(
            "refreshing {} artifact(s) under {} with {} worker(s)",
            candidates.len(),
            settings.layout.root().display(),
            settings.jobs
        );

        let pool = WorkerPool::new(settings.jobs, cancel.clone());
        let labels: Vec<(String, ResourceType)> =
            candidates.iter().map(|c| (c.label(), c.kind())).collect();
        let scope = SyncScope {
            context: Arc::clone(context),
            libraries: Arc::new(on_disk.clone()),
            sources,
        };
        let outcomes = pool
            .run(candidates, move |candidate| scope.synchronize(candidate))
            .await;

        let mut synced = Vec::new();
        for ((label, kind), outcome) in labels.into_iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Done(Ok(artifact)) => synced.push(artifact),
                TaskOutcome::Done(Err(failure)) => {
                    log::error!("{} {} failed: {}", kind, failure.name, failure.error);
                    report.record(ArtifactReport::failed(failure.name, kind, &failure.error));
                }
                TaskOutcome::Cancelled => {
                    report.record(ArtifactReport::failed(label, kind, "not processed: run cancelled"))
                }
                TaskOutcome::Panicked => {
                    report.record(ArtifactReport::failed(label, kind, "synchronization panicked"))
                }
            }
        }

        // Libraries as refreshed on disk, visible to every resolver
        let libraries = on_disk.with_overrides(
            synced
                .iter()
                .filter(|s| s.kind == ResourceType::Library)
                .map(|s| CatalogEntry::new(&s.path, s.resource.clone())),
        );

        let labels: Vec<(String, ResourceType)> =
            synced.iter().map(|s| (s.name.clone(), s.kind.clone())).collect();
        let scope = BundleScope {
            context: Arc::clone(context),
            libraries: Arc::new(libraries),
            terminology,
            writer: self.writer.clone(),
        };
        let outcomes = pool.run(synced, move |artifact| scope.bundle(artifact)).await;

        let mut written = Vec::new();
        for ((name, kind), outcome) in labels.into_iter().zip(outcomes) {
            match outcome {
                TaskOutcome::Done(BundleOutcome::Bundled {
                    report: artifact,
                    written: bundle,
                }) => {
                    written.push((kind, name, bundle));
                    report.record(artifact);
                }
                TaskOutcome::Done(BundleOutcome::NotBundled(artifact)) => report.record(artifact),
                TaskOutcome::Cancelled => {
                    report.record(ArtifactReport::not_bundled(name, kind, "not bundled: run cancelled"))
                }
                TaskOutcome::Panicked => {
                    report.record(ArtifactReport::not_bundled(name, kind, "bundling panicked"))
                }
            }
        }

        if let Some(publisher) = &context.publisher {
            publish_all(publisher.as_ref(), &written, &cancel, &mut report).await;
        }

        if let Some(timer) = timer {
            timer.abort();
        }
        report.finish();
        log::info!(
            "{} bundled, {} refreshed but not bundled, {} failed",
            report.count(Disposition::Bundled),
            report.count(Disposition::RefreshedNotBundled),
            report.count(Disposition::Failed)
        );
        report
    }
}

/// Publish written bundles one after another; failures only annotate the report
async fn publish_all(
    publisher: &dyn Publisher,
    written: &[(ResourceType, String, WrittenBundle)],
    cancel: &CancellationToken,
    report: &mut RefreshReport,
) {
    for (kind, name, bundle) in written {
        if cancel.is_cancelled() {
            let error = RefreshError::publish(REF0300, "not published: run cancelled");
            report.publish_failed(kind, name, &error);
            continue;
        }
        match publish_with_retry(publisher, name, &bundle.body, bundle.encoding).await {
            Ok(()) => log::info!("published {} to {}", name, publisher.endpoint()),
            Err(e) => report.publish_failed(kind, name, &e),
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
