//! Per-run context
//!
//! Holds the caches every component shares: the resource index, the
//! terminology cache and the compiled-unit cache. Built once per run and
//! passed by handle.

use crate::config::RefreshSettings;
use crate::index::{PathSet, ResourceIndex};
use crate::layout::GuideLayout;
use crate::publish::{HttpPublisher, Publisher};
use crate::sources::LogicSources;
use crate::sync::{SyncOptions, Synchronizer, adapter_for};
use crate::terminology::TerminologyCache;
use octofhir_refresh_compiler::{CachingCompiler, CqlCompiler, LogicCompiler};
use octofhir_refresh_diagnostics::Result;
use octofhir_refresh_model::{FileResourceStore, ResourceStore, ResourceType};
use once_cell::sync::OnceCell;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct RefreshContext {
    pub settings: RefreshSettings,
    pub store: Arc<dyn ResourceStore>,
    pub compiler: Arc<dyn LogicCompiler>,
    pub index: ResourceIndex,
    pub synchronizer: Synchronizer,
    pub publisher: Option<Arc<dyn Publisher>>,
    terminology: OnceCell<Arc<TerminologyCache>>,
    sources: OnceCell<Arc<LogicSources>>,
}

impl RefreshContext {
    pub fn new(
        settings: RefreshSettings,
        store: Arc<dyn ResourceStore>,
        compiler: Arc<dyn LogicCompiler>,
    ) -> Self {
        let synchronizer = Synchronizer::new(
            adapter_for(settings.fhir_version),
            SyncOptions {
                versioned: settings.versioned,
                canonical_base: settings.canonical_base.clone(),
                elm_format: settings.elm_format,
            },
        );
        Self {
            index: ResourceIndex::new(Arc::clone(&store)),
            settings,
            store,
            compiler,
            synchronizer,
            publisher: None,
            terminology: OnceCell::new(),
            sources: OnceCell::new(),
        }
    }

    /// File store, caching CQL compiler and, when configured, an HTTP publisher
    pub fn with_defaults(settings: RefreshSettings) -> Result<Self> {
        let publisher = match &settings.publish_url {
            Some(url) => Some(Arc::new(HttpPublisher::new(url.clone())?) as Arc<dyn Publisher>),
            None => None,
        };
        let context = Self::new(
            settings,
            Arc::new(FileResourceStore::new()),
            Arc::new(CachingCompiler::new(CqlCompiler::new())),
        );
        Ok(match publisher {
            Some(publisher) => context.with_publisher(publisher),
            None => context,
        })
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn layout(&self) -> &GuideLayout {
        &self.settings.layout
    }

    /// Indexed paths of one kind under the guide's conventional directories
    pub fn paths_of(&self, kind: &ResourceType) -> PathSet {
        self.index
            .index_of(kind, &self.layout().directories_for(kind))
    }

    /// Value sets and code systems, loaded on first use
    pub fn terminology(&self) -> Arc<TerminologyCache> {
        Arc::clone(self.terminology.get_or_init(|| {
            let value_sets = self.paths_of(&ResourceType::ValueSet);
            let code_systems = self.paths_of(&ResourceType::CodeSystem);
            let paths: BTreeSet<_> = value_sets.iter().chain(code_systems.iter()).collect();
            Arc::new(TerminologyCache::load(
                self.store.as_ref(),
                paths.into_iter().map(|p| p.as_path()),
            ))
        }))
    }

    pub fn logic_sources(&self) -> Arc<LogicSources> {
        Arc::clone(
            self.sources
                .get_or_init(|| Arc::new(LogicSources::scan(&self.layout().cql_dir()))),
        )
    }
}
