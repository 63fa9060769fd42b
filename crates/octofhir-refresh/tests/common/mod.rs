//! Common test utilities for refresh testing
//!
//! This module provides shared testing infrastructure including:
//! - An on-disk guide builder
//! - Logic source and resource templates
//! - Fake compiler and publisher implementations

#![allow(dead_code)]

pub mod mocks;

pub use mocks::*;

use octofhir_refresh::model::{Bundle, FileResourceStore, ResourceStore};
use octofhir_refresh::{RefreshConfig, RefreshContext, RefreshSettings};
use octofhir_refresh_compiler::{CachingCompiler, CqlCompiler, LogicCompiler};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const BASE: &str = "http://example.org/fhir";

/// Implementation guide laid out in a temporary directory
pub struct GuideBuilder {
    dir: TempDir,
}

impl GuideBuilder {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir_all(dir.path().join("input/cql")).expect("cql dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write `relative` under the guide root
    pub fn file(&self, relative: &str, text: &str) -> PathBuf {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(&path, text).expect("write file");
        path
    }

    pub fn json(&self, relative: &str, value: &Value) -> PathBuf {
        self.file(relative, &serde_json::to_string_pretty(value).expect("json"))
    }

    pub fn cql(&self, name: &str, text: &str) -> PathBuf {
        self.file(&format!("input/cql/{}.cql", name), text)
    }

    pub fn config(&self) -> RefreshConfig {
        RefreshConfig {
            root: self.root().to_path_buf(),
            canonical_base: Some(BASE.to_string()),
            jobs: Some(2),
            ..RefreshConfig::default()
        }
    }

    pub fn settings(&self, edit: impl FnOnce(&mut RefreshConfig)) -> RefreshSettings {
        let mut config = self.config();
        edit(&mut config);
        config.validate(&FileResourceStore::new()).expect("valid configuration")
    }

    pub fn context(&self, settings: RefreshSettings) -> RefreshContext {
        self.context_with(settings, Arc::new(CachingCompiler::new(CqlCompiler::new())))
    }

    pub fn context_with(
        &self,
        settings: RefreshSettings,
        compiler: Arc<dyn LogicCompiler>,
    ) -> RefreshContext {
        RefreshContext::new(settings, Arc::new(FileResourceStore::new()), compiler)
    }

    /// `Type/id` of every entry in a written bundle, sorted
    pub fn bundle_members(&self, relative: &str) -> Vec<String> {
        let resource = FileResourceStore::new()
            .read(&self.path(relative))
            .expect("readable bundle")
            .expect("bundle exists");
        let bundle = Bundle::from_resource(&resource).expect("bundle shape");
        let mut members: Vec<String> = bundle.keys().iter().map(|k| k.to_string()).collect();
        members.sort();
        members
    }
}

/// Minimal logic library with optional includes and value sets
pub fn library_source(name: &str, includes: &[&str], value_sets: &[(&str, &str)]) -> String {
    let mut text = format!("library {} version '1.0.0'\n\nusing FHIR version '4.0.1'\n\n", name);
    for include in includes {
        text.push_str(&format!("include {} version '1.0.0' called {}\n", include, include));
    }
    for (vs_name, url) in value_sets {
        text.push_str(&format!("valueset \"{}\": '{}'\n", vs_name, url));
    }
    text.push_str("\ncontext Patient\n\n");
    match value_sets.first() {
        Some((vs_name, _)) => {
            text.push_str(&format!("define \"Matches\":\n  exists [Condition: \"{}\"]\n", vs_name))
        }
        None => text.push_str("define \"Patients\":\n  [Patient]\n"),
    }
    text
}

pub fn measure(id: &str, library: &str) -> Value {
    json!({
        "resourceType": "Measure",
        "id": id,
        "url": format!("{}/Measure/{}", BASE, id),
        "name": id,
        "title": format!("{} measure", id),
        "status": "draft",
        "library": [format!("{}/Library/{}", BASE, library)]
    })
}

pub fn value_set(id: &str, url: &str) -> Value {
    json!({
        "resourceType": "ValueSet",
        "id": id,
        "url": url,
        "status": "active"
    })
}
