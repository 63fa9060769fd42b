//! Refresh command implementation

use super::output;
use crate::config::RefreshConfig;
use crate::context::RefreshContext;
use crate::orchestrate::Orchestrator;
use anyhow::{Context, Result};
use octofhir_refresh_model::{Encoding, FileResourceStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Configuration for refresh command
///
/// Every field left unset falls back to the configuration file.
#[derive(Debug, Clone, Default)]
pub struct RefreshArgs {
    pub root: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub encoding: Option<Encoding>,
    pub elm_format: Option<Encoding>,
    pub no_terminology: bool,
    pub include_dependencies: bool,
    pub include_tests: bool,
    pub versioned: bool,
    pub fhir_version: Option<String>,
    pub canonical_base: Option<String>,
    pub publish_url: Option<String>,
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub output_file: Option<PathBuf>,
}

impl RefreshArgs {
    /// Configuration file values with command-line flags applied on top
    pub fn to_config(&self) -> Result<RefreshConfig> {
        let mut config = match &self.config_file {
            Some(path) => RefreshConfig::load(path)?,
            None => {
                let root = self.root.clone().unwrap_or_else(|| PathBuf::from("."));
                RefreshConfig::discover(&root)?
            }
        };

        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(format) = self.elm_format {
            config.elm_format = format;
        }
        if self.no_terminology {
            config.include_terminology = false;
        }
        config.include_dependencies |= self.include_dependencies;
        config.include_tests |= self.include_tests;
        config.versioned |= self.versioned;
        if let Some(version) = &self.fhir_version {
            config.fhir_version = version.clone();
        }
        if self.canonical_base.is_some() {
            config.canonical_base = self.canonical_base.clone();
        }
        if self.publish_url.is_some() {
            config.publish_url = self.publish_url.clone();
        }
        if self.jobs.is_some() {
            config.jobs = self.jobs;
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }
        Ok(config)
    }
}

/// Refresh and bundle every artifact of a guide
///
/// Only configuration problems are returned as errors; per-artifact failures
/// are part of the printed report.
pub async fn refresh(args: RefreshArgs) -> Result<()> {
    let config = args.to_config()?;
    let settings = config
        .validate(&FileResourceStore::new())
        .with_context(|| format!("Invalid configuration for {}", config.root.display()))?;
    let context = Arc::new(RefreshContext::with_defaults(settings)?);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted, finishing in-flight artifacts");
            interrupt.cancel();
        }
    });

    let report = Orchestrator::new(context).run(cancel).await;
    signal.abort();

    eprintln!("{}", output::format_report(&report));
    if let Some(path) = &args.output_file {
        output::write_output(&report.to_string(), Some(path))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("refresh.toml"),
            "encoding = \"xml\"\ninclude_terminology = true\njobs = 2\ncanonical_base = \"http://a.org/fhir\"\n",
        )
        .unwrap();

        let args = RefreshArgs {
            root: Some(dir.path().to_path_buf()),
            encoding: Some(Encoding::Json),
            no_terminology: true,
            include_tests: true,
            jobs: Some(8),
            ..RefreshArgs::default()
        };
        let config = args.to_config().unwrap();

        assert_eq!(config.root, dir.path());
        assert_eq!(config.encoding, Encoding::Json);
        assert!(!config.include_terminology);
        assert!(config.include_tests);
        assert_eq!(config.jobs, Some(8));
        assert_eq!(config.canonical_base.as_deref(), Some("http://a.org/fhir"));
    }

    #[test]
    fn test_file_values_kept_without_flags() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("refresh.toml"), "versioned = true\nelm_format = \"xml\"\n").unwrap();

        let args = RefreshArgs {
            root: Some(dir.path().to_path_buf()),
            ..RefreshArgs::default()
        };
        let config = args.to_config().unwrap();
        assert!(config.versioned);
        assert_eq!(config.elm_format, Encoding::Xml);
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let args = RefreshArgs {
            root: Some(dir.path().join("nope")),
            ..RefreshArgs::default()
        };
        assert!(refresh(args).await.is_err());
    }
}
