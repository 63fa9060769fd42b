//! Knowledge artifact refresh and bundling
//!
//! Keeps the definitional resources of a FHIR implementation guide in step
//! with their CQL logic and packages each artifact into a deployable
//! transaction bundle:
//! - Synchronize libraries, measures and plan definitions from compiled logic
//! - Resolve each artifact's dependency closure
//! - Write bundle packages with their sidecar files
//! - Optionally publish bundles to a FHIR server
//!
//! # Example
//!
//! ```ignore
//! use octofhir_refresh::{Orchestrator, RefreshConfig, RefreshContext};
//! use octofhir_refresh::model::FileResourceStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let settings = RefreshConfig::discover(Path::new("my-guide"))?
//!     .validate(&FileResourceStore::new())?;
//! let context = Arc::new(RefreshContext::with_defaults(settings)?);
//! let report = Orchestrator::new(context).run(CancellationToken::new()).await;
//! println!("{}", report);
//! ```

pub mod bundle;
pub mod catalog;
pub mod config;
pub mod context;
pub mod index;
pub mod layout;
pub mod orchestrate;
pub mod publish;
pub mod resolve;
pub mod resource_set;
pub mod sources;
pub mod sync;
pub mod terminology;

// Re-export the workspace crates
pub use octofhir_refresh_compiler as compiler;
pub use octofhir_refresh_diagnostics as diagnostics;
pub use octofhir_refresh_model as model;

// Convenience re-exports
pub use config::{RefreshConfig, RefreshSettings};
pub use context::RefreshContext;
pub use octofhir_refresh_diagnostics::{RefreshError, Result};
pub use orchestrate::{Disposition, Orchestrator, RefreshReport};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
