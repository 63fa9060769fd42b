//! Knowledge artifact model
//!
//! This crate provides:
//! - An order-preserving FHIR resource wrapper with typed accessors
//! - Canonical url handling
//! - Typed derived-field structures (related artifacts, data requirements, attachments)
//! - FHIR version and file encoding selection
//! - FHIR JSON/XML codecs and the definitional resource store

pub mod artifact;
pub mod bundle;
pub mod canonical;
pub mod encoding;
pub mod resource;
pub mod resource_type;
pub mod store;
pub mod version;
pub mod xml;

pub use artifact::*;
pub use bundle::*;
pub use canonical::*;
pub use encoding::*;
pub use resource::*;
pub use resource_type::*;
pub use store::*;
pub use version::*;
