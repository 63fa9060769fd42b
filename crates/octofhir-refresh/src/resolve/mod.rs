//! Dependency resolution

mod closure;
mod id;

pub use closure::{Closure, ClosureOptions, Resolver, artifact_name};
pub use id::{IdPrecedence, IdStrategy, resolve_id};

pub(crate) use closure::resource_files;
