//! Default CQL compiler

use crate::header::{LibraryHeader, parse_header};
use crate::retrieve::{self, TerminologyName};
use crate::source::preprocess;
use crate::unit::{CompiledUnit, Retrieve, Statement, TerminologyRef};
use crate::{CompileFailure, LogicCompiler, elm};
use octofhir_refresh_diagnostics::{
    Diagnostic, REF0001, REF0002, REF0006, REF0007, REF0008, REF0009, Span,
};
use octofhir_refresh_model::{CodeFilter, DataRequirement};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Libraries the translator supplies when no source is on the include path
const BUILTIN_LIBRARIES: &[&str] = &["FHIRHelpers"];

/// Header compiler for CQL sources
///
/// Resolves includes as `<Name>.cql` or `<Name>-<version>.cql` in the source's
/// own directory first, then each include path in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CqlCompiler;

impl CqlCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl LogicCompiler for CqlCompiler {
    fn compile(
        &self,
        source: &Path,
        include_paths: &[PathBuf],
    ) -> Result<Arc<CompiledUnit>, CompileFailure> {
        let text = fs::read_to_string(source).map_err(|e| {
            CompileFailure::new(
                source,
                vec![Diagnostic::error(
                    REF0009,
                    format!("Cannot read {}: {}", source.display(), e),
                )],
            )
        })?;
        compile_source(source, text, include_paths).map(Arc::new)
    }
}

/// Compile already-loaded source text
pub fn compile_source(
    path: &Path,
    source: String,
    include_paths: &[PathBuf],
) -> Result<CompiledUnit, CompileFailure> {
    let fail = |diagnostics: Vec<Diagnostic>| CompileFailure::new(path, diagnostics);

    let cleaned = preprocess(&source).map_err(fail)?;
    let header = parse_header(&cleaned).map_err(fail)?;
    let Some(identifier) = header.library.clone() else {
        return Err(fail(vec![Diagnostic::error(
            REF0002,
            "Missing library declaration",
        )]));
    };

    let mut diagnostics = Vec::new();

    let search_dirs: Vec<&Path> = path
        .parent()
        .into_iter()
        .chain(include_paths.iter().map(PathBuf::as_path))
        .collect();
    let mut includes = Vec::with_capacity(header.includes.len());
    let mut included_value_sets: HashMap<String, Option<Vec<TerminologyRef>>> = HashMap::new();
    for include in &header.includes {
        let mut resolved = include.clone();
        match locate_include(&include.name, include.version.as_deref(), &search_dirs) {
            Some(found) => {
                included_value_sets.insert(include.local_name().to_string(), read_value_sets(&found));
                resolved.source_path = Some(found);
            }
            None if BUILTIN_LIBRARIES.contains(&include.name.as_str()) => {
                included_value_sets.insert(include.local_name().to_string(), None);
            }
            None => {
                let mut diagnostic = Diagnostic::error(
                    REF0006,
                    format!("Included library {} not found on the include path", include.name),
                );
                if let Some(start) = cleaned.find(&format!("include {}", include.name)) {
                    let end = cleaned[start..].find('\n').map_or(cleaned.len(), |i| start + i);
                    diagnostic = diagnostic.with_span(Span::new(start, end), &cleaned);
                }
                diagnostics.push(diagnostic);
            }
        }
        includes.push(resolved);
    }

    let mut statements = Vec::with_capacity(header.definitions.len());
    for def in &header.definitions {
        let raw = match retrieve::scan(def.body, def.offset) {
            Ok(raw) => raw,
            Err(span) => {
                diagnostics.push(
                    Diagnostic::error(
                        REF0008,
                        format!("Unbalanced retrieve brackets in \"{}\"", def.name),
                    )
                    .with_span(span, &cleaned),
                );
                continue;
            }
        };

        let mut retrieves = Vec::with_capacity(raw.len());
        for found in raw {
            let value_set = match &found.terminology {
                None => None,
                Some(name) => match resolve_terminology(name, &header, &included_value_sets) {
                    Ok(url) => url,
                    Err(message) => {
                        diagnostics.push(
                            Diagnostic::error(REF0007, message).with_span(found.span, &cleaned),
                        );
                        None
                    }
                },
            };
            let (terminology, qualifier) = match found.terminology {
                Some(t) => (Some(t.name), t.qualifier),
                None => (None, None),
            };
            retrieves.push(Retrieve {
                data_type: found.data_type,
                code_path: found.code_path,
                terminology,
                qualifier,
                value_set,
            });
        }

        statements.push(Statement {
            name: def.name.clone(),
            context: def.context.clone(),
            private: def.private,
            function: def.function,
            retrieves,
        });
    }

    if !diagnostics.is_empty() {
        return Err(fail(diagnostics));
    }

    let data_requirements = data_requirements(&statements);
    let mut unit = CompiledUnit {
        identifier,
        source_path: path.to_path_buf(),
        usings: header.usings.clone(),
        includes,
        parameters: header.parameters.clone(),
        value_sets: header.value_sets.clone(),
        code_systems: header.code_systems.clone(),
        statements,
        data_requirements,
        elm_json: String::new(),
        elm_xml: String::new(),
        source: String::new(),
    };
    let elm_failure = |e: elm::ElmError| fail(vec![Diagnostic::error(REF0001, e.to_string())]);
    unit.elm_json = elm::to_json(&unit).map_err(elm_failure)?;
    unit.elm_xml = elm::to_xml(&unit).map_err(elm_failure)?;
    unit.source = source;

    log::debug!(
        "compiled {} from {} ({} statements, {} data requirements)",
        unit.identifier,
        path.display(),
        unit.statements.len(),
        unit.data_requirements.len()
    );
    Ok(unit)
}

/// Find `<name>-<version>.cql` or `<name>.cql` in the search directories
fn locate_include(name: &str, version: Option<&str>, dirs: &[&Path]) -> Option<PathBuf> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(version) = version {
        candidates.push(format!("{}-{}.cql", name, version));
    }
    candidates.push(format!("{}.cql", name));

    dirs.iter()
        .flat_map(|dir| candidates.iter().map(move |file| dir.join(file)))
        .find(|path| path.is_file())
}

/// Value sets declared by an included library, `None` when it cannot be read
fn read_value_sets(path: &Path) -> Option<Vec<TerminologyRef>> {
    let text = fs::read_to_string(path).ok()?;
    let cleaned = preprocess(&text).ok()?;
    let header = parse_header(&cleaned).ok()?;
    Some(header.value_sets)
}

/// Resolve a retrieve's terminology name to a value set url
///
/// `Ok(None)` means the name is valid but not a value set (a code, or an
/// expression reference). Quoted names that match nothing are errors.
fn resolve_terminology(
    name: &TerminologyName,
    header: &LibraryHeader<'_>,
    included: &HashMap<String, Option<Vec<TerminologyRef>>>,
) -> Result<Option<String>, String> {
    match &name.qualifier {
        Some(alias) => match included.get(alias) {
            None => Err(format!("Unknown library alias {} in retrieve", alias)),
            Some(None) => Ok(None),
            Some(Some(value_sets)) => value_sets
                .iter()
                .find(|vs| vs.name == name.name)
                .map(|vs| Some(vs.url.clone()))
                .ok_or_else(|| format!("Undefined valueset {}.\"{}\"", alias, name.name)),
        },
        None => {
            if let Some(vs) = header.value_set(&name.name) {
                Ok(Some(vs.url.clone()))
            } else if header.codes.contains(&name.name) || !name.quoted {
                Ok(None)
            } else {
                Err(format!("Undefined valueset \"{}\"", name.name))
            }
        }
    }
}

/// One data requirement per distinct retrieve, in first-seen order
fn data_requirements(statements: &[Statement]) -> Vec<DataRequirement> {
    let mut requirements: Vec<DataRequirement> = Vec::new();
    for retrieve in statements.iter().flat_map(|s| &s.retrieves) {
        let code_filters = match (&retrieve.code_path, &retrieve.value_set) {
            (Some(path), Some(value_set)) => vec![CodeFilter {
                path: path.clone(),
                value_set: Some(value_set.clone()),
            }],
            _ => Vec::new(),
        };
        let requirement = DataRequirement {
            data_type: retrieve.data_type.clone(),
            profile: Some(format!(
                "http://hl7.org/fhir/StructureDefinition/{}",
                retrieve.data_type
            )),
            code_filters,
        };
        if !requirements.contains(&requirement) {
            requirements.push(requirement);
        }
    }
    requirements
}
