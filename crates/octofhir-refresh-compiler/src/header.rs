//! Library declaration parser using winnow

use crate::combinators::{
    Input, PResult, identifier, keyword, lit, next_declaration_offset, qualified_identifier,
    rest_of_declaration, string_literal, version_clause, ws, ws1,
};
use crate::unit::{IncludeRef, LibraryIdentifier, TerminologyRef, UsingRef};
use octofhir_refresh_diagnostics::{Diagnostic, REF0002, REF0005, Span};
use winnow::combinator::{alt, opt, preceded, terminated};
use winnow::prelude::*;

/// One top-level declaration head
#[derive(Debug, Clone, PartialEq)]
enum Declaration {
    Library(LibraryIdentifier),
    Using(UsingRef),
    Include(IncludeRef),
    CodeSystem(TerminologyRef),
    ValueSet(TerminologyRef),
    Code(String),
    Parameter(String),
    Context(String),
    Define { name: String, function: bool },
}

/// A `define` statement with its unparsed body
#[derive(Debug, Clone, PartialEq)]
pub struct Definition<'a> {
    pub name: String,
    pub context: Option<String>,
    pub private: bool,
    pub function: bool,
    pub body: &'a str,
    /// Byte offset of `body` in the source
    pub offset: usize,
}

/// Declarations of one library, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryHeader<'a> {
    pub library: Option<LibraryIdentifier>,
    pub usings: Vec<UsingRef>,
    pub includes: Vec<IncludeRef>,
    pub code_systems: Vec<TerminologyRef>,
    pub value_sets: Vec<TerminologyRef>,
    /// Names of `code` and `concept` declarations
    pub codes: Vec<String>,
    pub parameters: Vec<String>,
    pub definitions: Vec<Definition<'a>>,
}

impl LibraryHeader<'_> {
    pub fn value_set(&self, name: &str) -> Option<&TerminologyRef> {
        self.value_sets.iter().find(|vs| vs.name == name)
    }

    pub fn include(&self, local_name: &str) -> Option<&IncludeRef> {
        self.includes.iter().find(|i| i.local_name() == local_name)
    }
}

/// Parse the declarations of a comment-free library source
pub fn parse_header(source: &str) -> Result<LibraryHeader<'_>, Vec<Diagnostic>> {
    let mut input: Input<'_> = source;
    let mut header = LibraryHeader::default();
    let mut diagnostics = Vec::new();
    let mut context: Option<String> = None;

    loop {
        ws(&mut input).ok();
        if input.is_empty() {
            break;
        }
        let start = source.len() - input.len();

        match (access_modifier, declaration).parse_next(&mut input) {
            Ok((private, decl)) => {
                let body_start = source.len() - input.len();
                let body = rest_of_declaration(&mut input).unwrap_or_default();
                match decl {
                    Declaration::Library(id) => header.library = Some(id),
                    Declaration::Using(using) => header.usings.push(using),
                    Declaration::Include(include) => header.includes.push(include),
                    Declaration::CodeSystem(cs) => header.code_systems.push(cs),
                    Declaration::ValueSet(vs) => header.value_sets.push(vs),
                    Declaration::Code(name) => header.codes.push(name),
                    Declaration::Parameter(name) => header.parameters.push(name),
                    Declaration::Context(name) => context = Some(name),
                    Declaration::Define { name, function } => header.definitions.push(Definition {
                        name,
                        context: context.clone(),
                        private,
                        function,
                        body,
                        offset: body_start,
                    }),
                }
            }
            Err(_) => {
                let remaining = &source[start..];
                let line = remaining.lines().next().unwrap_or_default().trim_end();
                diagnostics.push(
                    Diagnostic::error(REF0005, format!("Invalid declaration: {}", line))
                        .with_span(Span::new(start, start + line.len()), source),
                );
                input = &remaining[next_declaration_offset(remaining)..];
            }
        }
    }

    if header.library.is_none() {
        diagnostics.insert(
            0,
            Diagnostic::error(REF0002, "Missing library declaration")
                .with_span(Span::point(0), source),
        );
    }

    if diagnostics.is_empty() {
        Ok(header)
    } else {
        Err(diagnostics)
    }
}

/// `public` / `private` prefix, returns whether the declaration is private
fn access_modifier(input: &mut Input<'_>) -> PResult<bool> {
    opt(terminated(
        alt((keyword("public").value(false), keyword("private").value(true))),
        ws1,
    ))
    .map(|private: Option<bool>| private.unwrap_or(false))
    .parse_next(input)
}

fn declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    alt((
        library_declaration,
        using_declaration,
        include_declaration,
        codesystem_declaration,
        valueset_declaration,
        code_declaration,
        concept_declaration,
        parameter_declaration,
        context_declaration,
        define_declaration,
    ))
    .parse_next(input)
}

fn library_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("library"), ws1).parse_next(input)?;
    let name = qualified_identifier(input)?;
    let version = version_clause(input)?;
    Ok(Declaration::Library(LibraryIdentifier { name, version }))
}

fn using_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("using"), ws1).parse_next(input)?;
    let model = identifier(input)?;
    let version = version_clause(input)?;
    Ok(Declaration::Using(UsingRef { model, version }))
}

fn include_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("include"), ws1).parse_next(input)?;
    let name = qualified_identifier(input)?;
    let version = version_clause(input)?;
    let alias = opt(preceded((ws, keyword("called"), ws), identifier)).parse_next(input)?;
    Ok(Declaration::Include(IncludeRef {
        name,
        version,
        alias,
        source_path: None,
    }))
}

/// `<name>: '<url>' [version '<v>']`
fn terminology_definition(input: &mut Input<'_>) -> PResult<TerminologyRef> {
    let name = identifier(input)?;
    (ws, lit(":"), ws).parse_next(input)?;
    let url = string_literal(input)?;
    let version = version_clause(input)?;
    Ok(TerminologyRef { name, url, version })
}

fn codesystem_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("codesystem"), ws1).parse_next(input)?;
    terminology_definition.map(Declaration::CodeSystem).parse_next(input)
}

fn valueset_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("valueset"), ws1).parse_next(input)?;
    terminology_definition.map(Declaration::ValueSet).parse_next(input)
}

fn code_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("code"), ws1).parse_next(input)?;
    let name = identifier(input)?;
    (ws, lit(":"), ws).parse_next(input)?;
    string_literal(input)?;
    (ws, keyword("from"), ws).parse_next(input)?;
    qualified_identifier(input)?;
    Ok(Declaration::Code(name))
}

fn concept_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("concept"), ws1).parse_next(input)?;
    let name = identifier(input)?;
    (ws, lit(":")).parse_next(input)?;
    Ok(Declaration::Code(name))
}

fn parameter_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("parameter"), ws1).parse_next(input)?;
    identifier.map(Declaration::Parameter).parse_next(input)
}

fn context_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("context"), ws1).parse_next(input)?;
    identifier.map(Declaration::Context).parse_next(input)
}

fn define_declaration(input: &mut Input<'_>) -> PResult<Declaration> {
    (keyword("define"), ws1).parse_next(input)?;
    opt((keyword("fluent"), ws1)).parse_next(input)?;
    let function = opt((keyword("function"), ws1)).parse_next(input)?.is_some();
    let name = identifier(input)?;
    if !function {
        (ws, lit(":")).parse_next(input)?;
    }
    Ok(Declaration::Define { name, function })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "library Screening version '1.0.0'

using FHIR version '4.0.1'

include FHIRHelpers version '4.0.1' called FHIRHelpers
include Common version '2.0.0' called C

codesystem \"LOINC\": 'http://loinc.org'
valueset \"Diabetes\": 'http://example.org/fhir/ValueSet/diabetes' version '1'
code \"HbA1c\": '4548-4' from \"LOINC\" display 'HbA1c'

parameter \"Measurement Period\" Interval<DateTime>

context Patient

define \"Has Diabetes\":
  exists [Condition: \"Diabetes\"]

private define function \"Helper\"(x Integer):
  x + 1
";

    #[test]
    fn test_parse_header() {
        let header = parse_header(SOURCE).unwrap();

        assert_eq!(
            header.library,
            Some(LibraryIdentifier {
                name: "Screening".into(),
                version: Some("1.0.0".into())
            })
        );
        assert_eq!(header.usings[0].model, "FHIR");
        assert_eq!(header.includes.len(), 2);
        assert_eq!(header.include("C").unwrap().name, "Common");
        assert_eq!(header.code_systems[0].url, "http://loinc.org");
        assert_eq!(header.value_set("Diabetes").unwrap().version.as_deref(), Some("1"));
        assert_eq!(header.codes, vec!["HbA1c"]);
        assert_eq!(header.parameters, vec!["Measurement Period"]);

        let names: Vec<&str> = header.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Has Diabetes", "Helper"]);
        assert_eq!(header.definitions[0].context.as_deref(), Some("Patient"));
        assert!(header.definitions[0].body.contains("[Condition: \"Diabetes\"]"));
        assert!(header.definitions[1].private && header.definitions[1].function);
    }

    #[test]
    fn test_body_offset_points_into_source() {
        let header = parse_header(SOURCE).unwrap();
        let def = &header.definitions[0];
        assert_eq!(&SOURCE[def.offset..def.offset + def.body.len()], def.body);
    }

    #[test]
    fn test_missing_library_declaration() {
        let errors = parse_header("using FHIR version '4.0.1'\ndefine X: 1\n").unwrap_err();
        assert_eq!(errors[0].code, REF0002);
    }

    #[test]
    fn test_invalid_declaration_is_reported_and_skipped() {
        let errors = parse_header("library A\nvalueset missing colon\ndefine X: 1\n").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, REF0005);
        assert_eq!(errors[0].location.as_ref().unwrap().line, 2);
    }
}
