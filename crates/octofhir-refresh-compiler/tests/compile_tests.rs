//! End-to-end compilation of CQL sources on disk

use octofhir_refresh_compiler::{CqlCompiler, LogicCompiler};
use octofhir_refresh_diagnostics::{REF0002, REF0003, REF0006, REF0007, REF0008, REF0009};
use octofhir_refresh_model::{CodeFilter, Encoding};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const COMMON: &str = "library Common version '2.0.0'

using FHIR version '4.0.1'

valueset \"Office Visit\": 'http://example.org/fhir/ValueSet/office-visit'

define \"Visits\":
  [Encounter: type in \"Office Visit\"]
";

const SCREENING: &str = "// Diabetes screening logic
library Screening version '1.0.0'

using FHIR version '4.0.1'

include FHIRHelpers version '4.0.1' called FHIRHelpers
include Common version '2.0.0' called C

codesystem \"LOINC\": 'http://loinc.org'
valueset \"Diabetes\": 'http://example.org/fhir/ValueSet/diabetes'

context Patient

define \"Has Diabetes\":
  exists [Condition: \"Diabetes\"]

define \"Qualifying Visits\":
  [Encounter: type in C.\"Office Visit\"] E
    with [Condition: \"Diabetes\"] D
      such that D.onset before end of E.period
";

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn guide() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "Common.cql", COMMON);
    let screening = write(dir.path(), "Screening.cql", SCREENING);
    (dir, screening)
}

#[test]
fn test_compiles_header_and_requirements() {
    let (_dir, screening) = guide();
    let unit = CqlCompiler::new().compile(&screening, &[]).unwrap();

    assert_eq!(unit.identifier.name, "Screening");
    assert_eq!(unit.identifier.version.as_deref(), Some("1.0.0"));
    assert_eq!(unit.includes.len(), 2);
    assert!(unit.includes[0].source_path.is_none(), "FHIRHelpers is built in");
    assert!(unit.includes[1].source_path.as_ref().unwrap().ends_with("Common.cql"));

    let urls: Vec<&str> = unit.terminology_urls().collect();
    assert_eq!(
        urls,
        vec!["http://example.org/fhir/ValueSet/diabetes", "http://loinc.org"]
    );

    let requirements: Vec<(&str, Vec<CodeFilter>)> = unit
        .data_requirements
        .iter()
        .map(|dr| (dr.data_type.as_str(), dr.code_filters.clone()))
        .collect();
    assert_eq!(
        requirements,
        vec![
            (
                "Condition",
                vec![CodeFilter {
                    path: "code".into(),
                    value_set: Some("http://example.org/fhir/ValueSet/diabetes".into()),
                }]
            ),
            (
                "Encounter",
                vec![CodeFilter {
                    path: "type".into(),
                    value_set: Some("http://example.org/fhir/ValueSet/office-visit".into()),
                }]
            ),
        ]
    );
}

#[test]
fn test_elm_serializations() {
    let (_dir, screening) = guide();
    let unit = CqlCompiler::new().compile(&screening, &[]).unwrap();

    let elm: serde_json::Value = serde_json::from_str(unit.elm(Encoding::Json)).unwrap();
    assert_eq!(elm["library"]["identifier"]["id"], "Screening");
    assert_eq!(elm["library"]["includes"]["def"][1]["localIdentifier"], "C");
    assert_eq!(
        elm["library"]["statements"]["def"][1]["expression"]["type"],
        "Union"
    );

    let xml = unit.elm(Encoding::Xml);
    assert!(xml.contains("urn:hl7-org:elm:r1"));
    assert!(xml.contains("libraryName=\"C\""));
}

#[test]
fn test_include_path_and_versioned_file_name() {
    let dir = TempDir::new().unwrap();
    let libs = dir.path().join("libs");
    fs::create_dir(&libs).unwrap();
    write(&libs, "Common-2.0.0.cql", COMMON);
    let main = dir.path().join("main");
    fs::create_dir(&main).unwrap();
    let screening = write(&main, "Screening.cql", SCREENING);

    let unit = CqlCompiler::new().compile(&screening, &[libs.clone()]).unwrap();
    assert_eq!(
        unit.includes[1].source_path.as_deref(),
        Some(libs.join("Common-2.0.0.cql").as_path())
    );
}

#[rstest]
#[case::missing_library("define X: 1\n", REF0002)]
#[case::unterminated_string("library A version '1.0\n", REF0003)]
#[case::missing_include("library A\ninclude Nowhere version '1' called N\n", REF0006)]
#[case::undefined_valueset("library A\ndefine X: [Condition: \"Nope\"]\n", REF0007)]
#[case::unbalanced_brackets("library A\ndefine X: [Condition\n", REF0008)]
fn test_compile_failures(
    #[case] source: &str,
    #[case] code: octofhir_refresh_diagnostics::ErrorCode,
) {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "A.cql", source);

    let failure = CqlCompiler::new().compile(&path, &[]).unwrap_err();
    assert!(!failure.diagnostics.is_empty());
    assert_eq!(failure.diagnostics[0].code, code);
    assert_eq!(failure.diagnostics[0].file.as_deref(), Some(path.as_path()));
}

#[test]
fn test_unreadable_source() {
    let dir = TempDir::new().unwrap();
    let failure = CqlCompiler::new()
        .compile(&dir.path().join("Missing.cql"), &[])
        .unwrap_err();
    assert_eq!(failure.diagnostics[0].code, REF0009);
}

#[test]
fn test_failure_converts_to_compilation_error() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "A.cql", "define X: 1\n");
    let failure = CqlCompiler::new().compile(&path, &[]).unwrap_err();

    let error: octofhir_refresh_diagnostics::RefreshError = failure.into();
    assert!(error.code().is_compilation_error());
    assert!(error.message().contains("Missing library declaration"));
}
