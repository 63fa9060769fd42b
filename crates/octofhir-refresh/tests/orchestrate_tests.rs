//! End-to-end refresh runs over guides on disk

mod common;

use common::*;
use octofhir_refresh::model::{FileResourceStore, ResourceStore, ResourceType};
use octofhir_refresh::{Disposition, Orchestrator, RefreshContext, RefreshReport};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn run(context: RefreshContext) -> RefreshReport {
    Orchestrator::new(Arc::new(context))
        .run(CancellationToken::new())
        .await
}

/// L1 (no dependencies), L2 (includes L1) and measure M on L2
fn scenario_guide() -> GuideBuilder {
    let guide = GuideBuilder::new();
    guide.cql("L1", &library_source("L1", &[], &[]));
    guide.cql("L2", &library_source("L2", &["L1"], &[]));
    guide.json("input/resources/measure/M.json", &measure("M", "L2"));
    guide
}

#[tokio::test]
async fn test_one_bad_source_does_not_stop_the_run() {
    let guide = GuideBuilder::new();
    guide.cql("L1", &library_source("L1", &[], &[]));
    guide.cql("L2", "define \"Broken\":\n  [Patient\n");
    guide.cql("L3", &library_source("L3", &[], &[]));

    let report = run(guide.context(guide.settings(|_| {}))).await;

    assert_eq!(report.disposition_of(&ResourceType::Library, "L1"), Some(Disposition::Bundled));
    assert_eq!(report.disposition_of(&ResourceType::Library, "L2"), Some(Disposition::Failed));
    assert_eq!(report.disposition_of(&ResourceType::Library, "L3"), Some(Disposition::Bundled));
    assert!(guide.path("bundles/library/L1/L1-bundle.json").is_file());
    assert!(guide.path("bundles/library/L3/L3-bundle.json").is_file());
    assert!(!guide.path("bundles/library/L2").exists());

    let failed = report.get(&ResourceType::Library, "L2").unwrap();
    assert!(failed.message.as_deref().unwrap().starts_with("REF0"));
}

#[rstest]
#[case::transitive(true, vec!["Library/L1", "Library/L2", "Measure/M"])]
#[case::direct_only(false, vec!["Library/L2", "Measure/M"])]
#[tokio::test]
async fn test_measure_bundle_members(#[case] include_dependencies: bool, #[case] expected: Vec<&str>) {
    let guide = scenario_guide();
    let settings = guide.settings(|c| {
        c.include_dependencies = include_dependencies;
        c.include_terminology = false;
    });

    let report = run(guide.context(settings)).await;

    assert_eq!(report.disposition_of(&ResourceType::Measure, "M"), Some(Disposition::Bundled));
    assert_eq!(guide.bundle_members("bundles/measure/M/M-bundle.json"), expected);

    let files = guide.path("bundles/measure/M/M-files");
    assert!(files.join("measure-M.json").is_file());
    assert!(files.join("library-L2.json").is_file());
    assert!(guide.bundle_members("bundles/measure/M/M-files/valuesets-M-bundle.json").is_empty());
    assert_eq!(
        guide.bundle_members("bundles/measure/M/M-files/library-deps-M-bundle.json"),
        vec!["Library/L1", "Library/L2"]
    );
}

#[tokio::test]
async fn test_measure_refresh_keeps_authored_fields() {
    let guide = scenario_guide();
    run(guide.context(guide.settings(|_| {}))).await;

    let measure = FileResourceStore::new()
        .read(&guide.path("input/resources/measure/M.json"))
        .unwrap()
        .unwrap();
    assert_eq!(measure.title(), Some("M measure"));
    assert_eq!(measure.status(), Some("draft"));

    let related: Vec<&str> = measure
        .array("relatedArtifact")
        .iter()
        .filter_map(|ra| ra.get("resource").and_then(Value::as_str))
        .collect();
    assert_eq!(
        related,
        vec![
            "http://example.org/fhir/Library/L2",
            "http://example.org/fhir/Library/L1"
        ]
    );
}

#[tokio::test]
async fn test_terminology_is_bundled_and_missing_terminology_is_reported() {
    let guide = GuideBuilder::new();
    let diabetes = "http://example.org/fhir/ValueSet/diabetes";
    let missing = "http://example.org/fhir/ValueSet/missing";
    guide.cql(
        "L1",
        &library_source("L1", &[], &[("Diabetes", diabetes), ("Missing", missing)]),
    );
    guide.json("input/vocabulary/valueset/diabetes.json", &value_set("diabetes", diabetes));

    let report = run(guide.context(guide.settings(|c| c.include_terminology = true))).await;

    let l1 = report.get(&ResourceType::Library, "L1").unwrap();
    assert_eq!(l1.disposition, Disposition::Bundled);
    assert_eq!(l1.warnings.len(), 1);
    assert!(l1.warnings[0].contains(missing));
    assert_eq!(
        guide.bundle_members("bundles/library/L1/L1-bundle.json"),
        vec!["Library/L1", "ValueSet/diabetes"]
    );
    assert_eq!(
        guide.bundle_members("bundles/library/L1/L1-files/valuesets-L1-bundle.json"),
        vec!["ValueSet/diabetes"]
    );
}

#[tokio::test]
async fn test_measure_without_library_is_not_bundled() {
    let guide = GuideBuilder::new();
    guide.json("input/resources/measure/N.json", &measure("N", "Nowhere"));

    let report = run(guide.context(guide.settings(|_| {}))).await;

    let n = report.get(&ResourceType::Measure, "N").unwrap();
    assert_eq!(n.disposition, Disposition::RefreshedNotBundled);
    assert!(n.message.as_deref().unwrap().contains("REF0103"));
    assert!(!guide.path("bundles/measure/N").exists());
}

#[tokio::test]
async fn test_measure_and_library_sharing_a_name_get_separate_packages() {
    let guide = GuideBuilder::new();
    guide.cql("EXM", &library_source("EXM", &[], &[]));
    guide.json("input/resources/measure/EXM.json", &measure("EXM", "EXM"));

    let report = run(guide.context(guide.settings(|_| {}))).await;

    let library = report.get(&ResourceType::Library, "EXM").unwrap();
    let measure = report.get(&ResourceType::Measure, "EXM").unwrap();
    assert_eq!(library.disposition, Disposition::Bundled);
    assert_eq!(measure.disposition, Disposition::Bundled);
    assert_ne!(library.bundle, measure.bundle);

    assert_eq!(
        guide.bundle_members("bundles/library/EXM/EXM-bundle.json"),
        vec!["Library/EXM"]
    );
    assert_eq!(
        guide.bundle_members("bundles/measure/EXM/EXM-bundle.json"),
        vec!["Library/EXM", "Measure/EXM"]
    );
    assert!(guide.path("bundles/measure/EXM/EXM-files/measure-EXM.json").is_file());
    assert!(guide.path("bundles/library/EXM/EXM-files/library-EXM.json").is_file());
}

#[tokio::test]
async fn test_missing_value_set_used_in_a_retrieve_is_reported_once() {
    let guide = GuideBuilder::new();
    let missing = "http://example.org/fhir/ValueSet/missing";
    guide.cql("L1", &library_source("L1", &[], &[("Missing", missing)]));

    let report = run(guide.context(guide.settings(|c| c.include_terminology = true))).await;

    let l1 = report.get(&ResourceType::Library, "L1").unwrap();
    assert_eq!(l1.disposition, Disposition::Bundled);
    assert_eq!(l1.warnings.len(), 1);
    assert!(l1.warnings[0].contains(missing));
}

#[tokio::test]
async fn test_second_run_is_byte_identical() {
    let guide = scenario_guide();
    let library = guide.path("input/resources/library/L2.json");
    let measure = guide.path("input/resources/measure/M.json");

    run(guide.context(guide.settings(|_| {}))).await;
    let first = (fs::read(&library).unwrap(), fs::read(&measure).unwrap());

    run(guide.context(guide.settings(|_| {}))).await;
    let second = (fs::read(&library).unwrap(), fs::read(&measure).unwrap());

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_existing_library_is_refreshed_in_place() {
    let guide = GuideBuilder::new();
    guide.cql("Screening", &library_source("Screening", &[], &[]));
    let authored = guide.json(
        "input/resources/library/library-screening.json",
        &serde_json::json!({
            "resourceType": "Library",
            "id": "screening-logic",
            "url": "http://example.org/fhir/Library/Screening",
            "name": "Screening",
            "title": "Screening logic",
            "status": "draft"
        }),
    );

    run(guide.context(guide.settings(|_| {}))).await;

    let library = FileResourceStore::new().read(&authored).unwrap().unwrap();
    assert_eq!(library.id(), Some("screening-logic"));
    assert_eq!(library.title(), Some("Screening logic"));
    assert_eq!(library.array("content").len(), 2);
    assert!(!guide.path("input/resources/library/Screening.json").exists());
}

#[tokio::test]
async fn test_fixtures_and_interaction_logs_in_sidecar() {
    let guide = GuideBuilder::new();
    guide.cql("L1", &library_source("L1", &[], &[]));
    guide.json(
        "input/tests/Library/L1/patient.json",
        &serde_json::json!({ "resourceType": "Patient", "gender": "female" }),
    );
    guide.file("requests/L1/post.json", "{\"request\": true}");
    guide.file("responses/L1/post.json", "{\"response\": true}");

    let report = run(guide.context(guide.settings(|c| c.include_tests = true))).await;
    assert_eq!(report.count(Disposition::Bundled), 1);

    let files = guide.path("bundles/library/L1/L1-files");
    assert!(files.join("tests-L1-bundle.json").is_file());
    assert_eq!(
        fs::read_to_string(files.join("requests/post.json")).unwrap(),
        "{\"request\": true}"
    );
    assert!(files.join("responses/post.json").is_file());

    let members = guide.bundle_members("bundles/library/L1/L1-bundle.json");
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m.starts_with("Patient/L1-bundle-")));
}

#[tokio::test]
async fn test_xml_output() {
    let guide = GuideBuilder::new();
    guide.cql("L1", &library_source("L1", &[], &[]));

    let settings = guide.settings(|c| c.encoding = octofhir_refresh::model::Encoding::Xml);
    let report = run(guide.context(settings)).await;

    assert_eq!(report.count(Disposition::Bundled), 1);
    assert!(guide.path("input/resources/library/L1.xml").is_file());
    assert_eq!(guide.bundle_members("bundles/library/L1/L1-bundle.xml"), vec!["Library/L1"]);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch() {
    let guide = GuideBuilder::new();
    for name in ["A", "B", "C"] {
        guide.cql(name, &library_source(name, &[], &[]));
    }
    let token = CancellationToken::new();
    let compiler = Arc::new(FakeCompiler::cancelling(token.clone()));
    let settings = guide.settings(|c| c.jobs = Some(1));
    let context = guide.context_with(settings, compiler.clone());

    let report = Orchestrator::new(Arc::new(context)).run(token).await;

    assert_eq!(compiler.calls().len(), 1);
    assert_eq!(
        report.disposition_of(&ResourceType::Library, "A"),
        Some(Disposition::RefreshedNotBundled)
    );
    for name in ["B", "C"] {
        let artifact = report.get(&ResourceType::Library, name).unwrap();
        assert_eq!(artifact.disposition, Disposition::Failed);
        assert_eq!(artifact.message.as_deref(), Some("not processed: run cancelled"));
    }
    let leftovers = fs::read_dir(guide.path("bundles"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_publish_retries_once() {
    let guide = GuideBuilder::new();
    guide.cql("L1", &library_source("L1", &[], &[]));
    let publisher = Arc::new(RecordingPublisher::failing(1));
    let context = guide
        .context(guide.settings(|_| {}))
        .with_publisher(publisher.clone());

    let report = run(context).await;

    assert_eq!(publisher.attempts(), 2);
    assert_eq!(publisher.published(), vec!["L1"]);
    assert!(report.get(&ResourceType::Library, "L1").unwrap().publish_error.is_none());
}

#[tokio::test]
async fn test_publish_failure_keeps_local_bundle() {
    let guide = GuideBuilder::new();
    guide.cql("L1", &library_source("L1", &[], &[]));
    let publisher = Arc::new(RecordingPublisher::failing(usize::MAX));
    let context = guide
        .context(guide.settings(|_| {}))
        .with_publisher(publisher.clone());

    let report = run(context).await;

    let l1 = report.get(&ResourceType::Library, "L1").unwrap();
    assert_eq!(publisher.attempts(), 2);
    assert_eq!(l1.disposition, Disposition::Bundled);
    assert!(l1.publish_error.as_deref().unwrap().contains("HTTP 503"));
    assert!(guide.path("bundles/library/L1/L1-bundle.json").is_file());
}
