//! Validation tests over fixture tables.

use neurograph::analyzer::validator::{FixSource, Resolution};
use neurograph::export::read_table;
use neurograph::graph::{BuildOptions, UnseenNodePolicy};
use neurograph::parser::Table;
use neurograph::prelude::*;
use neurograph::{ResolutionPolicy, Validator};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixture(name: &str) -> Table {
    read_table(&fixture_path(name)).unwrap()
}

#[test]
fn test_validate_complete_tables() {
    let result = NeurographCore::validate_files(
        &fixture_path("edges.json"),
        &fixture_path("nodes.json"),
        &ValidationOptions::default(),
    )
    .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.stats.errors, 0);
    // The unconfirmed mli2_2 -> mli1_3 row is reported, not added.
    assert_eq!(result.stats.info, 1);
    assert_eq!(result.report.build.unconfirmed_edges, 1);
    assert_eq!(result.report.build.blank_rows, 1);
    assert_eq!(result.graph().synapse_count(), 11);
    assert!(result.source.is_some());

    // mli2_2 only appears in a node row and is created by default.
    assert_eq!(result.graph().cell_type("mli2_2"), Some(CellType::Mli2));
}

#[test]
fn test_skip_unseen_nodes() {
    let options = ValidationOptions {
        build: BuildOptions {
            unseen_nodes: UnseenNodePolicy::Skip,
            ..BuildOptions::default()
        },
        policy: ResolutionPolicy::default(),
    };
    let result =
        NeurographCore::validate_tables(&fixture("edges.json"), &fixture("nodes.json"), &options).unwrap();
    assert!(!result.graph().contains("mli2_2"));
    assert_eq!(result.report.build.nodes_skipped, 1);
}

#[test]
fn test_incomplete_nodes_reported_with_guesses() {
    let validator = Validator::default();
    let inspection = validator
        .inspect(&fixture("edges.json"), &fixture("nodes_incomplete.json"))
        .unwrap();
    let report = &inspection.report;

    let ids: Vec<&str> = report.incomplete_nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["mli1_1", "grc_1", "pc_1"]);
    assert_eq!(report.incomplete_nodes[0].row, Some(5));
    assert_eq!(report.incomplete_nodes[1].row, None);
    assert_eq!(report.incomplete_nodes[2].classifier_guess, CellType::Pc);
    assert!(report.incomplete_edges.is_empty());

    let issues = report.issues();
    let missing: Vec<_> = issues.iter().filter(|i| i.rule_id == "missing_cell_type").collect();
    assert_eq!(missing.len(), 3);
    assert!(missing.iter().all(|i| i.severity == Severity::Error));
    assert_eq!(
        missing[0].suggestion.as_deref(),
        Some("Classifier suggests cell_type:MLI1")
    );
}

#[test]
fn test_resolution_without_policy_is_incomplete() {
    let resolution = Validator::default()
        .validate(&fixture("edges.json"), &fixture("nodes_incomplete.json"), &ResolutionPolicy::default())
        .unwrap();
    assert!(!resolution.is_complete());
    assert_eq!(resolution.unresolved().len(), 3);

    let err = resolution.into_graph().unwrap_err();
    match err {
        NeurographError::MissingAttribute { attribute, subjects } => {
            assert_eq!(attribute, "cell_type");
            assert_eq!(subjects, vec!["mli1_1", "grc_1", "pc_1"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_resolution_policy_precedence() {
    let policy = ResolutionPolicy::auto()
        .with_override("pc_1", CellType::Interneuron)
        .with_skip("grc_1");
    let resolution = Validator::default()
        .validate(&fixture("edges.json"), &fixture("nodes_incomplete.json"), &policy)
        .unwrap();

    let applied = resolution.applied();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0].node, "mli1_1");
    assert_eq!(applied[0].source, FixSource::Classifier);
    assert_eq!(applied[1].node, "pc_1");
    assert_eq!(applied[1].cell_type, CellType::Interneuron);
    assert_eq!(applied[1].source, FixSource::Override);

    match &resolution {
        Resolution::Incomplete { unresolved, .. } => {
            assert_eq!(unresolved.len(), 1);
            assert_eq!(unresolved[0].id, "grc_1");
        }
        Resolution::Complete { .. } => panic!("grc_1 was skipped"),
    }
}

#[test]
fn test_auto_classify_completes_graph() {
    let resolution = Validator::default()
        .validate(&fixture("edges.json"), &fixture("nodes_incomplete.json"), &ResolutionPolicy::auto())
        .unwrap();
    assert!(resolution.is_complete());
    let graph = resolution.into_graph().unwrap();
    assert!(graph.neurons().all(|n| n.cell_type.is_some()));
    assert_eq!(graph.cell_type("grc_1"), Some(CellType::Grc));
}

#[test]
fn test_duplicate_coordinate_names_both_rows() {
    let err = Validator::default()
        .inspect(&fixture("edges_duplicate.json"), &fixture("nodes.json"))
        .unwrap_err();
    match err {
        NeurographError::DuplicateCoordinate { first_row, second_row, .. } => {
            assert_eq!(first_row, Some(1));
            assert_eq!(second_row, Some(3));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_duplicate_node_definition() {
    let nodes = vec![
        vec!["pc_2", "cell_type:pc"],
        vec!["cf_13", "cell_type:cf"],
        vec![" pc_2 ", "red"],
    ];
    let edges: Vec<Vec<&str>> = vec![];
    let err = Validator::default().inspect(&edges, &nodes).unwrap_err();
    assert!(matches!(
        err,
        NeurographError::DuplicateNodeDefinition { ref node, first_row: 1, second_row: 3 } if node == "pc_2"
    ));
}

#[test]
fn test_missing_edge_coordinate_fails_batch() {
    let edges = vec![
        vec!["cf_13", "mli2_1", "", "confirmed"],
        vec!["cf_13", "mli1_1", "(1,2,3)", "confirmed"],
    ];
    let nodes: Vec<Vec<&str>> = vec![];
    let validator = Validator::default();
    let inspection = validator.inspect(&edges, &nodes).unwrap();
    assert_eq!(inspection.report.incomplete_edges.len(), 1);
    assert_eq!(inspection.report.stats().errors, 4);

    let err = validator.resolve(inspection, &ResolutionPolicy::auto()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing required attribute 'coord' on: cf_13 -> mli2_1 (row 1)"
    );
}

#[test]
fn test_empty_cell_type_is_reported_as_missing() {
    let edges = vec![vec!["cf_13", "mli2_1", "(1,2,3)", "confirmed"]];
    let nodes = vec![vec!["cf_13", "cell_type:cf"], vec!["mli2_1", "cell_type:"]];
    let inspection = Validator::default().inspect(&edges, &nodes).unwrap();
    let report = &inspection.report;
    assert_eq!(report.incomplete_nodes.len(), 1);
    assert_eq!(report.incomplete_nodes[0].id, "mli2_1");
    assert_eq!(report.incomplete_nodes[0].row, Some(2));
    assert_eq!(report.incomplete_nodes[0].classifier_guess, CellType::Mli2);
}
