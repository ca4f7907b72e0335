//! Table validation and non-interactive repair.
//!
//! `Validator::inspect` builds the graph and lists what is missing;
//! `Validator::resolve` applies a caller-supplied `ResolutionPolicy` to that
//! report. Operator interaction, if any, happens between the two calls.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::classifier::CellTypeClassifier;
use super::issues::{Issue, Severity, ValidationStats};
use crate::core::{NeurographError, Result};
use crate::graph::builder::{BuildOptions, BuildStats, GraphBuilder};
use crate::graph::schema::{CellType, CELL_TYPE_KEY, COORD_KEY};
use crate::graph::ConnectomeGraph;
use crate::parser::{is_blank_row, trim_table};

/// A neuron without a required attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteNode {
    pub id: String,
    /// Row in the node table; `None` when the neuron only appears in edges.
    pub row: Option<usize>,
    pub missing_attr: String,
    pub classifier_guess: CellType,
}

/// A confirmed synapse without a required attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteEdge {
    pub pre: String,
    pub post: String,
    pub row: Option<usize>,
    pub missing_attr: String,
}

impl IncompleteEdge {
    fn label(&self) -> String {
        match self.row {
            Some(row) => format!("{} -> {} (row {})", self.pre, self.post, row),
            None => format!("{} -> {}", self.pre, self.post),
        }
    }
}

/// Everything `inspect` found missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub incomplete_nodes: Vec<IncompleteNode>,
    pub incomplete_edges: Vec<IncompleteEdge>,
    pub build: BuildStats,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.incomplete_nodes.is_empty() && self.incomplete_edges.is_empty()
    }

    pub fn issues(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        for edge in &self.incomplete_edges {
            issues.push(
                Issue::new(
                    "missing_coord",
                    Severity::Error,
                    format!(
                        "Edge from {} to {} is missing attribute {}",
                        edge.pre, edge.post, edge.missing_attr
                    ),
                )
                .with_subject(format!("{} -> {}", edge.pre, edge.post))
                .with_row(edge.row)
                .with_suggestion("Add the synapse coordinate to the edge table"),
            );
        }

        for node in &self.incomplete_nodes {
            let issue = Issue::new(
                "missing_cell_type",
                Severity::Error,
                format!("Node {} is missing attribute {}", node.id, node.missing_attr),
            )
            .with_subject(node.id.clone())
            .with_row(node.row);
            let issue = if node.classifier_guess == CellType::Unknown {
                issue
            } else {
                issue.with_suggestion(format!(
                    "Classifier suggests {}:{}",
                    CELL_TYPE_KEY, node.classifier_guess
                ))
            };
            issues.push(issue);
        }

        if self.build.unconfirmed_edges > 0 {
            issues.push(Issue::new(
                "unconfirmed_edges",
                Severity::Info,
                format!(
                    "{} unconfirmed edge rows were not added to the graph",
                    self.build.unconfirmed_edges
                ),
            ));
        }

        issues
    }

    pub fn stats(&self) -> ValidationStats {
        ValidationStats::from_issues(&self.issues())
    }
}

/// Graph plus report, as returned by `Validator::inspect`.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub graph: ConnectomeGraph,
    pub report: ValidationReport,
}

/// How to repair incomplete nodes.
///
/// Precedence per node: override, then skip, then classifier (if enabled).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Fill missing cell types from the classifier.
    #[serde(default)]
    pub auto_classify: bool,

    /// Explicit cell types for specific neurons.
    #[serde(default)]
    pub overrides: HashMap<String, CellType>,

    /// Neurons to leave unresolved.
    #[serde(default)]
    pub skip: HashSet<String>,
}

impl ResolutionPolicy {
    pub fn auto() -> Self {
        Self {
            auto_classify: true,
            ..Self::default()
        }
    }

    pub fn with_override(mut self, id: impl Into<String>, cell_type: CellType) -> Self {
        self.overrides.insert(id.into(), cell_type);
        self
    }

    pub fn with_skip(mut self, id: impl Into<String>) -> Self {
        self.skip.insert(id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixSource {
    Override,
    Classifier,
}

/// A cell type written during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFix {
    pub node: String,
    pub cell_type: CellType,
    pub source: FixSource,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Complete {
        graph: ConnectomeGraph,
        applied: Vec<AppliedFix>,
    },
    Incomplete {
        graph: ConnectomeGraph,
        applied: Vec<AppliedFix>,
        unresolved: Vec<IncompleteNode>,
    },
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        matches!(self, Resolution::Complete { .. })
    }

    pub fn graph(&self) -> &ConnectomeGraph {
        match self {
            Resolution::Complete { graph, .. } | Resolution::Incomplete { graph, .. } => graph,
        }
    }

    pub fn applied(&self) -> &[AppliedFix] {
        match self {
            Resolution::Complete { applied, .. } | Resolution::Incomplete { applied, .. } => applied,
        }
    }

    pub fn unresolved(&self) -> &[IncompleteNode] {
        match self {
            Resolution::Complete { .. } => &[],
            Resolution::Incomplete { unresolved, .. } => unresolved,
        }
    }

    /// The graph, or `MissingAttribute` naming every unresolved neuron.
    pub fn into_graph(self) -> Result<ConnectomeGraph> {
        match self {
            Resolution::Complete { graph, .. } => Ok(graph),
            Resolution::Incomplete { unresolved, .. } => Err(NeurographError::MissingAttribute {
                attribute: CELL_TYPE_KEY.to_string(),
                subjects: unresolved.into_iter().map(|n| n.id).collect(),
            }),
        }
    }
}

pub struct Validator {
    build: BuildOptions,
    classifier: CellTypeClassifier,
}

impl Validator {
    pub fn new(build: BuildOptions) -> Self {
        Self {
            build,
            classifier: CellTypeClassifier::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: CellTypeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Build the graph from trimmed tables and list missing attributes.
    pub fn inspect<R: AsRef<str>>(&self, edge_table: &[Vec<R>], node_table: &[Vec<R>]) -> Result<Inspection> {
        let edge_table = trim_table(edge_table);
        let node_table = trim_table(node_table);

        let node_rows = index_node_rows(&node_table)?;

        let mut builder = GraphBuilder::new(self.build.clone());
        builder.add_edge_rows(&edge_table)?;
        builder.add_node_rows(&node_table)?;
        let build = builder.stats().clone();
        let graph = builder.finish();

        let incomplete_nodes: Vec<IncompleteNode> = graph
            .neurons()
            .filter(|n| n.cell_type.is_none())
            .map(|n| IncompleteNode {
                id: n.id.clone(),
                row: node_rows.get(n.id.as_str()).copied(),
                missing_attr: CELL_TYPE_KEY.to_string(),
                classifier_guess: self.classifier.classify(&n.id),
            })
            .collect();

        let incomplete_edges: Vec<IncompleteEdge> = graph
            .synapses()
            .filter(|s| s.synapse.coord.is_none())
            .map(|s| IncompleteEdge {
                pre: s.pre.to_string(),
                post: s.post.to_string(),
                row: s.synapse.row,
                missing_attr: COORD_KEY.to_string(),
            })
            .collect();

        tracing::debug!(
            "Inspection found {} incomplete nodes and {} incomplete edges",
            incomplete_nodes.len(),
            incomplete_edges.len()
        );

        Ok(Inspection {
            graph,
            report: ValidationReport {
                incomplete_nodes,
                incomplete_edges,
                build,
            },
        })
    }

    /// Apply `policy` to an inspection.
    ///
    /// Edges without a coordinate cannot be repaired and fail the batch.
    pub fn resolve(&self, inspection: Inspection, policy: &ResolutionPolicy) -> Result<Resolution> {
        let Inspection { mut graph, report } = inspection;

        if !report.incomplete_edges.is_empty() {
            return Err(NeurographError::MissingAttribute {
                attribute: COORD_KEY.to_string(),
                subjects: report.incomplete_edges.iter().map(IncompleteEdge::label).collect(),
            });
        }

        let mut applied = Vec::new();
        let mut unresolved = Vec::new();
        for node in report.incomplete_nodes {
            let fix = if let Some(&cell_type) = policy.overrides.get(&node.id) {
                Some((cell_type, FixSource::Override))
            } else if policy.skip.contains(&node.id) {
                None
            } else if policy.auto_classify && node.classifier_guess != CellType::Unknown {
                Some((node.classifier_guess, FixSource::Classifier))
            } else {
                None
            };

            match fix {
                Some((cell_type, source)) => {
                    graph.set_cell_type(&node.id, cell_type)?;
                    tracing::debug!("{}: {} ({:?})", node.id, cell_type, source);
                    applied.push(AppliedFix {
                        node: node.id,
                        cell_type,
                        source,
                    });
                }
                None => unresolved.push(node),
            }
        }

        for id in policy.overrides.keys() {
            if !applied.iter().any(|fix| &fix.node == id) {
                tracing::debug!("Override for {} was not needed", id);
            }
        }

        if unresolved.is_empty() {
            Ok(Resolution::Complete { graph, applied })
        } else {
            tracing::info!("{} neurons remain without a cell type", unresolved.len());
            Ok(Resolution::Incomplete {
                graph,
                applied,
                unresolved,
            })
        }
    }

    /// `inspect` followed by `resolve`.
    pub fn validate<R: AsRef<str>>(
        &self,
        edge_table: &[Vec<R>],
        node_table: &[Vec<R>],
        policy: &ResolutionPolicy,
    ) -> Result<Resolution> {
        let inspection = self.inspect(edge_table, node_table)?;
        self.resolve(inspection, policy)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(BuildOptions::default())
    }
}

/// Map node id → 1-based row, failing on the first repeated id.
fn index_node_rows(node_table: &[Vec<String>]) -> Result<HashMap<&str, usize>> {
    let mut rows: HashMap<&str, usize> = HashMap::new();
    for (i, row) in node_table.iter().enumerate() {
        if is_blank_row(row) {
            continue;
        }
        let Some(id) = row.first().map(String::as_str).filter(|id| !id.is_empty()) else {
            continue;
        };
        if let Some(&first_row) = rows.get(id) {
            return Err(NeurographError::DuplicateNodeDefinition {
                node: id.to_string(),
                first_row,
                second_row: i + 1,
            });
        }
        rows.insert(id, i + 1);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn sample_edges() -> Vec<Vec<String>> {
        table(&[
            &["cf_1 ", "mli2_5", "(10,20,30)", "confirmed"],
            &["mli2_5", "pc_1", "(11,20,30)", "confirmed"],
            &["grc_2", "pc_1", "(12,20,30)", "confirmed", "pf"],
            &["x_9", "pc_1", "(13,20,30)", "nope"],
        ])
    }

    fn sample_nodes() -> Vec<Vec<String>> {
        table(&[&["cf_1", "cell_type:cf"], &["mli2_5", "cell_type:MLI2"], &["pc_1"]])
    }

    #[test]
    fn test_inspect_reports_missing_cell_types() {
        let inspection = Validator::default()
            .inspect(&sample_edges(), &sample_nodes())
            .unwrap();
        let report = &inspection.report;

        let ids: Vec<&str> = report.incomplete_nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["pc_1", "grc_2"]);
        assert_eq!(report.incomplete_nodes[0].row, Some(3));
        assert_eq!(report.incomplete_nodes[0].classifier_guess, CellType::Pc);
        assert_eq!(report.incomplete_nodes[1].row, None);
        assert!(report.incomplete_edges.is_empty());
        assert_eq!(report.build.unconfirmed_edges, 1);

        let stats = report.stats();
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.info, 1);
    }

    #[test]
    fn test_duplicate_node_definition() {
        let nodes = table(&[&["a", "cell_type:pc"], &[""], &["a", "red"]]);
        let err = Validator::default().inspect(&sample_edges(), &nodes).unwrap_err();
        match err {
            NeurographError::DuplicateNodeDefinition {
                node,
                first_row,
                second_row,
            } => {
                assert_eq!(node, "a");
                assert_eq!((first_row, second_row), (1, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_auto() {
        let resolution = Validator::default()
            .validate(&sample_edges(), &sample_nodes(), &ResolutionPolicy::auto())
            .unwrap();
        assert!(resolution.is_complete());
        assert_eq!(resolution.applied().len(), 2);
        let graph = resolution.into_graph().unwrap();
        assert_eq!(graph.cell_type("grc_2"), Some(CellType::Grc));
    }

    #[test]
    fn test_resolve_override_skip_precedence() {
        let policy = ResolutionPolicy::auto()
            .with_override("grc_2", CellType::Interneuron)
            .with_skip("grc_2")
            .with_skip("pc_1");
        let resolution = Validator::default()
            .validate(&sample_edges(), &sample_nodes(), &policy)
            .unwrap();

        assert!(!resolution.is_complete());
        assert_eq!(
            resolution.applied(),
            &[AppliedFix {
                node: "grc_2".into(),
                cell_type: CellType::Interneuron,
                source: FixSource::Override,
            }]
        );
        assert_eq!(resolution.unresolved()[0].id, "pc_1");

        let err = resolution.into_graph().unwrap_err();
        assert!(matches!(err, NeurographError::MissingAttribute { ref attribute, .. } if attribute == "cell_type"));
    }

    #[test]
    fn test_default_policy_leaves_everything_unresolved() {
        let resolution = Validator::default()
            .validate(&sample_edges(), &sample_nodes(), &ResolutionPolicy::default())
            .unwrap();
        assert_eq!(resolution.unresolved().len(), 2);
        assert!(resolution.applied().is_empty());
    }

    #[test]
    fn test_edge_without_coord_fails_batch() {
        let edges = table(&[
            &["cf_1", "mli2_5", "(10,20,30)", "confirmed"],
            &["cf_1", "mli2_6", "", "confirmed"],
        ]);
        let validator = Validator::default();
        let inspection = validator.inspect(&edges, &sample_nodes()).unwrap();
        assert_eq!(inspection.report.incomplete_edges.len(), 1);
        assert_eq!(inspection.report.incomplete_edges[0].row, Some(2));

        let err = validator.resolve(inspection, &ResolutionPolicy::auto()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required attribute 'coord' on: cf_1 -> mli2_6 (row 2)"
        );
    }
}
