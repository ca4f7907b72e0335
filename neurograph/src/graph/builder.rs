//! Graph construction from edge and node tables.
//!
//! Only confirmed edge rows become synapses. Any error aborts the build and
//! no partial graph is returned.

use serde::{Deserialize, Serialize};

use super::connectome::ConnectomeGraph;
use super::schema::{GraphMetadata, Neuron, SynapseId};
use crate::core::Result;
use crate::parser::row::{is_blank_row, parse_edge_row, parse_node_row, EdgeRecord, NodeRecord};

/// What to do with a node row naming a neuron that no edge mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenNodePolicy {
    #[default]
    Create,
    Skip,
}

/// Options for graph construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// An edge row is kept only if it carries one of these tags (lower-case).
    pub confirmation_tags: Vec<String>,

    pub unseen_nodes: UnseenNodePolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            confirmation_tags: vec!["confirmed".to_string(), "true".to_string()],
            unseen_nodes: UnseenNodePolicy::Create,
        }
    }
}

impl BuildOptions {
    pub fn is_confirmed(&self, record: &EdgeRecord) -> bool {
        self.confirmation_tags
            .iter()
            .any(|t| record.synapse.tags.iter().any(|tag| tag == t))
    }
}

/// Row counters collected while building.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub edge_rows: usize,
    pub confirmed_edges: usize,
    pub unconfirmed_edges: usize,
    pub blank_rows: usize,
    pub node_rows: usize,
    pub nodes_created: usize,
    pub nodes_skipped: usize,
}

pub struct GraphBuilder {
    options: BuildOptions,
    graph: ConnectomeGraph,
    stats: BuildStats,
}

impl GraphBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            graph: ConnectomeGraph::new(),
            stats: BuildStats::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: GraphMetadata) -> Self {
        self.graph.metadata = metadata;
        self
    }

    /// Insert one parsed edge. Returns `None` for unconfirmed rows.
    pub fn add_edge_record(&mut self, record: EdgeRecord) -> Result<Option<SynapseId>> {
        self.stats.edge_rows += 1;
        if !self.options.is_confirmed(&record) {
            tracing::debug!(
                "Skipping unconfirmed edge {} -> {} (row {:?})",
                record.pre,
                record.post,
                record.row()
            );
            self.stats.unconfirmed_edges += 1;
            return Ok(None);
        }

        let id = self.graph.add_synapse(&record.pre, &record.post, record.synapse)?;
        self.stats.confirmed_edges += 1;
        Ok(Some(id))
    }

    /// Apply one parsed node row.
    pub fn add_node_record(&mut self, record: NodeRecord) -> Result<()> {
        self.stats.node_rows += 1;
        if !self.graph.contains(&record.id) && self.options.unseen_nodes == UnseenNodePolicy::Skip {
            tracing::debug!("Skipping node row {} for unseen neuron {}", record.row, record.id);
            self.stats.nodes_skipped += 1;
            return Ok(());
        }

        let neuron = Neuron {
            id: record.id,
            cell_type: record.cell_type,
            soma_coord: record.soma_coord,
            tags: record.tags,
            attributes: record.attributes,
        };
        if self.graph.merge_node(neuron) {
            self.stats.nodes_created += 1;
        }
        Ok(())
    }

    pub fn add_edge_rows<R: AsRef<str>>(&mut self, rows: &[Vec<R>]) -> Result<()> {
        for (i, row) in rows.iter().enumerate() {
            if is_blank_row(row) {
                self.stats.blank_rows += 1;
                continue;
            }
            let record = parse_edge_row(row, i + 1)?;
            self.add_edge_record(record)?;
        }
        Ok(())
    }

    pub fn add_node_rows<R: AsRef<str>>(&mut self, rows: &[Vec<R>]) -> Result<()> {
        for (i, row) in rows.iter().enumerate() {
            if is_blank_row(row) {
                self.stats.blank_rows += 1;
                continue;
            }
            let record = parse_node_row(row, i + 1)?;
            self.add_node_record(record)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    pub fn finish(self) -> ConnectomeGraph {
        tracing::debug!(
            "Built graph: {} neurons, {} synapses ({} unconfirmed rows dropped)",
            self.graph.node_count(),
            self.graph.synapse_count(),
            self.stats.unconfirmed_edges
        );
        self.graph
    }
}

/// Build a graph from an edge table and a node table.
pub fn build_graph<R: AsRef<str>>(
    edge_rows: &[Vec<R>],
    node_rows: &[Vec<R>],
    options: &BuildOptions,
) -> Result<ConnectomeGraph> {
    let mut builder = GraphBuilder::new(options.clone());
    builder.add_edge_rows(edge_rows)?;
    builder.add_node_rows(node_rows)?;
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NeurographError;
    use crate::graph::schema::{CellType, Coord};

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_build_minimal() {
        let edges = rows(&[&["cf_1", "mli2_5", "(10,20,30)", "confirmed"]]);
        let nodes = rows(&[&["cf_1", "cell_type:cf"], &["mli2_5", "cell_type:MLI2"]]);
        let g = build_graph(&edges, &nodes, &BuildOptions::default()).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.synapse_count(), 1);
        assert_eq!(g.cell_type("mli2_5"), Some(CellType::Mli2));
        let s = g.synapse_at(Coord::new(10.0, 20.0, 30.0)).unwrap();
        assert_eq!((s.pre, s.post), ("cf_1", "mli2_5"));
    }

    #[test]
    fn test_unconfirmed_rows_are_dropped() {
        let edges = rows(&[
            &["a", "b", "(1,1,1)", "true"],
            &["a", "c", "(2,2,2)", "maybe"],
            &["", "", ""],
        ]);
        let mut builder = GraphBuilder::new(BuildOptions::default());
        builder.add_edge_rows(&edges).unwrap();
        assert_eq!(builder.stats().unconfirmed_edges, 1);
        assert_eq!(builder.stats().blank_rows, 1);
        let g = builder.finish();
        assert_eq!(g.synapse_count(), 1);
        assert!(!g.contains("c"));
    }

    #[test]
    fn test_duplicate_coordinate_names_rows() {
        let edges = rows(&[
            &["a", "b", "(1,1,1)", "confirmed"],
            &["c", "d", "(1,1,1)", "confirmed"],
        ]);
        let err = build_graph(&edges, &rows(&[]), &BuildOptions::default()).unwrap_err();
        match err {
            NeurographError::DuplicateCoordinate {
                first_row,
                second_row,
                ..
            } => {
                assert_eq!(first_row, Some(1));
                assert_eq!(second_row, Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unconfirmed_duplicate_is_not_an_error() {
        let edges = rows(&[
            &["a", "b", "(1,1,1)", "confirmed"],
            &["c", "d", "(1,1,1)", "unsure"],
        ]);
        assert!(build_graph(&edges, &rows(&[]), &BuildOptions::default()).is_ok());
    }

    #[test]
    fn test_node_rows_merge_and_policy() {
        let edges = rows(&[&["a", "b", "(1,1,1)", "confirmed"]]);
        let nodes = rows(&[&["a", "red", "k:1"], &["a", "blue", "k:2"], &["z", "cell_type:pc"]]);

        let g = build_graph(&edges, &nodes, &BuildOptions::default()).unwrap();
        let a = g.neuron("a").unwrap();
        assert_eq!(a.tags, vec!["red".to_string(), "blue".to_string()]);
        assert_eq!(a.attributes["k"], "2");
        assert!(g.contains("z"));

        let skip = BuildOptions {
            unseen_nodes: UnseenNodePolicy::Skip,
            ..BuildOptions::default()
        };
        let g = build_graph(&edges, &nodes, &skip).unwrap();
        assert!(!g.contains("z"));
    }

    #[test]
    fn test_custom_confirmation_tags() {
        let edges = rows(&[&["a", "b", "(1,1,1)", "ok"]]);
        let opts = BuildOptions {
            confirmation_tags: vec!["ok".to_string()],
            ..BuildOptions::default()
        };
        assert_eq!(build_graph(&edges, &rows(&[]), &opts).unwrap().synapse_count(), 1);
        assert_eq!(
            build_graph(&edges, &rows(&[]), &BuildOptions::default())
                .unwrap()
                .synapse_count(),
            0
        );
    }
}
