//! Graph Document Export
//!
//! Persists a `ConnectomeGraph` as a flat JSON document (metadata, nodes,
//! edges) and regenerates edge/node tables from a graph so repaired data can
//! be written back to the tabular source.
//!
//! Node and edge order follow graph insertion order, so
//! `to_json(from_json(to_json(g)))` is byte-identical to `to_json(g)`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{NeurographError, Result};
use crate::graph::schema::{
    Coord, GraphMetadata, Neuron, Synapse, SynapseRef, CELL_TYPE_KEY, COORD_KEY, SOMA_COORD_KEY,
};
use crate::graph::ConnectomeGraph;
use crate::parser::Table;

/// One persisted synapse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub pre: String,
    pub post: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<Coord>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl EdgeDocument {
    fn from_ref(s: &SynapseRef<'_>) -> Self {
        Self {
            pre: s.pre.to_string(),
            post: s.post.to_string(),
            coord: s.synapse.coord,
            tags: s.synapse.tags.clone(),
            attributes: s.synapse.attributes.clone(),
            row: s.synapse.row,
        }
    }

    fn into_synapse(self) -> (String, String, Synapse) {
        let synapse = Synapse {
            coord: self.coord,
            tags: self.tags,
            attributes: self.attributes,
            row: self.row,
        };
        (self.pre, self.post, synapse)
    }
}

/// Serializable form of a whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub metadata: GraphMetadata,
    pub nodes: Vec<Neuron>,
    pub edges: Vec<EdgeDocument>,
}

impl GraphDocument {
    pub fn from_graph(graph: &ConnectomeGraph) -> Self {
        Self {
            metadata: graph.metadata.clone(),
            nodes: graph.neurons().cloned().collect(),
            edges: graph.synapses().map(|s| EdgeDocument::from_ref(&s)).collect(),
        }
    }

    /// Rebuild the graph. Coordinate uniqueness is re-checked, and every
    /// edge must carry a coordinate and every neuron a cell type.
    pub fn into_graph(self) -> Result<ConnectomeGraph> {
        let uncoordinated: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.coord.is_none())
            .map(|e| match e.row {
                Some(row) => format!("{} -> {} (row {})", e.pre, e.post, row),
                None => format!("{} -> {}", e.pre, e.post),
            })
            .collect();
        if !uncoordinated.is_empty() {
            return Err(NeurographError::MissingAttribute {
                attribute: COORD_KEY.to_string(),
                subjects: uncoordinated,
            });
        }

        let mut graph = ConnectomeGraph::with_metadata(self.metadata);
        for neuron in self.nodes {
            graph.merge_node(neuron);
        }
        for edge in self.edges {
            let (pre, post, synapse) = edge.into_synapse();
            graph.add_synapse(&pre, &post, synapse)?;
        }

        // Edge endpoints absent from `nodes` come back untyped too.
        let untyped: Vec<String> = graph
            .neurons()
            .filter(|n| n.cell_type.is_none())
            .map(|n| n.id.clone())
            .collect();
        if !untyped.is_empty() {
            return Err(NeurographError::MissingAttribute {
                attribute: CELL_TYPE_KEY.to_string(),
                subjects: untyped,
            });
        }
        Ok(graph)
    }
}

pub fn to_json(graph: &ConnectomeGraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&GraphDocument::from_graph(graph))?)
}

pub fn from_json(json: &str) -> Result<ConnectomeGraph> {
    let doc: GraphDocument = serde_json::from_str(json)?;
    doc.into_graph()
}

pub fn write_graph(path: &Path, graph: &ConnectomeGraph) -> Result<()> {
    std::fs::write(path, to_json(graph)?)?;
    tracing::info!(
        "Wrote {} neurons and {} synapses to {:?}",
        graph.node_count(),
        graph.synapse_count(),
        path
    );
    Ok(())
}

pub fn read_graph(path: &Path) -> Result<ConnectomeGraph> {
    let content = std::fs::read_to_string(path)?;
    from_json(&content)
}

/// Load a table stored as a JSON array of string rows.
pub fn read_table(path: &Path) -> Result<Table> {
    let content = std::fs::read_to_string(path)?;
    let table: Table = serde_json::from_str(&content)?;
    tracing::debug!("Read {} rows from {:?}", table.len(), path);
    Ok(table)
}

pub fn write_table(path: &Path, table: &[Vec<String>]) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(table)?)?;
    Ok(())
}

/// Node row: `[id, cell_type:…, soma_coord:…, tags…, key:value…]`.
pub fn node_to_row(neuron: &Neuron) -> Vec<String> {
    let mut row = vec![neuron.id.clone()];
    if let Some(t) = neuron.cell_type {
        row.push(format!("{}:{}", CELL_TYPE_KEY, t.label()));
    }
    if let Some(c) = neuron.soma_coord {
        row.push(format!("{}:{}", SOMA_COORD_KEY, c));
    }
    row.extend(neuron.tags.iter().cloned());
    row.extend(neuron.attributes.iter().map(|(k, v)| format!("{}:{}", k, v)));
    row
}

/// Edge row: `[pre, post, (x,y,z), tags…, key:value…]`. A synapse without a
/// coordinate gets an empty coordinate cell.
pub fn edge_to_row(synapse: &SynapseRef<'_>) -> Vec<String> {
    let mut row = vec![
        synapse.pre.to_string(),
        synapse.post.to_string(),
        synapse.coord().map(|c| c.to_string()).unwrap_or_default(),
    ];
    row.extend(synapse.synapse.tags.iter().cloned());
    row.extend(
        synapse
            .synapse
            .attributes
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v)),
    );
    row
}

/// Regenerate `(edge_table, node_table)` from a graph.
pub fn graph_to_tables(graph: &ConnectomeGraph) -> (Table, Table) {
    let edges = graph.synapses().map(|s| edge_to_row(&s)).collect();
    let nodes = graph.neurons().map(node_to_row).collect();
    (edges, nodes)
}
