//! Connectome Graph Implementation
//!
//! A directed multigraph of neurons and synapses backed by petgraph.
//! The wrapper keeps two indices next to the graph:
//! - neuron id -> node index
//! - contact coordinate -> edge index (uniqueness of confirmed synapses)
//!
//! Edges are never removed in place, so a `SynapseId` stays valid for the
//! lifetime of the graph. Filtering builds a new graph.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use super::schema::*;
use crate::core::{NeurographError, Result};

/// The connectivity graph.
#[derive(Debug, Clone)]
pub struct ConnectomeGraph {
    graph: DiGraph<Neuron, Synapse>,

    /// neuron id -> node index
    node_indices: HashMap<String, NodeIndex>,

    /// contact coordinate -> edge index
    coord_index: HashMap<CoordKey, EdgeIndex>,

    pub metadata: GraphMetadata,
}

impl ConnectomeGraph {
    pub fn new() -> Self {
        Self::with_metadata(GraphMetadata::default())
    }

    pub fn with_metadata(metadata: GraphMetadata) -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            coord_index: HashMap::new(),
            metadata,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn synapse_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    pub fn neuron(&self, id: &str) -> Option<&Neuron> {
        self.node_indices
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn neuron_mut(&mut self, id: &str) -> Option<&mut Neuron> {
        self.node_indices
            .get(id)
            .copied()
            .and_then(move |idx| self.graph.node_weight_mut(idx))
    }

    /// All neurons in insertion order.
    pub fn neurons(&self) -> impl Iterator<Item = &Neuron> {
        self.graph.node_weights()
    }

    pub fn neurons_of_type(&self, cell_type: CellType) -> impl Iterator<Item = &Neuron> {
        self.neurons().filter(move |n| n.is_type(cell_type))
    }

    pub fn cell_type(&self, id: &str) -> Option<CellType> {
        self.neuron(id).and_then(|n| n.cell_type)
    }

    /// Return the node for `id`, creating a bare neuron if it is new.
    pub fn ensure_neuron(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(Neuron::new(id));
        self.node_indices.insert(id.to_string(), idx);
        idx
    }

    /// Merge a neuron into the graph.
    ///
    /// New neurons are inserted as given. For an existing neuron, set fields
    /// and attributes overwrite and tags are appended. Returns `true` if the
    /// neuron was created.
    pub fn merge_node(&mut self, neuron: Neuron) -> bool {
        if let Some(&idx) = self.node_indices.get(&neuron.id) {
            let existing = &mut self.graph[idx];
            if neuron.cell_type.is_some() {
                existing.cell_type = neuron.cell_type;
            }
            if neuron.soma_coord.is_some() {
                existing.soma_coord = neuron.soma_coord;
            }
            for tag in neuron.tags {
                existing.add_tag(tag);
            }
            existing.attributes.extend(neuron.attributes);
            false
        } else {
            let id = neuron.id.clone();
            let idx = self.graph.add_node(neuron);
            self.node_indices.insert(id, idx);
            true
        }
    }

    pub fn set_cell_type(&mut self, id: &str, cell_type: CellType) -> Result<()> {
        let neuron = self
            .neuron_mut(id)
            .ok_or_else(|| NeurographError::UnknownNode(id.to_string()))?;
        neuron.cell_type = Some(cell_type);
        Ok(())
    }

    pub fn set_soma(&mut self, id: &str, coord: Coord) -> Result<()> {
        let neuron = self
            .neuron_mut(id)
            .ok_or_else(|| NeurographError::UnknownNode(id.to_string()))?;
        neuron.soma_coord = Some(coord);
        Ok(())
    }

    /// Add a synapse from `pre` to `post`, creating either endpoint if needed.
    ///
    /// Fails with `DuplicateCoordinate` if another synapse already sits at
    /// the same coordinate; the graph is unchanged in that case. Synapses
    /// without a coordinate are stored but not indexed.
    pub fn add_synapse(&mut self, pre: &str, post: &str, synapse: Synapse) -> Result<SynapseId> {
        if let Some(coord) = synapse.coord {
            if let Some(&existing) = self.coord_index.get(&coord.key()) {
                return Err(NeurographError::DuplicateCoordinate {
                    coord,
                    first_row: self.graph[existing].row,
                    second_row: synapse.row,
                });
            }
        }
        Ok(self.insert_unchecked(pre, post, synapse))
    }

    pub fn synapse(&self, id: SynapseId) -> Option<SynapseRef<'_>> {
        (id.0 < self.graph.edge_count()).then(|| self.edge_ref(EdgeIndex::new(id.0)))
    }

    /// All synapses in insertion order.
    pub fn synapses(&self) -> impl Iterator<Item = SynapseRef<'_>> {
        self.graph.edge_references().map(move |e| self.edge_ref(e.id()))
    }

    /// The synapse at exactly this coordinate, if any.
    pub fn synapse_at(&self, coord: Coord) -> Option<SynapseRef<'_>> {
        self.coord_index
            .get(&coord.key())
            .map(|&edge| self.edge_ref(edge))
    }

    pub fn out_synapses(&self, id: &str) -> Vec<SynapseRef<'_>> {
        self.directed_synapses(id, Direction::Outgoing)
    }

    pub fn in_synapses(&self, id: &str) -> Vec<SynapseRef<'_>> {
        self.directed_synapses(id, Direction::Incoming)
    }

    /// All synapses from `pre` to `post`, in insertion order.
    pub fn synapses_between(&self, pre: &str, post: &str) -> Vec<SynapseRef<'_>> {
        let (Some(&a), Some(&b)) = (self.node_indices.get(pre), self.node_indices.get(post)) else {
            return Vec::new();
        };
        let mut edges: Vec<EdgeIndex> = self.graph.edges_connecting(a, b).map(|e| e.id()).collect();
        edges.sort();
        edges.into_iter().map(|e| self.edge_ref(e)).collect()
    }

    /// Distinct postsynaptic partners, ordered by first contact.
    pub fn successors(&self, id: &str) -> Vec<&str> {
        dedup_ids(self.out_synapses(id).into_iter().map(|s| s.post))
    }

    /// Distinct presynaptic partners, ordered by first contact.
    pub fn predecessors(&self, id: &str) -> Vec<&str> {
        dedup_ids(self.in_synapses(id).into_iter().map(|s| s.pre))
    }

    /// Neurons reachable from `id` in at most `depth` hops, `id` included,
    /// in breadth-first order. Each neuron is expanded at its shortest
    /// distance, so the result does not depend on synapse insertion order.
    pub fn reachable_within(&self, id: &str, depth: usize) -> Vec<&str> {
        let Some(start) = self.neuron(id) else {
            return Vec::new();
        };
        let start = start.id.as_str();
        let mut order = vec![start];
        let mut hops: HashMap<&str, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let d = hops[current];
            if d >= depth {
                continue;
            }
            for child in self.successors(current) {
                if !hops.contains_key(child) {
                    hops.insert(child, d + 1);
                    order.push(child);
                    queue.push_back(child);
                }
            }
        }
        order
    }

    /// A copy with every neuron and only the synapses matching `keep`.
    pub fn filter_synapses<F>(&self, mut keep: F) -> ConnectomeGraph
    where
        F: FnMut(&SynapseRef<'_>) -> bool,
    {
        let mut out = ConnectomeGraph::with_metadata(self.metadata.clone());
        for neuron in self.neurons() {
            out.merge_node(neuron.clone());
        }
        for s in self.synapses().filter(|s| keep(s)) {
            out.insert_unchecked(s.pre, s.post, s.synapse.clone());
        }
        out
    }

    /// Edge-induced subgraph on synapses carrying `tag`.
    pub fn subgraph_by_edge_tag(&self, tag: &str) -> ConnectomeGraph {
        let kept: Vec<SynapseRef<'_>> = self.synapses().filter(|s| s.synapse.has_tag(tag)).collect();
        let incident: HashSet<&str> = kept.iter().flat_map(|s| [s.pre, s.post]).collect();

        let mut out = ConnectomeGraph::with_metadata(self.metadata.clone());
        for neuron in self.neurons().filter(|n| incident.contains(n.id.as_str())) {
            out.merge_node(neuron.clone());
        }
        for s in kept {
            out.insert_unchecked(s.pre, s.post, s.synapse.clone());
        }
        out
    }

    /// A copy with every synapse carrying `tag` removed.
    pub fn without_edge_tag(&self, tag: &str) -> ConnectomeGraph {
        self.filter_synapses(|s| !s.synapse.has_tag(tag))
    }

    pub fn stats(&self) -> GraphStats {
        let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
        let mut untyped = 0;
        for neuron in self.neurons() {
            match neuron.cell_type {
                Some(t) => *by_type.entry(t.label().to_string()).or_default() += 1,
                None => untyped += 1,
            }
        }
        let mut tags: BTreeMap<String, usize> = BTreeMap::new();
        let mut without_coord = 0;
        for s in self.synapses() {
            if s.synapse.coord.is_none() {
                without_coord += 1;
            }
            for tag in &s.synapse.tags {
                *tags.entry(tag.clone()).or_default() += 1;
            }
        }

        GraphStats {
            neuron_count: self.node_count(),
            synapse_count: self.synapse_count(),
            untyped_neurons: untyped,
            synapses_without_coord: without_coord,
            neurons_by_type: by_type,
            synapses_by_tag: tags,
        }
    }

    // Callers guarantee coordinate uniqueness (copies of an indexed graph).
    fn insert_unchecked(&mut self, pre: &str, post: &str, synapse: Synapse) -> SynapseId {
        let key = synapse.coord.map(|c| c.key());
        let a = self.ensure_neuron(pre);
        let b = self.ensure_neuron(post);
        let edge = self.graph.add_edge(a, b, synapse);
        if let Some(key) = key {
            self.coord_index.insert(key, edge);
        }
        SynapseId(edge.index())
    }

    fn directed_synapses(&self, id: &str, dir: Direction) -> Vec<SynapseRef<'_>> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        // petgraph walks adjacency lists newest-first
        let mut edges: Vec<EdgeIndex> = self.graph.edges_directed(idx, dir).map(|e| e.id()).collect();
        edges.sort();
        edges.into_iter().map(|e| self.edge_ref(e)).collect()
    }

    // `edge` must belong to this graph.
    fn edge_ref(&self, edge: EdgeIndex) -> SynapseRef<'_> {
        let raw = &self.graph.raw_edges()[edge.index()];
        SynapseRef {
            id: SynapseId(edge.index()),
            pre: self.graph[raw.source()].id.as_str(),
            post: self.graph[raw.target()].id.as_str(),
            synapse: &raw.weight,
        }
    }
}

impl Default for ConnectomeGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_ids<'g>(ids: impl Iterator<Item = &'g str>) -> Vec<&'g str> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

/// Summary counts for a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub neuron_count: usize,
    pub synapse_count: usize,
    pub untyped_neurons: usize,
    pub synapses_without_coord: usize,
    pub neurons_by_type: BTreeMap<String, usize>,
    pub synapses_by_tag: BTreeMap<String, usize>,
}
