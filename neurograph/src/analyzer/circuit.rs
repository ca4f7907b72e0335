//! Circuit Query Engine
//!
//! Typed neighbourhood queries over a built graph, plus the climbing-fiber
//! disinhibition circuit (cf → MLI2 → MLI1 → pc) for one Purkinje cell.
//!
//! Every pc is paired with exactly one climbing fiber through a
//! `FiberAssociation`; queries that start from a pc resolve its fiber there
//! and fail with `MissingAssociation` when no pair exists.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{NeurographError, Result};
use crate::graph::schema::{CellType, Coord, SynapseId, SynapseRef};
use crate::graph::ConnectomeGraph;

/// Edge tag marking ephaptic (non-chemical) contacts.
pub const EPHAPTIC_TAG: &str = "ephaptic";

/// Bijective pc ↔ climbing fiber map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FiberAssociation {
    cell_to_fiber: BTreeMap<String, String>,
    fiber_to_cell: BTreeMap<String, String>,
}

impl FiberAssociation {
    /// Build from `(pc, fiber)` pairs. Repeating an identical pair is allowed;
    /// mapping either side twice to different partners is an error.
    pub fn new<I, C, F>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, F)>,
        C: Into<String>,
        F: Into<String>,
    {
        let mut assoc = Self::default();
        for (cell, fiber) in pairs {
            let (cell, fiber) = (cell.into(), fiber.into());
            if let Some(existing) = assoc.cell_to_fiber.get(&cell) {
                if existing == &fiber {
                    continue;
                }
                return Err(NeurographError::AssociationConflict {
                    left: cell.clone(),
                    right: fiber,
                    existing: format!("{} -> {}", cell, existing),
                });
            }
            if let Some(existing) = assoc.fiber_to_cell.get(&fiber) {
                return Err(NeurographError::AssociationConflict {
                    left: cell,
                    right: fiber.clone(),
                    existing: format!("{} -> {}", existing, fiber),
                });
            }
            assoc.cell_to_fiber.insert(cell.clone(), fiber.clone());
            assoc.fiber_to_cell.insert(fiber, cell);
        }
        Ok(assoc)
    }

    pub fn fiber_of(&self, cell: &str) -> Result<&str> {
        self.cell_to_fiber
            .get(cell)
            .map(String::as_str)
            .ok_or_else(|| NeurographError::MissingAssociation(cell.to_string()))
    }

    pub fn cell_of(&self, fiber: &str) -> Result<&str> {
        self.fiber_to_cell
            .get(fiber)
            .map(String::as_str)
            .ok_or_else(|| NeurographError::MissingAssociation(fiber.to_string()))
    }

    /// Associated cells in sorted order.
    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.cell_to_fiber.keys().map(String::as_str)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cell_to_fiber
            .iter()
            .map(|(c, f)| (c.as_str(), f.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cell_to_fiber.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_to_fiber.is_empty()
    }
}

/// pc → neighbouring pc lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborMap {
    neighbors: BTreeMap<String, String>,
}

impl NeighborMap {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        Self {
            neighbors: pairs
                .into_iter()
                .map(|(a, b)| (a.into(), b.into()))
                .collect(),
        }
    }

    pub fn neighbor_of(&self, cell: &str) -> Result<&str> {
        self.neighbors
            .get(cell)
            .map(String::as_str)
            .ok_or_else(|| NeurographError::MissingAssociation(cell.to_string()))
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// Incoming contacts onto one neuron from a presynaptic cell type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCount {
    pub contacts: usize,
    pub unique_partners: usize,
}

/// MLI1s reached from a pc's fiber, split so no neuron is counted twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mli1Partition {
    pub monosynaptic: Vec<String>,
    pub disynaptic: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitOptions {
    /// Keep MLI1s that do not synapse onto the target pc.
    pub include_non_predecessor_mli1s: bool,
    /// Keep fiber-contacted MLI1s that are not also reached through an MLI2.
    pub include_fiber_only_mli1s: bool,
    /// Keep synapses tagged `ephaptic`.
    pub use_ephaptic: bool,
    /// Target pc; defaults to the pc whose fiber starts the circuit.
    pub target: Option<String>,
}

impl Default for CircuitOptions {
    fn default() -> Self {
        Self {
            include_non_predecessor_mli1s: true,
            include_fiber_only_mli1s: false,
            use_ephaptic: false,
            target: None,
        }
    }
}

/// Position of a neuron in the layered circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitLayer {
    Fiber,
    Mli2,
    Mli1,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitEdge {
    pub pre: String,
    pub post: String,
    pub coord: Option<Coord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub id: String,
    pub cell_type: Option<CellType>,
}

/// One fiber → … → target chain through the circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitPath {
    pub steps: Vec<PathStep>,
}

impl CircuitPath {
    pub fn ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for CircuitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ids().join(" -> "))
    }
}

/// Layered disinhibition circuit for one pc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisinhibitionCircuit {
    pub fiber: String,
    pub target: String,
    pub mli2s: Vec<String>,
    pub direct_mli1s: Vec<String>,
    pub indirect_mli1s: Vec<String>,
    /// Layer-legal synapses only, in insertion order.
    pub edges: Vec<CircuitEdge>,
    /// Neurons with a path to the target inside the circuit (target included).
    pub returns_to_target: Vec<String>,
    /// Number of synapses each circuit MLI1 makes onto the target.
    pub mli1_target_contacts: Vec<(String, usize)>,
    /// MLI1s with at least one ephaptic output; only filled with `use_ephaptic`.
    pub ephaptic_mli1s: Vec<String>,
    pub paths: Vec<CircuitPath>,
}

impl DisinhibitionCircuit {
    pub fn mli1s(&self) -> impl Iterator<Item = &str> {
        self.indirect_mli1s
            .iter()
            .chain(&self.direct_mli1s)
            .map(String::as_str)
    }

    pub fn layer_of(&self, id: &str) -> Option<CircuitLayer> {
        if id == self.target {
            Some(CircuitLayer::Target)
        } else if self.mli1s().any(|m| m == id) {
            Some(CircuitLayer::Mli1)
        } else if self.mli2s.iter().any(|m| m == id) {
            Some(CircuitLayer::Mli2)
        } else if id == self.fiber {
            Some(CircuitLayer::Fiber)
        } else {
            None
        }
    }

    pub fn reaches_target(&self, id: &str) -> bool {
        self.returns_to_target.iter().any(|r| r == id)
    }
}

/// Read-only query handle over one graph and one association map.
#[derive(Debug, Clone, Copy)]
pub struct CircuitQuery<'a> {
    graph: &'a ConnectomeGraph,
    associations: &'a FiberAssociation,
}

impl<'a> CircuitQuery<'a> {
    pub fn new(graph: &'a ConnectomeGraph, associations: &'a FiberAssociation) -> Self {
        Self {
            graph,
            associations,
        }
    }

    pub fn graph(&self) -> &'a ConnectomeGraph {
        self.graph
    }

    /// The fiber paired with `pc`; it must also be present in the graph.
    pub fn fiber_of(&self, pc: &str) -> Result<&'a str> {
        let fiber = self.associations.fiber_of(pc)?;
        self.require(fiber)?;
        Ok(fiber)
    }

    pub fn successors_by_type(&self, id: &str, cell_type: CellType) -> Result<Vec<&'a str>> {
        self.require(id)?;
        Ok(self.filter_type(self.graph.successors(id), cell_type))
    }

    pub fn predecessors_by_type(&self, id: &str, cell_type: CellType) -> Result<Vec<&'a str>> {
        self.require(id)?;
        Ok(self.filter_type(self.graph.predecessors(id), cell_type))
    }

    /// Union of successors of every listed neuron, first-seen order.
    pub fn successors_of_set(&self, ids: &[&str]) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        ids.iter()
            .flat_map(|id| self.graph.successors(id))
            .filter(|s| seen.insert(*s))
            .collect()
    }

    pub fn successors_of_set_by_type(&self, ids: &[&str], cell_type: CellType) -> Vec<&'a str> {
        self.filter_type(self.successors_of_set(ids), cell_type)
    }

    pub fn predecessors_of_set_by_type(&self, ids: &[&str], cell_type: CellType) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        let preds = ids
            .iter()
            .flat_map(|id| self.graph.predecessors(id))
            .filter(|p| seen.insert(*p))
            .collect();
        self.filter_type(preds, cell_type)
    }

    /// Direct out-neighbours of `fiber` with the given type.
    pub fn monosynaptic_targets(&self, fiber: &str, cell_type: CellType) -> Result<Vec<&'a str>> {
        self.successors_by_type(fiber, cell_type)
    }

    /// MLI2s contacted by the fiber of `pc`.
    pub fn fiber_mli2s(&self, pc: &str) -> Result<Vec<&'a str>> {
        let fiber = self.fiber_of(pc)?;
        self.successors_by_type(fiber, CellType::Mli2)
    }

    /// MLI1s contacted by the fiber of `pc` that also synapse onto `pc`.
    pub fn monosynaptic_mli1s(&self, pc: &str) -> Result<Vec<&'a str>> {
        let fiber = self.fiber_of(pc)?;
        let onto_pc: HashSet<&str> = self.predecessors_by_type(pc, CellType::Mli1)?.into_iter().collect();
        Ok(self
            .successors_by_type(fiber, CellType::Mli1)?
            .into_iter()
            .filter(|m| onto_pc.contains(m))
            .collect())
    }

    /// MLI1 inputs of `pc` within two hops of its fiber, excluding the
    /// monosynaptic ones.
    pub fn disynaptic_mli1s(&self, pc: &str) -> Result<Vec<&'a str>> {
        let mono: HashSet<&str> = self.monosynaptic_mli1s(pc)?.into_iter().collect();
        Ok(self
            .reachable_mli1_inputs(pc)?
            .into_iter()
            .filter(|m| !mono.contains(m))
            .collect())
    }

    pub fn mli1_partition(&self, pc: &str) -> Result<Mli1Partition> {
        Ok(Mli1Partition {
            monosynaptic: owned_ids(&self.monosynaptic_mli1s(pc)?),
            disynaptic: owned_ids(&self.disynaptic_mli1s(pc)?),
        })
    }

    /// Every synapse from `pre` into `post`, each synapse once.
    pub fn edges_between(&self, pre: &[&str], post: &[&str]) -> Vec<SynapseRef<'a>> {
        let post: HashSet<&str> = post.iter().copied().collect();
        let mut seen: HashSet<SynapseId> = HashSet::new();
        pre.iter()
            .flat_map(|id| self.graph.out_synapses(id))
            .filter(|s| post.contains(s.post) && seen.insert(s.id))
            .collect()
    }

    /// Number of parallel synapses from `pre` to `post`.
    pub fn edge_count_between(&self, pre: &str, post: &str) -> usize {
        self.graph.synapses_between(pre, post).len()
    }

    /// Outgoing synapses of every listed neuron, one per coordinate.
    pub fn out_edges_of_set(&self, ids: &[&str]) -> Vec<SynapseRef<'a>> {
        let mut coords = HashSet::new();
        let mut ids_seen: HashSet<SynapseId> = HashSet::new();
        ids.iter()
            .flat_map(|id| self.graph.out_synapses(id))
            .filter(|s| ids_seen.insert(s.id))
            .filter(|s| match s.coord() {
                Some(c) => coords.insert(c.key()),
                None => true,
            })
            .collect()
    }

    pub fn disynaptic_mli1_to_pc_edges(&self, pc: &str) -> Result<Vec<SynapseRef<'a>>> {
        let mli1s = self.disynaptic_mli1s(pc)?;
        Ok(self.edges_between(&mli1s, &[pc]))
    }

    pub fn monosynaptic_mli1_to_pc_edges(&self, pc: &str) -> Result<Vec<SynapseRef<'a>>> {
        let mli1s = self.monosynaptic_mli1s(pc)?;
        Ok(self.edges_between(&mli1s, &[pc]))
    }

    /// Synapses from the fiber's MLI2s onto the MLI1s they contact.
    pub fn fiber_mli2_to_mli1_edges(&self, pc: &str) -> Result<Vec<SynapseRef<'a>>> {
        let mli2s = self.fiber_mli2s(pc)?;
        let mli1s = self.successors_of_set_by_type(&mli2s, CellType::Mli1);
        Ok(self.edges_between(&mli2s, &mli1s))
    }

    /// Incoming synapses onto `id` from neurons of `from_type`.
    pub fn fiber_contacts(&self, id: &str, from_type: CellType) -> Result<ContactCount> {
        self.require(id)?;
        let incoming: Vec<SynapseRef<'a>> = self
            .graph
            .in_synapses(id)
            .into_iter()
            .filter(|s| self.graph.cell_type(s.pre) == Some(from_type))
            .collect();
        let unique: HashSet<&str> = incoming.iter().map(|s| s.pre).collect();
        Ok(ContactCount {
            contacts: incoming.len(),
            unique_partners: unique.len(),
        })
    }

    /// Extract the layered cf → MLI2 → MLI1 → target circuit for `pc`.
    pub fn disinhibition_circuit(&self, pc: &str, options: &CircuitOptions) -> Result<DisinhibitionCircuit> {
        let filtered;
        let graph = if options.use_ephaptic {
            self.graph
        } else {
            filtered = self.graph.without_edge_tag(EPHAPTIC_TAG);
            &filtered
        };
        CircuitQuery::new(graph, self.associations).build_circuit(pc, options)
    }

    fn build_circuit(&self, pc: &str, options: &CircuitOptions) -> Result<DisinhibitionCircuit> {
        let target = options.target.as_deref().unwrap_or(pc);
        self.require(target)?;
        let fiber = self.fiber_of(pc)?;

        let mli2s = self.successors_by_type(fiber, CellType::Mli2)?;
        let reached = self.reachable_mli1_inputs(pc)?;
        let direct: Vec<&str> = self
            .successors_by_type(fiber, CellType::Mli1)?
            .into_iter()
            .filter(|m| options.include_fiber_only_mli1s || reached.contains(m))
            .collect();
        let mut indirect: Vec<&str> = reached
            .into_iter()
            .filter(|m| !direct.contains(m))
            .collect();
        let mut direct = direct;

        if !options.include_non_predecessor_mli1s {
            let onto_target: HashSet<&str> = self.graph.predecessors(target).into_iter().collect();
            direct.retain(|m| onto_target.contains(m));
            indirect.retain(|m| onto_target.contains(m));
        }

        // Later layers win when a neuron would sit in two.
        let mut layers: HashMap<&str, CircuitLayer> = HashMap::new();
        layers.insert(fiber, CircuitLayer::Fiber);
        for &m in &mli2s {
            layers.insert(m, CircuitLayer::Mli2);
        }
        for &m in indirect.iter().chain(&direct) {
            layers.insert(m, CircuitLayer::Mli1);
        }
        layers.insert(target, CircuitLayer::Target);

        let legal: Vec<SynapseRef<'_>> = self
            .graph
            .synapses()
            .filter(|s| match (layers.get(s.pre), layers.get(s.post)) {
                (Some(&a), Some(&b)) => {
                    a == CircuitLayer::Fiber
                        || b == CircuitLayer::Target
                        || (a, b) == (CircuitLayer::Mli2, CircuitLayer::Mli1)
                }
                _ => false,
            })
            .collect();

        let returns = reverse_reachable(target, &legal);
        let mut returns_to_target: Vec<String> = Vec::new();
        for id in std::iter::once(fiber)
            .chain(mli2s.iter().copied())
            .chain(indirect.iter().copied())
            .chain(direct.iter().copied())
            .chain(std::iter::once(target))
        {
            if returns.contains(id) && !returns_to_target.iter().any(|r| r == id) {
                returns_to_target.push(id.to_string());
            }
        }

        let mli1_target_contacts = indirect
            .iter()
            .chain(&direct)
            .map(|m| (m.to_string(), self.edge_count_between(m, target)))
            .collect();

        let ephaptic_mli1s = if options.use_ephaptic {
            indirect
                .iter()
                .chain(&direct)
                .filter(|m| {
                    self.graph
                        .out_synapses(m)
                        .iter()
                        .any(|s| s.synapse.has_tag(EPHAPTIC_TAG))
                })
                .map(|m| m.to_string())
                .collect()
        } else {
            Vec::new()
        };

        let paths = self.enumerate_paths(fiber, target, &legal, &layers);

        tracing::debug!(
            "Circuit {} -> {}: {} MLI2s, {} direct and {} indirect MLI1s, {} paths",
            fiber,
            target,
            mli2s.len(),
            direct.len(),
            indirect.len(),
            paths.len()
        );

        Ok(DisinhibitionCircuit {
            fiber: fiber.to_string(),
            target: target.to_string(),
            mli2s: owned_ids(&mli2s),
            direct_mli1s: owned_ids(&direct),
            indirect_mli1s: owned_ids(&indirect),
            edges: legal
                .iter()
                .map(|s| CircuitEdge {
                    pre: s.pre.to_string(),
                    post: s.post.to_string(),
                    coord: s.coord(),
                })
                .collect(),
            returns_to_target,
            mli1_target_contacts,
            ephaptic_mli1s,
            paths,
        })
    }

    /// MLI1 inputs of `pc` within two forward hops of its fiber, in
    /// breadth-first order. Overlap with the monosynaptic set is kept.
    fn reachable_mli1_inputs(&self, pc: &str) -> Result<Vec<&'a str>> {
        let fiber = self.fiber_of(pc)?;
        let onto_pc: HashSet<&str> = self.predecessors_by_type(pc, CellType::Mli1)?.into_iter().collect();
        Ok(self
            .graph
            .reachable_within(fiber, 2)
            .into_iter()
            .filter(|n| onto_pc.contains(n))
            .collect())
    }

    /// Node paths from `fiber` to `target` whose layers strictly increase.
    fn enumerate_paths(
        &self,
        fiber: &str,
        target: &str,
        legal: &[SynapseRef<'_>],
        layers: &HashMap<&str, CircuitLayer>,
    ) -> Vec<CircuitPath> {
        let mut next: HashMap<&str, Vec<&str>> = HashMap::new();
        for s in legal {
            let (Some(a), Some(b)) = (layers.get(s.pre), layers.get(s.post)) else {
                continue;
            };
            if a < b {
                let out = next.entry(s.pre).or_default();
                if !out.contains(&s.post) {
                    out.push(s.post);
                }
            }
        }

        let mut paths = Vec::new();
        let mut stack: Vec<Vec<&str>> = vec![vec![fiber]];
        let mut found: Vec<Vec<&str>> = Vec::new();
        while let Some(path) = stack.pop() {
            let Some(&last) = path.last() else { continue };
            if last == target {
                found.push(path);
                continue;
            }
            if let Some(children) = next.get(last) {
                for child in children.iter().rev() {
                    let mut extended = path.clone();
                    extended.push(child);
                    stack.push(extended);
                }
            }
        }

        for ids in found {
            paths.push(CircuitPath {
                steps: ids
                    .into_iter()
                    .map(|id| PathStep {
                        id: id.to_string(),
                        cell_type: self.graph.cell_type(id),
                    })
                    .collect(),
            });
        }
        paths
    }

    fn filter_type(&self, ids: Vec<&'a str>, cell_type: CellType) -> Vec<&'a str> {
        ids.into_iter()
            .filter(|id| self.graph.cell_type(id) == Some(cell_type))
            .collect()
    }

    fn require(&self, id: &str) -> Result<()> {
        if self.graph.contains(id) {
            Ok(())
        } else {
            Err(NeurographError::UnknownNode(id.to_string()))
        }
    }
}

fn owned_ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

/// Every node with a path to `target` over `edges`, target included.
fn reverse_reachable<'s>(target: &'s str, edges: &[SynapseRef<'s>]) -> HashSet<&'s str> {
    let mut reached: HashSet<&str> = HashSet::from([target]);
    let mut frontier = vec![target];
    while let Some(node) = frontier.pop() {
        for s in edges.iter().filter(|s| s.post == node) {
            if reached.insert(s.pre) {
                frontier.push(s.pre);
            }
        }
    }
    reached
}
