//! Connectome Data Types
//!
//! This module defines the records stored in the connectivity graph:
//! - `Neuron`: a node with a cell-type label, optional soma location, tags
//!   and free-form attributes
//! - `Synapse`: an edge payload keyed by its 3D contact coordinate
//! - `Coord`: an exact `f64` triple, serialized as `[x, y, z]`
//! - `CellType`: the fixed label set used by validation and circuit queries
//!
//! All types serialize with serde so a graph can be persisted and re-read
//! without losing precision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Attribute key that carries a neuron's cell type in node rows.
pub const CELL_TYPE_KEY: &str = "cell_type";
/// Attribute key that carries a neuron's soma location in node rows.
pub const SOMA_COORD_KEY: &str = "soma_coord";
/// Reserved edge key for the contact coordinate.
pub const COORD_KEY: &str = "coord";
/// Reserved key for the tag list on both nodes and edges.
pub const TAGS_KEY: &str = "tags";

/// A point in the EM volume, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Bit-exact hash key. `-0.0` and `0.0` map to the same key.
    pub(crate) fn key(&self) -> CoordKey {
        CoordKey([
            (self.x + 0.0).to_bits(),
            (self.y + 0.0).to_bits(),
            (self.z + 0.0).to_bits(),
        ])
    }
}

impl From<[f64; 3]> for Coord {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Coord> for [f64; 3] {
    fn from(c: Coord) -> Self {
        c.to_array()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// Hashable identity of a coordinate used by the builder's duplicate index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CoordKey([u64; 3]);

/// Neuron classes recognised by validation and circuit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CellType {
    /// Purkinje cell, the principal output neuron.
    Pc,
    /// Climbing fiber, the afferent paired with one Purkinje cell.
    Cf,
    /// Molecular layer interneuron, type 1.
    Mli1,
    /// Molecular layer interneuron, type 2.
    Mli2,
    /// Interneuron of unresolved subtype.
    Interneuron,
    /// Granule cell (and its parallel fiber).
    Grc,
    /// Purkinje layer interneuron.
    Pli,
    /// Reconstruction fragment that could not be attributed to a cell.
    Fragment,
    Unknown,
}

impl CellType {
    pub const ALL: [CellType; 9] = [
        CellType::Pc,
        CellType::Cf,
        CellType::Mli1,
        CellType::Mli2,
        CellType::Interneuron,
        CellType::Grc,
        CellType::Pli,
        CellType::Fragment,
        CellType::Unknown,
    ];

    /// Canonical label as written in node tables.
    pub fn label(&self) -> &'static str {
        match self {
            CellType::Pc => "pc",
            CellType::Cf => "cf",
            CellType::Mli1 => "MLI1",
            CellType::Mli2 => "MLI2",
            CellType::Interneuron => "interneuron",
            CellType::Grc => "grc",
            CellType::Pli => "pli",
            CellType::Fragment => "fragment",
            CellType::Unknown => "unknown",
        }
    }

    pub fn is_interneuron(&self) -> bool {
        matches!(
            self,
            CellType::Mli1 | CellType::Mli2 | CellType::Interneuron | CellType::Pli
        )
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string is not one of the known cell-type labels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cell type label '{0}'")]
pub struct ParseCellTypeError(pub String);

impl FromStr for CellType {
    type Err = ParseCellTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        CellType::ALL
            .iter()
            .copied()
            .find(|t| t.label().eq_ignore_ascii_case(&lower))
            .ok_or_else(|| ParseCellTypeError(s.to_string()))
    }
}

impl TryFrom<String> for CellType {
    type Error = ParseCellTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellType> for String {
    fn from(t: CellType) -> Self {
        t.label().to_string()
    }
}

/// A neuron (graph node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<CellType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soma_coord: Option<Coord>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Neuron {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cell_type: None,
            soma_coord: None,
            tags: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_cell_type(mut self, cell_type: CellType) -> Self {
        self.cell_type = Some(cell_type);
        self
    }

    pub fn with_soma(mut self, coord: Coord) -> Self {
        self.soma_coord = Some(coord);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Append a tag. Returns `false` if it was already present.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        push_unique(&mut self.tags, tag.into())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_type(&self, cell_type: CellType) -> bool {
        self.cell_type == Some(cell_type)
    }
}

/// A synaptic contact (graph edge payload). Endpoints live in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    /// Contact location; the uniqueness key among confirmed synapses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<Coord>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// 1-based row in the source edge table, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl Synapse {
    pub fn new(coord: Coord) -> Self {
        Self {
            coord: Some(coord),
            tags: Vec::new(),
            attributes: BTreeMap::new(),
            row: None,
        }
    }

    pub fn without_coord() -> Self {
        Self {
            coord: None,
            tags: Vec::new(),
            attributes: BTreeMap::new(),
            row: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        push_unique(&mut self.tags, tag.into())
    }

    /// True if the tag is present, either as a bare tag or as an attribute key.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag) || self.attributes.contains_key(tag)
    }
}

/// Stable identifier of a synapse inside one graph (insertion order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SynapseId(pub usize);

impl fmt::Display for SynapseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Borrowed view of a synapse together with its endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapseRef<'g> {
    pub id: SynapseId,
    pub pre: &'g str,
    pub post: &'g str,
    pub synapse: &'g Synapse,
}

impl SynapseRef<'_> {
    pub fn coord(&self) -> Option<Coord> {
        self.synapse.coord
    }
}

/// Metadata about where a graph came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub name: String,

    /// Timestamp of when the graph was built
    pub created: DateTime<Utc>,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl GraphMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created: Utc::now(),
            schema_version: default_schema_version(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self::new("connectome")
    }
}

fn push_unique(tags: &mut Vec<String>, tag: String) -> bool {
    if tags.contains(&tag) {
        false
    } else {
        tags.push(tag);
        true
    }
}
