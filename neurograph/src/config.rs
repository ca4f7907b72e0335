//! Analysis Configuration
//!
//! Dataset-level constants for the circuit and geometry analyses: the pc ↔ cf
//! pairing, the pc neighbour map, the Purkinje cells of interest and the
//! reference surface. `Default` reproduces the reference dataset; a JSON file
//! may override any subset of fields.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzer::circuit::{FiberAssociation, NeighborMap};
use crate::core::Result;
use crate::geometry::surface::{PixelScale, ReferenceSurface, PURKINJE_LAYER_POINTS};
use crate::graph::schema::Coord;

const DEFAULT_ASSOCIATIONS: &[(&str, &str)] = &[
    ("pc_2", "cf_13"),
    ("pc_3", "cf_19"),
    ("pc_9", "cf_1"),
    ("pc_16", "cf_3"),
    ("pc_22", "cf_6"),
    ("pc_23", "cf_18"),
    ("pc_26", "cf_23"),
    ("pc_32", "cf_25"),
    ("pc_34", "cf_21"),
    ("pc_35", "cf_17"),
    ("pc_50", "cf_2"),
];

const DEFAULT_NEIGHBORS: &[(&str, &str)] = &[
    ("pc_2", "pc_1"),
    ("pc_9", "pc_16"),
    ("pc_16", "pc_9"),
    ("pc_22", "pc_23"),
    ("pc_23", "pc_22"),
    ("pc_26", "pc_25"),
    ("pc_32", "pc_28"),
    ("pc_34", "pc_35"),
    ("pc_35", "pc_34"),
    ("pc_50", "pc_3"),
];

const DEFAULT_PCS: &[&str] = &[
    "pc_2", "pc_9", "pc_16", "pc_22", "pc_23", "pc_26", "pc_32", "pc_34", "pc_35", "pc_50",
];

/// Reference surface as stored in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub points: Vec<Coord>,
    pub scale: PixelScale,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            points: PURKINJE_LAYER_POINTS.iter().copied().map(Coord::from).collect(),
            scale: PixelScale::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// pc → climbing fiber
    pub associations: BTreeMap<String, String>,
    /// pc → neighbouring pc
    pub neighbors: BTreeMap<String, String>,
    /// Purkinje cells analysed when a command names none.
    pub pcs: Vec<String>,
    /// Edge tag used for distance profiles.
    pub profile_tag: String,
    pub surface: SurfaceConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            associations: owned_pairs(DEFAULT_ASSOCIATIONS),
            neighbors: owned_pairs(DEFAULT_NEIGHBORS),
            pcs: DEFAULT_PCS.iter().map(|s| s.to_string()).collect(),
            profile_tag: "pf".to_string(),
            surface: SurfaceConfig::default(),
        }
    }
}

fn owned_pairs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

impl AnalysisConfig {
    /// Load from a JSON file. Fields absent from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!(
            "Loaded analysis config from {:?} ({} associations)",
            path,
            config.associations.len()
        );
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validated pc ↔ cf map; fails on a non-injective pairing.
    pub fn fiber_association(&self) -> Result<FiberAssociation> {
        FiberAssociation::new(
            self.associations
                .iter()
                .map(|(pc, cf)| (pc.as_str(), cf.as_str())),
        )
    }

    pub fn neighbor_map(&self) -> NeighborMap {
        NeighborMap::new(self.neighbors.iter().map(|(a, b)| (a.as_str(), b.as_str())))
    }

    pub fn reference_surface(&self) -> Result<ReferenceSurface> {
        ReferenceSurface::new(self.surface.points.clone(), self.surface.scale)
    }
}
