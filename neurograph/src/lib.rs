//! neurograph - cerebellar connectivity graph library
//!
//! Reconstructs a directed multigraph of neurons and synapses from curated
//! edge/node tables, validates it, and answers circuit and geometry queries
//! over the result.
//!
//! # Quick Start
//!
//! ```no_run
//! use neurograph::{NeurographCore, ValidationOptions};
//! use std::path::Path;
//!
//! let result = NeurographCore::validate_files(
//!     Path::new("edges.json"),
//!     Path::new("nodes.json"),
//!     &ValidationOptions::default(),
//! ).unwrap();
//!
//! for issue in result.report.issues() {
//!     println!("{}: {}", issue.severity, issue.message);
//! }
//! ```
//!
//! # Features
//!
//! - **Table ingestion**: edge and node rows with coordinate-unique synapses
//! - **Validation**: structured reports and data-driven repair policies
//! - **Circuit queries**: mono- and disynaptic paths from climbing fibers
//! - **Geometry**: distances to a piecewise-planar reference surface

pub mod analyzer;
pub mod config;
pub mod core;
pub mod export;
pub mod geometry;
pub mod graph;
pub mod parser;

// Re-export main types
pub use analyzer::{
    CellTypeClassifier, CircuitOptions, CircuitQuery, DisinhibitionCircuit, FiberAssociation,
    Issue, ResolutionPolicy, Severity, ValidationReport, ValidationStats, Validator,
};
pub use config::AnalysisConfig;
pub use core::{NeurographCore, NeurographError, Result, ValidationOptions, ValidationResult};
pub use geometry::{PixelScale, ReferenceSurface};
pub use graph::{BuildOptions, CellType, ConnectomeGraph, Coord, Neuron, Synapse, SynapseId};

/// Build a graph from edge and node tables with default options.
pub fn build_graph<R: AsRef<str>>(edge_table: &[Vec<R>], node_table: &[Vec<R>]) -> Result<ConnectomeGraph> {
    graph::build_graph(edge_table, node_table, &BuildOptions::default())
}

/// Read a persisted graph document (convenience wrapper).
pub fn load_graph(path: &std::path::Path) -> Result<ConnectomeGraph> {
    export::read_graph(path)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AnalysisConfig, CellType, CircuitOptions, CircuitQuery, ConnectomeGraph, Coord,
        FiberAssociation, NeurographCore, NeurographError, ReferenceSurface, Severity,
        ValidationOptions, ValidationResult,
    };
}
