//! Core ingestion pipeline shared by the library API and the CLI.
//! No terminal interaction: every decision arrives as data.

use std::path::{Path, PathBuf};

use crate::analyzer::issues::ValidationStats;
use crate::analyzer::validator::{Resolution, ResolutionPolicy, ValidationReport, Validator};
use crate::export::read_table;
use crate::graph::builder::BuildOptions;
use crate::graph::schema::Coord;
use crate::graph::ConnectomeGraph;

#[derive(Debug, thiserror::Error)]
pub enum NeurographError {
    #[error("Malformed coordinate '{value}': {reason}")]
    MalformedCoordinate { value: String, reason: String },

    #[error("Two confirmed synapses share coordinate {coord}: first at {}, repeated at {}", row_label(.first_row), row_label(.second_row))]
    DuplicateCoordinate {
        coord: Coord,
        first_row: Option<usize>,
        second_row: Option<usize>,
    },

    #[error("Attribute '{key}' given more than once at {}", row_label(.row))]
    DuplicateAttributeKey { key: String, row: Option<usize> },

    #[error("No association for '{0}'")]
    MissingAssociation(String),

    #[error("Association {left} -> {right} conflicts with existing pair {existing}")]
    AssociationConflict {
        left: String,
        right: String,
        existing: String,
    },

    #[error("Missing required attribute '{attribute}' on: {}", .subjects.join(", "))]
    MissingAttribute {
        attribute: String,
        subjects: Vec<String>,
    },

    #[error("Node '{node}' is defined twice: first at row {first_row}, again at row {second_row}")]
    DuplicateNodeDefinition {
        node: String,
        first_row: usize,
        second_row: usize,
    },

    #[error("Reference surface segment {segment} is degenerate: {reason}")]
    DegenerateSurface { segment: usize, reason: String },

    #[error("Malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("Unknown cell type '{value}' for node '{node}'")]
    UnknownCellType { node: String, value: String },

    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NeurographError>;

fn row_label(row: &Option<usize>) -> String {
    match row {
        Some(r) => format!("row {}", r),
        None => "an unknown row".to_string(),
    }
}

/// Options for a validation run (CLI or library).
#[derive(Clone, Debug, Default)]
pub struct ValidationOptions {
    pub build: BuildOptions,
    pub policy: ResolutionPolicy,
}

/// Outcome of validating one pair of edge/node tables.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub source: Option<PathBuf>,
    pub report: ValidationReport,
    pub resolution: Resolution,
    pub stats: ValidationStats,
}

impl ValidationResult {
    pub fn is_complete(&self) -> bool {
        self.resolution.is_complete()
    }

    pub fn graph(&self) -> &ConnectomeGraph {
        self.resolution.graph()
    }

    pub fn total_issues(&self) -> usize {
        self.stats.total()
    }
}

/// Core validation API used by both library callers and the CLI.
pub struct NeurographCore;

impl NeurographCore {
    /// Validate in-memory tables and resolve incomplete nodes per `options.policy`.
    pub fn validate_tables<R: AsRef<str>>(
        edge_table: &[Vec<R>],
        node_table: &[Vec<R>],
        options: &ValidationOptions,
    ) -> Result<ValidationResult> {
        let validator = Validator::new(options.build.clone());
        let inspection = validator.inspect(edge_table, node_table)?;
        let report = inspection.report.clone();
        let resolution = validator.resolve(inspection, &options.policy)?;
        let stats = report.stats();

        tracing::info!(
            "Validated {} neurons and {} synapses ({} incomplete nodes, complete: {})",
            resolution.graph().node_count(),
            resolution.graph().synapse_count(),
            report.incomplete_nodes.len(),
            resolution.is_complete()
        );

        Ok(ValidationResult {
            source: None,
            report,
            resolution,
            stats,
        })
    }

    /// Validate tables stored as JSON files (arrays of string rows).
    pub fn validate_files(
        edges: &Path,
        nodes: &Path,
        options: &ValidationOptions,
    ) -> Result<ValidationResult> {
        let edge_table = read_table(edges)?;
        let node_table = read_table(nodes)?;
        let mut result = Self::validate_tables(&edge_table, &node_table, options)?;
        result.source = Some(edges.to_path_buf());
        Ok(result)
    }
}
