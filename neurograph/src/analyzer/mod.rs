//! Analysis over tables and built graphs: classification, validation and
//! circuit queries.

pub mod circuit;
pub mod classifier;
pub mod issues;
pub mod validator;

pub use circuit::{
    CircuitOptions, CircuitPath, CircuitQuery, ContactCount, DisinhibitionCircuit,
    FiberAssociation, Mli1Partition, NeighborMap,
};
pub use classifier::{guess_cell_type, CellTypeClassifier, ClassifierRule};
pub use issues::{Issue, Severity, ValidationStats};
pub use validator::{
    IncompleteEdge, IncompleteNode, Resolution, ResolutionPolicy, ValidationReport, Validator,
};
