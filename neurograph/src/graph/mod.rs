//! Connectivity graph: data types, construction and the petgraph wrapper.

pub mod builder;
pub mod connectome;
pub mod schema;

pub use builder::{build_graph, BuildOptions, BuildStats, GraphBuilder, UnseenNodePolicy};
pub use connectome::{ConnectomeGraph, GraphStats};
pub use schema::*;
