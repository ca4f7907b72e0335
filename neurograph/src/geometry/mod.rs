//! Geometry in physical units: distances from synapses to an anatomical
//! reference surface.

pub mod profile;
pub mod surface;

pub use profile::{tagged_synapse_distances, DistanceSummary, SynapseDistance};
pub use surface::{
    distance_between, distance_to_reference_surface, PixelScale, ReferenceSurface,
    PURKINJE_LAYER_POINTS,
};
