//! Distance profiles of tagged synapses relative to a reference surface.

use serde::{Deserialize, Serialize};

use crate::graph::connectome::ConnectomeGraph;
use crate::graph::schema::{Coord, SynapseId};

use super::surface::ReferenceSurface;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseDistance {
    pub synapse: SynapseId,
    pub pre: String,
    pub post: String,
    pub coord: Coord,
    /// Microns to the closest segment plane.
    pub distance: f64,
}

/// Distances of every synapse carrying `tag`, in synapse insertion order.
///
/// Synapses without a coordinate cannot be placed and are skipped.
pub fn tagged_synapse_distances(
    graph: &ConnectomeGraph,
    surface: &ReferenceSurface,
    tag: &str,
) -> Vec<SynapseDistance> {
    let mut skipped = 0usize;
    let distances: Vec<SynapseDistance> = graph
        .synapses()
        .into_iter()
        .filter(|s| s.synapse.has_tag(tag))
        .filter_map(|s| match s.coord() {
            Some(coord) => Some(SynapseDistance {
                synapse: s.id,
                pre: s.pre.to_string(),
                post: s.post.to_string(),
                coord,
                distance: surface.distance_to(coord),
            }),
            None => {
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        tracing::debug!("Skipped {} '{}' synapses without a coordinate", skipped, tag);
    }
    distances
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

impl DistanceSummary {
    /// `None` for an empty profile.
    pub fn from_distances(distances: &[SynapseDistance]) -> Option<Self> {
        if distances.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = distances.iter().map(|d| d.distance).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        let count = values.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };

        Some(Self {
            count,
            min: values[0],
            max: values[count - 1],
            mean: values.iter().sum::<f64>() / count as f64,
            median,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::surface::PixelScale;
    use crate::graph::schema::Synapse;
    use approx::assert_relative_eq;

    fn surface() -> ReferenceSurface {
        ReferenceSurface::new(
            vec![Coord::new(0.0, 0.0, 100.0), Coord::new(0.0, 1000.0, 100.0)],
            PixelScale::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_only_tagged_synapses_with_coords() {
        let mut g = ConnectomeGraph::new();
        g.add_synapse("grc_1", "pc_1", Synapse::new(Coord::new(250.0, 0.0, 1.0)).with_tag("pf"))
            .unwrap();
        g.add_synapse("grc_2", "pc_1", Synapse::new(Coord::new(500.0, 0.0, 1.0)))
            .unwrap();
        g.add_synapse("grc_3", "pc_1", Synapse::without_coord().with_tag("pf"))
            .unwrap();
        g.add_synapse("grc_4", "mli1_2", Synapse::new(Coord::new(-750.0, 0.0, 1.0)).with_tag("pf"))
            .unwrap();

        let d = tagged_synapse_distances(&g, &surface(), "pf");
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].pre, "grc_1");
        assert_relative_eq!(d[0].distance, 1.0, epsilon = 1e-12);
        assert_eq!(d[1].post, "mli1_2");
        assert_relative_eq!(d[1].distance, 3.0, epsilon = 1e-12);

        let summary = DistanceSummary::from_distances(&d).unwrap();
        assert_eq!(summary.count, 2);
        assert_relative_eq!(summary.mean, 2.0);
        assert_relative_eq!(summary.median, 2.0);
        assert_relative_eq!(summary.max, 3.0);
    }

    #[test]
    fn test_empty_profile() {
        let g = ConnectomeGraph::new();
        assert!(tagged_synapse_distances(&g, &surface(), "pf").is_empty());
        assert!(DistanceSummary::from_distances(&[]).is_none());
    }
}
