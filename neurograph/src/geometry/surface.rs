//! Piecewise-planar reference surfaces.
//!
//! Each consecutive pair of reference points `(p1, p2)` defines a plane
//! through `p1`, `p2` and the ground projection of `p1` (`z = 0`). Distances
//! are measured in microns after a diagonal pixel → micron rescale.

use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::core::{NeurographError, Result};
use crate::graph::schema::Coord;

/// Lower boundary of the Purkinje cell layer in the reference volume (pixels).
pub const PURKINJE_LAYER_POINTS: [[f64; 3]; 6] = [
    [36591.30859, 99053.46094, 500.0],
    [58370.33594, 99943.27344, 500.0],
    [100273.0078, 97749.88281, 500.0],
    [156308.2813, 91476.78906, 500.0],
    [198027.4844, 83397.96875, 500.0],
    [210138.9531, 79896.3125, 500.0],
];

const EPS: f64 = 1e-9;

/// Microns per pixel along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelScale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for PixelScale {
    fn default() -> Self {
        Self {
            x: 0.004,
            y: 0.004,
            z: 0.04,
        }
    }
}

impl PixelScale {
    pub fn matrix(&self) -> DMat3 {
        DMat3::from_diagonal(DVec3::new(self.x, self.y, self.z))
    }

    /// Rescale a pixel-space vector to microns.
    pub fn apply(&self, v: DVec3) -> DVec3 {
        self.matrix() * v
    }
}

fn to_vec(c: Coord) -> DVec3 {
    DVec3::new(c.x, c.y, c.z)
}

/// Plane of one segment: origin in pixels, unit normal in micron space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SegmentPlane {
    origin: DVec3,
    unit_normal: DVec3,
}

impl SegmentPlane {
    fn new(segment: usize, p1: DVec3, p2: DVec3, scale: &PixelScale) -> Result<Self> {
        let degenerate = |reason: &str| NeurographError::DegenerateSurface {
            segment,
            reason: reason.to_string(),
        };

        let origin = DVec3::new(p1.x, p1.y, 0.0);
        let v1 = scale.apply(p1 - origin);
        let v2 = scale.apply(p2 - origin);

        if v1.length() < EPS {
            return Err(degenerate("first point lies on the ground plane"));
        }
        if (p2 - p1).length() < EPS {
            return Err(degenerate("reference points coincide"));
        }

        // Gram-Schmidt: remove the v1 component from v2.
        let v2_perp = v2 - v1 * (v2.dot(v1) / v1.dot(v1));
        if v2_perp.length() < EPS * v2.length().max(1.0) {
            return Err(degenerate("reference points are colinear with the origin"));
        }

        let normal = v1.cross(v2_perp);
        let length = normal.length();
        if length < EPS {
            return Err(degenerate("plane normal vanishes"));
        }

        Ok(Self {
            origin,
            unit_normal: normal / length,
        })
    }

    fn distance(&self, point: DVec3, scale: &PixelScale) -> f64 {
        scale.apply(point - self.origin).dot(self.unit_normal).abs()
    }
}

/// Ordered polyline of at least two points, validated at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSurface {
    points: Vec<Coord>,
    scale: PixelScale,
    planes: Vec<SegmentPlane>,
}

impl ReferenceSurface {
    pub fn new(points: Vec<Coord>, scale: PixelScale) -> Result<Self> {
        if points.len() < 2 {
            return Err(NeurographError::DegenerateSurface {
                segment: 0,
                reason: format!("need at least 2 points, got {}", points.len()),
            });
        }

        let planes = points
            .windows(2)
            .enumerate()
            .map(|(i, pair)| SegmentPlane::new(i, to_vec(pair[0]), to_vec(pair[1]), &scale))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            points,
            scale,
            planes,
        })
    }

    /// The Purkinje cell layer surface of the reference volume.
    pub fn purkinje_layer() -> Result<Self> {
        Self::new(
            PURKINJE_LAYER_POINTS.iter().copied().map(Coord::from).collect(),
            PixelScale::default(),
        )
    }

    pub fn points(&self) -> &[Coord] {
        &self.points
    }

    pub fn scale(&self) -> PixelScale {
        self.scale
    }

    pub fn segment_count(&self) -> usize {
        self.planes.len()
    }

    /// Distance to each segment's plane, in segment order.
    pub fn segment_distances(&self, point: Coord) -> Vec<f64> {
        let p = to_vec(point);
        self.planes
            .iter()
            .map(|plane| plane.distance(p, &self.scale))
            .collect()
    }

    /// Index and distance of the closest segment plane.
    pub fn closest_segment(&self, point: Coord) -> (usize, f64) {
        self.segment_distances(point)
            .into_iter()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
    }

    /// Minimum distance over all segment planes, in microns.
    pub fn distance_to(&self, point: Coord) -> f64 {
        self.closest_segment(point).1
    }
}

pub fn distance_to_reference_surface(point: Coord, surface: &ReferenceSurface) -> f64 {
    surface.distance_to(point)
}

/// Euclidean distance between two pixel-space points, in microns.
pub fn distance_between(a: Coord, b: Coord, scale: &PixelScale) -> f64 {
    scale.apply(to_vec(a) - to_vec(b)).length()
}
