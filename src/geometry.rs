//! Planar geometry primitives shared by the graph, the quadtree, and the pathfinder.
//!
//! Distances here are Euclidean in the lat/lon plane, not great-circle. That is a
//! deliberate simplification: every consumer (indexing, the A* heuristic, edge
//! weights) uses the same metric, so routes stay internally consistent even though
//! no absolute distance guarantee is made to callers.

use serde::{Deserialize, Serialize};

/// A geographic position expressed as plain lat/lon doubles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Euclidean distance between two positions in the lat/lon plane.
pub fn planar_distance(a: Position, b: Position) -> f64 {
    let dlat = a.lat - b.lat;
    let dlon = a.lon - b.lon;
    (dlat * dlat + dlon * dlon).sqrt()
}

/// An axis-aligned bounding box over lat/lon space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Position,
    pub max: Position,
}

impl BoundingBox {
    pub fn new(min: Position, max: Position) -> Self {
        Self { min, max }
    }

    /// A square box centered on `center` with half-side `radius`.
    pub fn from_center(center: Position, radius: f64) -> Self {
        Self {
            min: Position::new(center.lat - radius, center.lon - radius),
            max: Position::new(center.lat + radius, center.lon + radius),
        }
    }

    /// Smallest box containing every position in `positions`. Returns `None` for
    /// an empty slice, since there is no sensible bounding box for nothing.
    pub fn enclosing(positions: &[Position]) -> Option<Self> {
        let first = positions.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in &positions[1..] {
            min.lat = min.lat.min(p.lat);
            min.lon = min.lon.min(p.lon);
            max.lat = max.lat.max(p.lat);
            max.lon = max.lon.max(p.lon);
        }
        Some(Self { min, max })
    }

    /// Closed containment test on all four bounds.
    pub fn contains(&self, p: Position) -> bool {
        p.lat >= self.min.lat && p.lat <= self.max.lat && p.lon >= self.min.lon && p.lon <= self.max.lon
    }

    /// Standard non-disjoint test on both axes.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        let disjoint = self.max.lat < other.min.lat
            || self.min.lat > other.max.lat
            || self.max.lon < other.min.lon
            || self.min.lon > other.max.lon;
        !disjoint
    }

    pub fn midpoint(&self) -> Position {
        Position::new(
            (self.min.lat + self.max.lat) / 2.0,
            (self.min.lon + self.max.lon) / 2.0,
        )
    }
}
