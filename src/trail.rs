use geo::{Coord, LineString};

use crate::types::TrailPoint;

/// Append-only journey of geo-tagged classifications. No cap, no eviction.
#[derive(Default)]
pub struct Trail {
    points: Vec<TrailPoint>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, point: TrailPoint) {
        self.points.push(point);
    }

    /// Insertion (= temporal) order
    pub fn all(&self) -> &[TrailPoint] {
        &self.points
    }

    pub fn latest(&self) -> Option<&TrailPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw lon/lat path for the outdoor map polyline
    pub fn polyline(&self) -> LineString<f64> {
        let coords: Vec<Coord<f64>> = self
            .points
            .iter()
            .map(|p| Coord {
                x: p.position.longitude,
                y: p.position.latitude,
            })
            .collect();
        LineString::new(coords)
    }
}
