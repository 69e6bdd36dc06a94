//! Projection of the trail onto a fixed-size drawing surface.
//!
//! The surface is north-up: the north-west corner of the frame lands on (0, 0)
//! and the south-east corner on (width, height).
//!
//! The bounding frame is rebuilt from the whole trail on every call; nothing is
//! cached between calls.

use geo::{BoundingRect, MultiPoint};
use serde::{Deserialize, Serialize};

use crate::classify::DotColor;
use crate::types::{Position, TrailPoint};

pub const DEFAULT_FRAME_WIDTH: f64 = 400.0;
pub const DEFAULT_FRAME_HEIGHT: f64 = 350.0;

/// North-west to south-east corners of the trail, in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingFrame {
    pub top_left: Position,
    pub bottom_right: Position,
}

impl BoundingFrame {
    /// All-zero frame used for an empty trail
    pub fn degenerate() -> Self {
        Self {
            top_left: Position::new(0.0, 0.0),
            bottom_right: Position::new(0.0, 0.0),
        }
    }

    pub fn from_trail(trail: &[TrailPoint]) -> Self {
        let points: MultiPoint<f64> = trail.iter().map(|p| p.position.to_point()).collect();
        match points.bounding_rect() {
            Some(rect) => {
                let (min, max) = (rect.min(), rect.max());
                Self {
                    top_left: Position::new(max.y, min.x),
                    bottom_right: Position::new(min.y, max.x),
                }
            }
            None => Self::degenerate(),
        }
    }

    pub fn lon_span(&self) -> f64 {
        self.bottom_right.longitude - self.top_left.longitude
    }

    pub fn lat_span(&self) -> f64 {
        self.top_left.latitude - self.bottom_right.latitude
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

/// A projected trail point with its colour bucket, for the floor-plan overlay
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchematicDot {
    pub x: f64,
    pub y: f64,
    pub color: DotColor,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub frame: BoundingFrame,
    /// One per trail point, same order
    pub points: Vec<ProjectedPoint>,
}

impl Projection {
    pub fn empty() -> Self {
        Self {
            frame: BoundingFrame::degenerate(),
            points: Vec::new(),
        }
    }

    /// Pair each projected point with the colour bucket of its trail point.
    pub fn schematic(&self, trail: &[TrailPoint]) -> Vec<SchematicDot> {
        self.points
            .iter()
            .zip(trail)
            .map(|(pt, tp)| SchematicDot {
                x: pt.x,
                y: pt.y,
                color: tp.classification.quality.dot_color(),
                label: tp.classification.quality.to_string(),
            })
            .collect()
    }
}

/// Maps lat/lon into `[0, width] x [0, height]` with y growing downward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projector {
    pub width: f64,
    pub height: f64,
}

impl Projector {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn project(&self, trail: &[TrailPoint]) -> Projection {
        if trail.is_empty() {
            return Projection::empty();
        }

        let frame = BoundingFrame::from_trail(trail);
        let points = trail
            .iter()
            .map(|p| self.project_point(&p.position, &frame))
            .collect();

        Projection { frame, points }
    }

    /// Zero spans (every point shares a coordinate) are replaced by 1 so the
    /// result stays finite.
    pub fn project_point(&self, pos: &Position, frame: &BoundingFrame) -> ProjectedPoint {
        let lon_span = non_zero(frame.lon_span());
        let lat_span = non_zero(frame.lat_span());

        let x_ratio = (pos.longitude - frame.top_left.longitude) / lon_span;
        // Fraction of the way north from the southern edge
        let y_ratio = (pos.latitude - frame.bottom_right.latitude) / lat_span;

        ProjectedPoint {
            x: x_ratio * self.width,
            y: (1.0 - y_ratio) * self.height,
        }
    }
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT)
    }
}

fn non_zero(span: f64) -> f64 {
    if span == 0.0 {
        1.0
    } else {
        span
    }
}
