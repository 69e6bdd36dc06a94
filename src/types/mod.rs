use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::error::PositionUnavailable;

/// Device fix in WGS84 degrees.
///
/// Only latitude/longitude feed the sampling core; the remaining fields are
/// carried through untouched for the map surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            altitude: None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// geo uses x = longitude, y = latitude
    pub fn to_point(&self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// One item of the inbound position stream: either a fix or the device's error.
pub type PositionUpdate = Result<Position, PositionUnavailable>;

/// Result of one throughput probe
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub throughput_mbps: f64,
    pub captured_at: DateTime<Utc>,
}

impl Measurement {
    pub fn new(throughput_mbps: f64) -> Self {
        Self {
            throughput_mbps,
            captured_at: Utc::now(),
        }
    }

    pub fn classify(&self) -> Classification {
        Classification::from_mbps(self.throughput_mbps)
    }
}

/// Entry of the rolling history shown on the chart and glyph surfaces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub classification: Classification,
    pub mbps: f64,
    /// Wall-clock time formatted for the chart axis (HH:MM:SS, local)
    pub timestamp: String,
}

impl Sample {
    pub fn from_measurement(measurement: &Measurement) -> Self {
        Self {
            classification: measurement.classify(),
            mbps: measurement.throughput_mbps,
            timestamp: measurement
                .captured_at
                .with_timezone(&Local)
                .format("%H:%M:%S")
                .to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub position: Position,
    pub classification: Classification,
}
