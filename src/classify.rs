//! Signal-strength classification of a throughput reading.
//!
//! Two independent tiers:
//! - [`SignalQuality`]: four labelled buckets (glyph and trail-dot colour), strict `>` thresholds.
//! - [`SignalLevel`]: six ordinal levels 0..=5 (bar indicator), inclusive `>=` thresholds.
//!
//! The tiers do not line up at the low end (5 Mbps is `Poor` but level 2).

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SignalQuality {
    pub fn from_mbps(mbps: f64) -> Self {
        if mbps > 50.0 {
            SignalQuality::Excellent
        } else if mbps > 20.0 {
            SignalQuality::Good
        } else if mbps > 5.0 {
            SignalQuality::Fair
        } else {
            SignalQuality::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalQuality::Excellent => "Excellent",
            SignalQuality::Good => "Good",
            SignalQuality::Fair => "Fair",
            SignalQuality::Poor => "Poor",
        }
    }

    /// Short glyph for the animated surface
    pub fn glyph(&self) -> &'static str {
        match self {
            SignalQuality::Excellent => "😸✨",
            SignalQuality::Good => "😊⚡",
            SignalQuality::Fair => "😐",
            SignalQuality::Poor => "😣📴",
        }
    }

    pub fn dot_color(&self) -> DotColor {
        match self {
            SignalQuality::Excellent | SignalQuality::Good => DotColor::Green,
            SignalQuality::Fair | SignalQuality::Poor => DotColor::Red,
        }
    }
}

impl Display for SignalQuality {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.glyph(), self.label())
    }
}

/// Colour bucket of a dot on the schematic floor plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DotColor {
    Green,
    Red,
}

/// Bar count for the multi-bar strength indicator (0..=5)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalLevel(u8);

impl SignalLevel {
    pub const MAX: SignalLevel = SignalLevel(5);

    pub fn from_mbps(mbps: f64) -> Self {
        let level = if mbps >= 50.0 {
            5
        } else if mbps >= 20.0 {
            4
        } else if mbps >= 10.0 {
            3
        } else if mbps >= 2.0 {
            2
        } else if mbps >= 0.5 {
            1
        } else {
            0
        };
        SignalLevel(level)
    }

    pub fn bars(&self) -> u8 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub quality: SignalQuality,
    pub level: SignalLevel,
}

impl Classification {
    pub fn from_mbps(mbps: f64) -> Self {
        Self {
            quality: SignalQuality::from_mbps(mbps),
            level: SignalLevel::from_mbps(mbps),
        }
    }

    pub fn label(&self) -> &'static str {
        self.quality.label()
    }
}
