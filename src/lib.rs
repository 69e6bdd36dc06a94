//! Signal-quality sampling along a walked trail.
//!
//! A stream of device positions is debounced by distance, each accepted fix
//! triggers one timed download, and the resulting throughput is classified and
//! kept in a short rolling history and an unbounded geo-tagged trail. The trail
//! can be projected onto a fixed-size drawing surface for a floor-plan overlay.

pub mod classify;
pub mod config;
pub mod dashboard;
pub mod distance;
pub mod engine;
pub mod error;
pub mod gate;
pub mod health_monitor;
pub mod history;
pub mod live_status;
pub mod probe;
pub mod projection;
pub mod sources;
pub mod trail;
pub mod types;

pub use classify::{Classification, DotColor, SignalLevel, SignalQuality};
pub use config::{EngineConfig, RetryPolicy};
pub use engine::{
    run_pipeline, CycleOutcome, EngineSnapshot, PipelineEvent, SamplingEngine, SharedSnapshot,
};
pub use error::{ConfigError, PositionUnavailable, ProbeError};
pub use probe::{HttpProbe, ThroughputProbe};
pub use projection::{BoundingFrame, ProjectedPoint, Projection, Projector};
pub use types::{Measurement, Position, PositionUpdate, Sample, TrailPoint};
