//! Sampling engine: gate -> probe -> classify -> history + trail.
//!
//! The engine owns every piece of mutable state for a session. Events are
//! processed one at a time by [`run_pipeline`], so at most one probe is in flight
//! and trail order always equals acceptance order.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{watch, RwLock};

use crate::classify::Classification;
use crate::config::{EngineConfig, RetryPolicy};
use crate::error::{PositionUnavailable, ProbeError};
use crate::gate::{GateDecision, PositionGate};
use crate::health_monitor::PipelineHealth;
use crate::history::SampleHistory;
use crate::probe::ThroughputProbe;
use crate::projection::{Projection, Projector, SchematicDot};
use crate::trail::Trail;
use crate::types::{Measurement, Position, PositionUpdate, Sample, TrailPoint};

/// Input of the pipeline
#[derive(Debug)]
pub enum PipelineEvent {
    Position(PositionUpdate),
    /// Manual "check now": probe once, record into history only
    Recheck,
}

impl From<PositionUpdate> for PipelineEvent {
    fn from(update: PositionUpdate) -> Self {
        PipelineEvent::Position(update)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Sampled {
        position: Position,
        classification: Classification,
        mbps: f64,
    },
    /// Moved less than the threshold since the last accepted fix
    Discarded { moved_m: f64 },
    InvalidPosition,
    Unavailable(PositionUnavailable),
    ProbeFailed {
        position: Position,
        error: ProbeError,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub updates: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub unavailable: u64,
    pub probes_ok: u64,
    pub probes_failed: u64,
    pub manual_checks: u64,
}

/// Read-only view handed to the chart, glyph, map and floor-plan surfaces
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub history: Vec<Sample>,
    pub latest: Option<Classification>,
    pub trail: Vec<TrailPoint>,
    pub current_position: Option<Position>,
    pub projection: Projection,
    pub schematic: Vec<SchematicDot>,
    pub stats: EngineStats,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            latest: None,
            trail: Vec::new(),
            current_position: None,
            projection: Projection::empty(),
            schematic: Vec::new(),
            stats: EngineStats::default(),
        }
    }
}

pub type SharedSnapshot = Arc<RwLock<EngineSnapshot>>;

pub struct SamplingEngine<P> {
    probe: P,
    gate: PositionGate,
    history: SampleHistory,
    trail: Trail,
    projector: Projector,
    retry: RetryPolicy,
    stats: EngineStats,
}

impl<P: ThroughputProbe> SamplingEngine<P> {
    pub fn new(probe: P, config: &EngineConfig) -> Self {
        SamplingEngine {
            probe,
            gate: PositionGate::new(config.distance_threshold_m),
            history: SampleHistory::new(config.history_cap),
            trail: Trail::new(),
            projector: Projector::new(config.frame_width, config.frame_height),
            retry: config.retry,
            stats: EngineStats::default(),
        }
    }

    /// Run one position update through the gate and, if accepted, one probe cycle.
    pub async fn handle_update(&mut self, update: PositionUpdate) -> CycleOutcome {
        self.stats.updates += 1;

        let position = match update {
            Ok(position) => position,
            Err(unavailable) => {
                self.stats.unavailable += 1;
                log::debug!("{}", unavailable);
                return CycleOutcome::Unavailable(unavailable);
            }
        };

        match self.gate.offer(position) {
            GateDecision::Accepted { moved_m } => {
                self.stats.accepted += 1;
                if let Some(moved) = moved_m {
                    log::debug!("Moved {:.2} m, probing", moved);
                }
            }
            GateDecision::Jitter { moved_m } => {
                self.stats.rejected += 1;
                log::debug!(
                    "Moved {:.2} m (threshold {:.2} m), skipping probe",
                    moved_m,
                    self.gate.threshold_m()
                );
                return CycleOutcome::Discarded { moved_m };
            }
            GateDecision::Invalid => {
                self.stats.rejected += 1;
                log::warn!(
                    "Ignoring non-finite position ({}, {})",
                    position.latitude,
                    position.longitude
                );
                return CycleOutcome::InvalidPosition;
            }
        }

        match self.probe_with_retry().await {
            Ok(measurement) => {
                let sample = Sample::from_measurement(&measurement);
                let classification = sample.classification;
                self.history.record(sample);
                self.trail.append(TrailPoint {
                    position,
                    classification,
                });
                log::info!(
                    "Sample #{} at ({:.6}, {:.6}): {:.2} Mbps, {} ({} bars)",
                    self.trail.len(),
                    position.latitude,
                    position.longitude,
                    measurement.throughput_mbps,
                    classification.quality,
                    classification.level.bars()
                );
                CycleOutcome::Sampled {
                    position,
                    classification,
                    mbps: measurement.throughput_mbps,
                }
            }
            Err(error) => {
                log::warn!("Probe failed, no sample recorded: {}", error);
                if self.retry == RetryPolicy::NextUpdate {
                    self.gate.force_next();
                }
                CycleOutcome::ProbeFailed { position, error }
            }
        }
    }

    /// Probe immediately without a position; the result goes to history only.
    pub async fn check_now(&mut self) -> Result<Sample, ProbeError> {
        self.stats.manual_checks += 1;
        let measurement = self.probe_with_retry().await?;
        let sample = Sample::from_measurement(&measurement);
        log::info!(
            "Manual check: {:.2} Mbps, {}",
            sample.mbps,
            sample.classification.quality
        );
        self.history.record(sample.clone());
        Ok(sample)
    }

    pub async fn handle_event(&mut self, event: PipelineEvent) -> Option<CycleOutcome> {
        match event {
            PipelineEvent::Position(update) => Some(self.handle_update(update).await),
            PipelineEvent::Recheck => {
                if let Err(e) = self.check_now().await {
                    log::warn!("Manual check failed: {}", e);
                }
                None
            }
        }
    }

    async fn probe_with_retry(&mut self) -> Result<Measurement, ProbeError> {
        let extra_attempts = match self.retry {
            RetryPolicy::Immediate { attempts } => attempts,
            RetryPolicy::Skip | RetryPolicy::NextUpdate => 0,
        };

        let mut attempt = 0;
        loop {
            match self.probe.probe().await {
                Ok(measurement) => {
                    self.stats.probes_ok += 1;
                    return Ok(measurement);
                }
                Err(e) => {
                    self.stats.probes_failed += 1;
                    if attempt >= extra_attempts {
                        return Err(e);
                    }
                    attempt += 1;
                    log::warn!(
                        "Probe failed ({}), retry {}/{}",
                        e,
                        attempt,
                        extra_attempts
                    );
                }
            }
        }
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    pub fn gate(&self) -> &PositionGate {
        &self.gate
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn latest_classification(&self) -> Option<Classification> {
        self.history.latest().map(|s| s.classification)
    }

    /// Recomputed from the full trail on every call
    pub fn projection(&self) -> Projection {
        self.projector.project(self.trail.all())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let projection = self.projection();
        let schematic = projection.schematic(self.trail.all());
        EngineSnapshot {
            history: self.history.current(),
            latest: self.latest_classification(),
            trail: self.trail.all().to_vec(),
            current_position: self.gate.last_accepted().copied(),
            projection,
            schematic,
            stats: self.stats.clone(),
        }
    }
}

/// Consume events until every sender is dropped or `shutdown` turns true,
/// publishing a snapshot after each.
///
/// Shutdown also abandons a cycle whose probe is still in flight; queued events
/// are left unprocessed. Returns the engine so callers can inspect the final state.
pub async fn run_pipeline<P: ThroughputProbe>(
    mut engine: SamplingEngine<P>,
    mut rx: Receiver<PipelineEvent>,
    shared: SharedSnapshot,
    health: Arc<PipelineHealth>,
    mut shutdown: watch::Receiver<bool>,
) -> SamplingEngine<P> {
    loop {
        let event = tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown) => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let outcome = tokio::select! {
            biased;
            _ = stop_requested(&mut shutdown) => {
                log::info!("Shutdown requested, abandoning the cycle in progress");
                break;
            }
            outcome = engine.handle_event(event) => outcome,
        };

        match outcome {
            Some(CycleOutcome::Sampled { .. }) => health.record_probe_success(),
            Some(CycleOutcome::ProbeFailed { .. }) => health.record_probe_failure(),
            _ => {}
        }

        let snapshot = engine.snapshot();
        *shared.write().await = snapshot;
    }

    log::info!(
        "Pipeline stopped after {} updates ({} samples)",
        engine.stats().updates,
        engine.trail().len()
    );
    engine
}

/// Resolves once the flag is true; never resolves if the sender is gone
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
