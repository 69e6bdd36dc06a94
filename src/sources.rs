//! Position sources feeding the sampling pipeline.
//!
//! Every source pushes into the same bounded channel with `try_send`; a full
//! channel drops the fix, a closed channel ends the loop. Liveness is recorded
//! here, when a fix arrives, not when the pipeline dequeues it.

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::process::Command;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration};

use crate::engine::PipelineEvent;
use crate::error::PositionUnavailable;
use crate::health_monitor::PipelineHealth;
use crate::types::{Position, PositionUpdate};

/// Returns false once the receiver is gone
fn forward(
    tx: &Sender<PipelineEvent>,
    health: &PipelineHealth,
    update: PositionUpdate,
    source: &str,
    sent: &mut u64,
) -> bool {
    // Only real fixes count as the source being alive
    if update.is_ok() {
        health.record_update();
    }
    match tx.try_send(PipelineEvent::Position(update)) {
        Ok(_) => {
            *sent += 1;
            if *sent % 50 == 0 {
                log::debug!("[{}] {} updates", source, sent);
            }
            true
        }
        Err(TrySendError::Closed(_)) => {
            log::info!("[{}] Channel closed after {} updates", source, sent);
            false
        }
        Err(TrySendError::Full(_)) => {
            log::debug!("[{}] Pipeline busy, dropping update", source);
            true
        }
    }
}

/// Deterministic simulated walk: steady steps with sub-metre jitter in between
/// and an occasional lost fix.
pub struct MockWalk {
    origin: Position,
    step_m: f64,
    seq: u64,
}

impl MockWalk {
    const DEG_PER_M: f64 = 1.0 / 111_194.93;

    pub fn new(origin: Position, step_m: f64) -> Self {
        MockWalk {
            origin,
            step_m,
            seq: 0,
        }
    }

    pub fn next_update(&mut self) -> PositionUpdate {
        let seq = self.seq;
        self.seq += 1;

        if seq > 0 && seq % 20 == 0 {
            return Err(PositionUnavailable::new("simulated fix loss"));
        }

        // Every third fix only wobbles around the previous step
        let steps = (seq / 3) as f64;
        let wobble = if seq % 3 == 0 { 0.0 } else { 0.2 * (seq as f64).sin() };
        let north_m = steps * self.step_m + wobble;
        let east_m = steps * self.step_m * 0.5 * (steps * 0.3).cos();

        let lat = self.origin.latitude + north_m * Self::DEG_PER_M;
        let lon = self.origin.longitude
            + east_m * Self::DEG_PER_M / self.origin.latitude.to_radians().cos().max(1e-6);

        Ok(Position {
            latitude: lat,
            longitude: lon,
            accuracy: Some(5.0 + (seq as f64 * 0.1).sin() * 2.0),
            altitude: None,
        })
    }
}

pub async fn mock_walk_loop(
    tx: Sender<PipelineEvent>,
    health: Arc<PipelineHealth>,
    period: Duration,
    mut walk: MockWalk,
) {
    let mut ticker = interval(period);
    let mut sent = 0u64;

    loop {
        ticker.tick().await;
        if !forward(&tx, &health, walk.next_update(), "mock", &mut sent) {
            break;
        }
    }
}

#[derive(Deserialize)]
struct TermuxLocation {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    accuracy: Option<f64>,
}

fn parse_termux_location(output: &str) -> PositionUpdate {
    let loc: TermuxLocation = serde_json::from_str(output.trim())
        .map_err(|e| PositionUnavailable::new(format!("termux-location output: {}", e)))?;
    Ok(Position {
        latitude: loc.latitude,
        longitude: loc.longitude,
        accuracy: loc.accuracy,
        altitude: loc.altitude,
    })
}

fn read_termux_location() -> PositionUpdate {
    let output = Command::new("termux-location")
        .arg("-p")
        .arg("gps")
        .arg("-r")
        .arg("once")
        .output()
        .map_err(|e| PositionUnavailable::new(format!("termux-location: {}", e)))?;

    if !output.status.success() {
        return Err(PositionUnavailable::new(format!(
            "termux-location exited with {}",
            output.status
        )));
    }
    parse_termux_location(&String::from_utf8_lossy(&output.stdout))
}

/// Poll the Termux:API location provider
pub async fn termux_location_loop(
    tx: Sender<PipelineEvent>,
    health: Arc<PipelineHealth>,
    period: Duration,
) {
    let mut ticker = interval(period);
    let mut sent = 0u64;

    loop {
        ticker.tick().await;
        let update = tokio::task::spawn_blocking(read_termux_location)
            .await
            .unwrap_or_else(|e| Err(PositionUnavailable::new(format!("location task: {}", e))));

        if !forward(&tx, &health, update, "termux", &mut sent) {
            break;
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayRecord {
    Fix(Position),
    Error { error: String },
}

/// One JSON object per line: a position, or `{"error": "..."}` for a failed fix.
/// Blank lines and `#` comments are skipped.
pub fn parse_replay_line(line: &str) -> Option<PositionUpdate> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    match serde_json::from_str::<ReplayRecord>(line) {
        Ok(ReplayRecord::Fix(pos)) => Some(Ok(pos)),
        Ok(ReplayRecord::Error { error }) => Some(Err(PositionUnavailable::new(error))),
        Err(e) => {
            log::warn!("[replay] Skipping malformed line: {}", e);
            None
        }
    }
}

/// Replay a JSON-lines file at a fixed pace, then close the stream
pub async fn replay_loop(
    tx: Sender<PipelineEvent>,
    health: Arc<PipelineHealth>,
    path: PathBuf,
    period: Duration,
) {
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) => {
            log::error!("[replay] Failed to read {}: {}", path.display(), e);
            return;
        }
    };

    let mut ticker = interval(period);
    let mut sent = 0u64;
    for update in text.lines().filter_map(parse_replay_line) {
        ticker.tick().await;
        if update.is_ok() {
            health.record_update();
        }
        // Replays are finite, so wait for room instead of dropping
        if tx.send(PipelineEvent::Position(update)).await.is_err() {
            break;
        }
        sent += 1;
    }
    log::info!("[replay] Finished {} after {} updates", path.display(), sent);
}
