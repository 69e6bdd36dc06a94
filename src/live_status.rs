use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::EngineSnapshot;
use crate::health_monitor::PipelineHealth;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub position_updates: u64,
    pub accepted_positions: u64,
    pub rejected_positions: u64,
    pub unavailable_positions: u64,
    pub probes_ok: u64,
    pub probes_failed: u64,
    pub manual_checks: u64,
    pub trail_points: usize,
    // Latest sample
    pub latest_mbps: Option<f64>,
    pub latest_label: Option<String>,
    pub latest_bars: Option<u8>,
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    // Health monitoring
    pub positions_healthy: bool,
    pub position_silence_secs: f64,
    pub probe_healthy: bool,
    pub consecutive_probe_failures: u32,
}

impl LiveStatus {
    pub fn from_snapshot(snapshot: &EngineSnapshot, health: &PipelineHealth, uptime_seconds: u64) -> Self {
        let report = health.check_health();
        let latest = snapshot.history.last();
        LiveStatus {
            timestamp: current_timestamp(),
            uptime_seconds,
            position_updates: snapshot.stats.updates,
            accepted_positions: snapshot.stats.accepted,
            rejected_positions: snapshot.stats.rejected,
            unavailable_positions: snapshot.stats.unavailable,
            probes_ok: snapshot.stats.probes_ok,
            probes_failed: snapshot.stats.probes_failed,
            manual_checks: snapshot.stats.manual_checks,
            trail_points: snapshot.trail.len(),
            latest_mbps: latest.map(|s| s.mbps),
            latest_label: latest.map(|s| s.classification.label().to_string()),
            latest_bars: latest.map(|s| s.classification.level.bars()),
            gps_lat: snapshot.current_position.map(|p| p.latitude),
            gps_lon: snapshot.current_position.map(|p| p.longitude),
            positions_healthy: report.positions_healthy,
            position_silence_secs: report
                .position_silence
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            probe_healthy: report.probe_healthy,
            consecutive_probe_failures: report.consecutive_probe_failures,
        }
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::types::{Position, Sample};

    #[test]
    fn test_status_from_snapshot() {
        let mut snapshot = EngineSnapshot::default();
        snapshot.history.push(Sample {
            classification: Classification::from_mbps(22.0),
            mbps: 22.0,
            timestamp: "12:00:00".to_string(),
        });
        snapshot.current_position = Some(Position::new(1.5, 2.5));
        snapshot.stats.updates = 4;
        snapshot.stats.probes_ok = 1;

        let status = LiveStatus::from_snapshot(&snapshot, &PipelineHealth::default(), 12);

        assert_eq!(status.position_updates, 4);
        assert_eq!(status.latest_label.as_deref(), Some("Good"));
        assert_eq!(status.latest_bars, Some(4));
        assert_eq!(status.gps_lat, Some(1.5));
        assert_eq!(status.uptime_seconds, 12);
        assert!(status.probe_healthy);
    }

    #[test]
    fn test_save_writes_json() {
        let path = std::env::temp_dir().join(format!("signal_live_status_{}.json", std::process::id()));
        let path_str = path.to_string_lossy().to_string();

        let status = LiveStatus {
            trail_points: 3,
            ..LiveStatus::default()
        };
        status.save(&path_str).unwrap();

        let back: LiveStatus = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(back.trail_points, 3);
    }
}
