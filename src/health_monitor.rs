use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};

/// Tracks liveness of the position stream and the probe failure streak
#[derive(Debug)]
pub struct PipelineHealth {
    last_update: Mutex<Instant>,
    silence_threshold: Duration,
    consecutive_failures: AtomicU32,
    failure_alarm: u32,
    check_interval: Duration,
}

impl PipelineHealth {
    pub fn new(silence_threshold_secs: u64, failure_alarm: u32) -> Self {
        PipelineHealth {
            last_update: Mutex::new(Instant::now()),
            silence_threshold: Duration::from_secs(silence_threshold_secs),
            consecutive_failures: AtomicU32::new(0),
            failure_alarm,
            check_interval: Duration::from_secs(2),
        }
    }

    pub fn record_update(&self) {
        if let Ok(mut time) = self.last_update.lock() {
            *time = Instant::now();
        }
    }

    pub fn record_probe_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_probe_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn time_since_last_update(&self) -> Option<Duration> {
        self.last_update.lock().ok().map(|t| t.elapsed())
    }

    pub fn check_health(&self) -> HealthReport {
        let silence = self.time_since_last_update();
        let failures = self.consecutive_failures();
        HealthReport {
            positions_healthy: silence.map(|d| d <= self.silence_threshold).unwrap_or(true),
            position_silence: silence,
            probe_healthy: failures < self.failure_alarm,
            consecutive_probe_failures: failures,
        }
    }

    pub fn format_status(&self) -> String {
        let report = self.check_health();

        let position_status = if report.positions_healthy {
            "✓".to_string()
        } else {
            format!(
                "⚠ (silent {:.1}s)",
                report
                    .position_silence
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs_f64()
            )
        };

        let probe_status = if report.probe_healthy {
            "✓".to_string()
        } else {
            format!("⚠ ({} failures in a row)", report.consecutive_probe_failures)
        };

        format!("Health: Position {} | Probe {}", position_status, probe_status)
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new(30, 3)
    }
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub positions_healthy: bool,
    pub position_silence: Option<Duration>,
    pub probe_healthy: bool,
    pub consecutive_probe_failures: u32,
}

/// Periodically log warnings for a silent position source or a failing probe
pub async fn health_monitor_task(health: Arc<PipelineHealth>) {
    loop {
        sleep(health.check_interval).await;

        let report = health.check_health();
        if !report.positions_healthy {
            if let Some(duration) = report.position_silence {
                log::warn!("No position updates for {:.1}s", duration.as_secs_f64());
            }
        }
        if !report.probe_healthy {
            log::warn!(
                "Throughput probe failed {} times in a row",
                report.consecutive_probe_failures
            );
        }
    }
}
