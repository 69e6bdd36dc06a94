use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, Duration};

use signal_tracker_rs::config::{EngineConfig, RetryPolicy};
use signal_tracker_rs::dashboard::{self, DashboardState};
use signal_tracker_rs::engine::{run_pipeline, EngineSnapshot, PipelineEvent, SamplingEngine, SharedSnapshot};
use signal_tracker_rs::health_monitor::{health_monitor_task, PipelineHealth};
use signal_tracker_rs::live_status::LiveStatus;
use signal_tracker_rs::probe::HttpProbe;
use signal_tracker_rs::projection::Projector;
use signal_tracker_rs::sources::{self, MockWalk};
use signal_tracker_rs::types::Position;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Source {
    /// Simulated walk around a fixed origin
    Mock,
    /// termux-location (Android / Termux:API)
    Termux,
    /// JSON-lines file given by --replay
    Replay,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Retry {
    Skip,
    Immediate,
    NextUpdate,
}

#[derive(Parser, Debug)]
#[command(name = "signal_tracker")]
#[command(about = "Walk around, measure download throughput, map signal quality", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until the position stream ends)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Position source
    #[arg(long, value_enum, default_value = "mock")]
    source: Source,

    /// Positions file for --source replay
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Seconds between position polls
    #[arg(long, default_value = "2.0")]
    poll_secs: f64,

    /// Download URL used for each probe
    #[arg(long)]
    probe_url: Option<String>,

    /// Payload size in bytes used for the Mbps calculation
    #[arg(long)]
    payload_bytes: Option<u64>,

    /// Minimum movement in meters before re-probing
    #[arg(long)]
    threshold_m: Option<f64>,

    /// Failed-probe handling
    #[arg(long, value_enum)]
    retry: Option<Retry>,

    /// Extra attempts for --retry immediate
    #[arg(long, default_value = "1")]
    retry_attempts: u32,

    /// Serve snapshots over HTTP on this port
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Rewrite this JSON status file every 2 seconds
    #[arg(long)]
    status_file: Option<String>,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(url) = &self.probe_url {
            config.probe_url = url.clone();
        }
        if let Some(bytes) = self.payload_bytes {
            config.payload_bytes = Some(bytes);
        }
        if let Some(threshold) = self.threshold_m {
            config.distance_threshold_m = threshold;
        }
        if let Some(retry) = self.retry {
            config.retry = match retry {
                Retry::Skip => RetryPolicy::Skip,
                Retry::Immediate => RetryPolicy::Immediate {
                    attempts: self.retry_attempts,
                },
                Retry::NextUpdate => RetryPolicy::NextUpdate,
            };
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.engine_config()?;
    let poll = Duration::from_secs_f64(args.poll_secs.max(0.05));

    log::info!("Signal Tracker starting");
    log::info!("  Source: {:?}", args.source);
    log::info!("  Probe URL: {}", config.probe_url);
    log::info!("  Threshold: {:.2} m", config.distance_threshold_m);
    log::info!("  Retry: {:?}", config.retry);

    let probe = HttpProbe::new(&config.probe_url, config.probe_timeout(), config.payload_bytes);
    let engine = SamplingEngine::new(probe, &config);

    let shared: SharedSnapshot = Arc::new(RwLock::new(EngineSnapshot::default()));
    let health = Arc::new(PipelineHealth::default());
    let (tx, rx) = mpsc::channel::<PipelineEvent>(100);

    let mut source_handle = match args.source {
        Source::Mock => tokio::spawn(sources::mock_walk_loop(
            tx.clone(),
            health.clone(),
            poll,
            MockWalk::new(Position::new(37.7749, -122.4194), 3.0),
        )),
        Source::Termux => tokio::spawn(sources::termux_location_loop(tx.clone(), health.clone(), poll)),
        Source::Replay => {
            let path = args
                .replay
                .clone()
                .context("--source replay needs --replay <FILE>")?;
            tokio::spawn(sources::replay_loop(tx.clone(), health.clone(), path, poll))
        }
    };

    let _health_handle = tokio::spawn(health_monitor_task(health.clone()));

    if let Some(port) = args.dashboard_port {
        let state = DashboardState {
            snapshot: shared.clone(),
            events: tx.clone(),
            frame: Projector::new(config.frame_width, config.frame_height),
        };
        tokio::spawn(async move {
            if let Err(e) = dashboard::start_dashboard(state, port).await {
                log::error!("[DASHBOARD] {:#}", e);
            }
        });
    }

    if let Some(path) = args.status_file.clone() {
        let shared = shared.clone();
        let health = health.clone();
        let start = Utc::now();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(2));
            loop {
                ticker.tick().await;
                let uptime = Utc::now().signed_duration_since(start).num_seconds().max(0) as u64;
                let status = LiveStatus::from_snapshot(&*shared.read().await, &health, uptime);
                if let Err(e) = status.save(&path) {
                    log::warn!("Failed to write status file {}: {}", path, e);
                }
            }
        });
    }

    // The pipeline ends when every sender is gone or on shutdown: keep only the
    // source's (and the dashboard's) copies alive.
    drop(tx);
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut pipeline = tokio::spawn(run_pipeline(
        engine,
        rx,
        shared.clone(),
        health.clone(),
        stop_rx,
    ));

    let source_finished = tokio::select! {
        _ = stop_after(args.duration) => {
            log::info!("Duration reached, stopping...");
            false
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted, stopping...");
            false
        }
        _ = &mut source_handle => {
            log::info!("Position source finished");
            true
        }
    };
    source_handle.abort();

    // A finished source leaves its queued fixes to drain (a dashboard sender
    // keeps the pipeline open until Ctrl-C); otherwise stop right away and
    // abandon any in-flight probe.
    if source_finished {
        tokio::select! {
            _ = &mut pipeline => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping...");
                let _ = stop_tx.send(true);
            }
        }
    } else {
        let _ = stop_tx.send(true);
    }
    if !pipeline.is_finished() {
        if let Err(e) = pipeline.await {
            log::warn!("Pipeline task ended abnormally: {}", e);
        }
    }

    let snapshot = shared.read().await.clone();
    println!("\n=== Final Stats ===");
    println!("Position updates: {}", snapshot.stats.updates);
    println!("Accepted / rejected: {} / {}", snapshot.stats.accepted, snapshot.stats.rejected);
    println!("Probes ok / failed: {} / {}", snapshot.stats.probes_ok, snapshot.stats.probes_failed);
    println!("Trail points: {}", snapshot.trail.len());
    for sample in &snapshot.history {
        println!(
            "  {}  {:>8.2} Mbps  {}  [{} bars]",
            sample.timestamp,
            sample.mbps,
            sample.classification.quality,
            sample.classification.level.bars()
        );
    }
    println!("{}", health.format_status());

    Ok(())
}

/// Resolves after `secs` seconds, or never when `secs` is 0
async fn stop_after(secs: u64) {
    if secs == 0 {
        futures::future::pending::<()>().await;
    } else {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}
