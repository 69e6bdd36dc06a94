use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::Sender;
use tokio::time::interval;
use tower_http::cors::CorsLayer;

use crate::engine::{PipelineEvent, SharedSnapshot};
use crate::projection::{Projection, Projector, SchematicDot};
use crate::types::{Position, Sample, TrailPoint};

/// State shared by the HTTP handlers: the latest snapshot and a handle to
/// request manual rechecks.
#[derive(Clone)]
pub struct DashboardState {
    pub snapshot: SharedSnapshot,
    pub events: Sender<PipelineEvent>,
    pub frame: Projector,
}

#[derive(Serialize)]
struct TrailView {
    current_position: Option<Position>,
    points: Vec<TrailPoint>,
}

#[derive(Serialize)]
struct ProjectionView {
    width: f64,
    height: f64,
    projection: Projection,
    dots: Vec<SchematicDot>,
}

#[derive(Deserialize)]
struct ProjectionParams {
    width: Option<f64>,
    height: Option<f64>,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/history", get(history_handler))
        .route("/api/trail", get(trail_handler))
        .route("/api/projection", get(projection_handler))
        .route("/api/recheck", post(recheck_handler))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_dashboard(state: DashboardState, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding dashboard to {}", addr))?;
    log::info!("[DASHBOARD] Serving snapshots at http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("dashboard server stopped")?;
    Ok(())
}

async fn snapshot_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await.clone();
    Json(snapshot)
}

async fn history_handler(State(state): State<DashboardState>) -> Json<Vec<Sample>> {
    Json(state.snapshot.read().await.history.clone())
}

async fn trail_handler(State(state): State<DashboardState>) -> Json<TrailView> {
    let snapshot = state.snapshot.read().await;
    Json(TrailView {
        current_position: snapshot.current_position,
        points: snapshot.trail.clone(),
    })
}

async fn projection_handler(
    State(state): State<DashboardState>,
    Query(params): Query<ProjectionParams>,
) -> Result<Json<ProjectionView>, (StatusCode, String)> {
    let width = params.width.unwrap_or(state.frame.width);
    let height = params.height.unwrap_or(state.frame.height);
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("invalid surface size {}x{}", width, height),
        ));
    }

    let trail = state.snapshot.read().await.trail.clone();
    let projection = Projector::new(width, height).project(&trail);
    let dots = projection.schematic(&trail);
    Ok(Json(ProjectionView {
        width,
        height,
        projection,
        dots,
    }))
}

async fn recheck_handler(State(state): State<DashboardState>) -> StatusCode {
    match state.events.try_send(PipelineEvent::Recheck) {
        Ok(_) => StatusCode::ACCEPTED,
        Err(e) => {
            log::warn!("[DASHBOARD] Recheck not queued: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<DashboardState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: DashboardState) {
    let (mut sender, mut receiver) = socket.split();
    let mut ticker = interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let json = {
                    let snapshot = state.snapshot.read().await;
                    match serde_json::to_string(&*snapshot) {
                        Ok(json) => json,
                        Err(e) => {
                            log::error!("[DASHBOARD] Failed to encode snapshot: {}", e);
                            break;
                        }
                    }
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    log::debug!("[DASHBOARD] WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::test_support::ScriptedProbe;
    use crate::engine::{EngineSnapshot, SamplingEngine};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tokio::sync::{mpsc, RwLock};
    use tower::ServiceExt;

    async fn populated_state() -> (DashboardState, mpsc::Receiver<PipelineEvent>) {
        let mut engine = SamplingEngine::new(
            ScriptedProbe::new(vec![Ok(60.0), Ok(8.0)]),
            &EngineConfig::default(),
        );
        engine.handle_update(Ok(Position::new(10.0, 10.0))).await;
        engine.handle_update(Ok(Position::new(20.0, 20.0))).await;

        let (tx, rx) = mpsc::channel(1);
        let state = DashboardState {
            snapshot: Arc::new(RwLock::new(engine.snapshot())),
            events: tx,
            frame: Projector::default(),
        };
        (state, rx)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_snapshot_endpoint() {
        let (state, _rx) = populated_state().await;
        let (status, json) = get_json(router(state), "/api/snapshot").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["trail"].as_array().unwrap().len(), 2);
        assert_eq!(json["latest"]["quality"], "Fair");
        assert_eq!(json["stats"]["probes_ok"], 2);
    }

    #[tokio::test]
    async fn test_history_and_trail_endpoints() {
        let (state, _rx) = populated_state().await;

        let (_, history) = get_json(router(state.clone()), "/api/history").await;
        assert_eq!(history.as_array().unwrap().len(), 2);
        assert_eq!(history[0]["mbps"], 60.0);

        let (_, trail) = get_json(router(state), "/api/trail").await;
        assert_eq!(trail["current_position"]["latitude"], 20.0);
        assert_eq!(trail["points"][1]["classification"]["level"], 2);
    }

    #[tokio::test]
    async fn test_projection_endpoint_custom_size() {
        let (state, _rx) = populated_state().await;
        let (status, json) = get_json(router(state), "/api/projection?width=100&height=50").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["projection"]["frame"]["top_left"]["latitude"], 20.0);
        // (20, 20) is the north-east corner
        assert_eq!(json["projection"]["points"][1]["x"], 100.0);
        assert_eq!(json["projection"]["points"][1]["y"], 0.0);
        assert_eq!(json["dots"][0]["color"], "green");
        assert_eq!(json["dots"][1]["color"], "red");
    }

    #[tokio::test]
    async fn test_projection_rejects_bad_size() {
        let (state, _rx) = populated_state().await;
        let (status, _) = get_json(router(state), "/api/projection?width=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_recheck_queues_event() {
        let (state, mut rx) = populated_state().await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/recheck")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Recheck)));

        drop(rx);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/recheck")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_empty_snapshot_serializes() {
        let (tx, _rx) = mpsc::channel(1);
        let state = DashboardState {
            snapshot: Arc::new(RwLock::new(EngineSnapshot::default())),
            events: tx,
            frame: Projector::default(),
        };
        let (status, json) = get_json(router(state), "/api/projection").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["width"], 400.0);
        assert!(json["projection"]["points"].as_array().unwrap().is_empty());
    }
}
