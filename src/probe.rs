use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::header::{CACHE_CONTROL, PRAGMA};

use crate::error::ProbeError;
use crate::types::Measurement;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One timed transfer producing a throughput measurement.
pub trait ThroughputProbe {
    fn probe(&self) -> impl Future<Output = Result<Measurement, ProbeError>> + Send;
}

/// `size_mb * 8 / elapsed_secs`, with MB = 2^20 bytes.
///
/// Zero, negative or non-finite durations fail instead of producing inf/NaN.
pub fn throughput_mbps(bytes: u64, elapsed_secs: f64) -> Result<f64, ProbeError> {
    if bytes == 0 {
        return Err(ProbeError::EmptyBody);
    }
    if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 {
        return Err(ProbeError::NonFiniteDuration(elapsed_secs));
    }

    let mbps = (bytes as f64 / BYTES_PER_MB) * 8.0 / elapsed_secs;
    if !mbps.is_finite() {
        return Err(ProbeError::NonFiniteDuration(elapsed_secs));
    }
    Ok(mbps)
}

/// Downloads a reference resource over HTTP, bypassing caches.
///
/// Timing starts right before the request is issued and stops once the whole
/// body has been read.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    payload_bytes: Option<u64>,
}

impl HttpProbe {
    /// `payload_bytes` overrides the received body length as the Mbps numerator.
    pub fn new(url: &str, timeout: Duration, payload_bytes: Option<u64>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Signal Tracker/0.1.0")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        HttpProbe {
            client,
            url: url.to_string(),
            payload_bytes,
        }
    }
}

impl ThroughputProbe for HttpProbe {
    async fn probe(&self) -> Result<Measurement, ProbeError> {
        let start = Instant::now();

        let response = self
            .client
            .get(&self.url)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout
                } else {
                    ProbeError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else {
                ProbeError::Body(e.to_string())
            }
        })?;
        let elapsed = start.elapsed().as_secs_f64();

        if body.is_empty() {
            return Err(ProbeError::EmptyBody);
        }
        if let Some(expected) = self.payload_bytes {
            if expected != body.len() as u64 {
                log::debug!(
                    "Probe body was {} bytes, configured payload is {} bytes",
                    body.len(),
                    expected
                );
            }
        }

        let bytes = self.payload_bytes.unwrap_or(body.len() as u64);
        let mbps = throughput_mbps(bytes, elapsed)?;
        log::debug!(
            "Probe: {} bytes in {:.3}s = {:.2} Mbps",
            body.len(),
            elapsed,
            mbps
        );
        Ok(Measurement::new(mbps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use axum::{http::HeaderMap, http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_throughput_formula() {
        // 1 MiB in one second = 8 Mbps
        assert_relative_eq!(throughput_mbps(1024 * 1024, 1.0).unwrap(), 8.0);
        assert_relative_eq!(throughput_mbps(1024 * 1024, 0.25).unwrap(), 32.0);
        assert_relative_eq!(throughput_mbps(512 * 1024, 2.0).unwrap(), 2.0);
    }

    #[test]
    fn test_zero_elapsed_fails() {
        assert_eq!(
            throughput_mbps(1024, 0.0),
            Err(ProbeError::NonFiniteDuration(0.0))
        );
        assert!(throughput_mbps(1024, -1.0).is_err());
        assert!(throughput_mbps(1024, f64::NAN).is_err());
        assert!(throughput_mbps(1024, f64::INFINITY).is_err());
    }

    #[test]
    fn test_zero_bytes_fails() {
        assert_eq!(throughput_mbps(0, 1.0), Err(ProbeError::EmptyBody));
    }

    #[tokio::test]
    async fn test_probe_downloads_full_body() {
        let router = Router::new().route(
            "/1MB.test",
            get(|headers: HeaderMap| async move {
                let no_store = headers
                    .get("cache-control")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.contains("no-store"))
                    .unwrap_or(false);
                if no_store {
                    Ok(vec![7u8; 256 * 1024])
                } else {
                    Err(StatusCode::PRECONDITION_FAILED)
                }
            }),
        );
        let base = serve(router).await;

        let probe = HttpProbe::new(&format!("{}/1MB.test", base), Duration::from_secs(5), None);
        let measurement = probe.probe().await.unwrap();

        assert!(measurement.throughput_mbps.is_finite());
        assert!(measurement.throughput_mbps > 0.0);
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let router = Router::new().route("/gone", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve(router).await;

        let probe = HttpProbe::new(&format!("{}/gone", base), Duration::from_secs(5), None);
        assert_eq!(probe.probe().await, Err(ProbeError::HttpStatus(503)));
    }

    #[tokio::test]
    async fn test_empty_body_fails() {
        let router = Router::new().route("/empty", get(|| async { "" }));
        let base = serve(router).await;

        let probe = HttpProbe::new(&format!("{}/empty", base), Duration::from_secs(5), None);
        assert_eq!(probe.probe().await, Err(ProbeError::EmptyBody));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(&format!("http://{}/x", addr), Duration::from_secs(5), None);
        match probe.probe().await {
            Err(ProbeError::Transport(_)) | Err(ProbeError::Timeout) => {}
            other => panic!("expected transport failure, got {:?}", other),
        }
    }
}
