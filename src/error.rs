use thiserror::Error;

/// Throughput probe failure. Every variant is a failed cycle: no sample is recorded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    #[error("Transfer failed: {0}")]
    Transport(String),

    #[error("Transfer timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Response body was empty")]
    EmptyBody,

    #[error("Elapsed transfer time was not measurable ({0:?}s)")]
    NonFiniteDuration(f64),
}

/// Device position source reported an error instead of a fix
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Position unavailable: {reason}")]
pub struct PositionUnavailable {
    pub reason: String,
}

impl PositionUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}
