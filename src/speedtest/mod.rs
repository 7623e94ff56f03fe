pub mod cancel;
pub mod download;
pub mod engine;
pub mod jitter;
pub mod meter;
pub mod ping;
pub mod transport;
pub mod upload;

pub use cancel::CancelFlag;
pub use engine::SpeedTestEngine;
pub use meter::Sample;
pub use transport::{BodyStream, HttpTransport, Transport, TransportError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Aggregate of one full run. Built by the orchestrator, never by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedTestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
    pub jitter_ms: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TestPhase {
    #[default]
    Idle,
    Ping,
    Jitter,
    Download,
    Upload,
    Complete,
}

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("body stream failed: {0}")]
    Stream(#[source] std::io::Error),
    #[error("response body was empty")]
    EmptyBody,
    #[error("transfer completed too fast to measure")]
    TooFast,
    #[error("no probe succeeded")]
    NoSuccessfulProbes,
}

/// Outcome of a single-valued measurement (ping, jitter).
#[derive(Debug)]
pub enum Measurement {
    Measured(f64),
    Cancelled,
    Failed(MeasureError),
}

impl Measurement {
    /// The measured value, or `0.0` when cancelled or failed.
    pub fn value(&self) -> f64 {
        match self {
            Measurement::Measured(value) => *value,
            Measurement::Cancelled | Measurement::Failed(_) => 0.0,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Measurement::Measured(_))
    }
}

/// One item of a download or upload sequence.
///
/// Every sequence ends with exactly one of `Complete`, `Cancelled` or `Failed`.
#[derive(Debug)]
pub enum SpeedUpdate {
    Progress(Sample),
    Complete(Sample),
    Cancelled,
    Failed(MeasureError),
}

impl SpeedUpdate {
    pub fn mbps(&self) -> f64 {
        match self {
            SpeedUpdate::Progress(sample) | SpeedUpdate::Complete(sample) => sample.mbps,
            SpeedUpdate::Cancelled | SpeedUpdate::Failed(_) => 0.0,
        }
    }

    pub fn sample(&self) -> Option<&Sample> {
        match self {
            SpeedUpdate::Progress(sample) | SpeedUpdate::Complete(sample) => Some(sample),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SpeedUpdate::Progress(_))
    }
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation; `None` below two values.
pub(crate) fn population_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance = values.iter().map(|&x| (x - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}
