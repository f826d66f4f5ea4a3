/// SensorSample, Forecast, AnomalyFlag, StatsSnapshot, Report, StoreError, GenerationError
/// core data structures and error handling
///
/// Core data types for the tank telemetry analysis service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic and no I/O, only types and their display forms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single telemetry point relayed from the tank controller.
///
/// `level` is the ultrasonic distance from the sensor to the water surface,
/// in centimeters. The analysis treats a falling `level` as the tank
/// draining toward the configured empty threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: DateTime<Utc>,
    pub level: f64,
    /// Flow rate, liters/minute.
    pub flow: Option<f64>,
    /// Total dissolved solids, ppm.
    pub quality: Option<f64>,
}

// ---------------------------------------------------------------------------
// Analysis results
// ---------------------------------------------------------------------------

/// Outcome of the emptying-time forecast for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Forecast {
    /// Fitted trend is flat or rising.
    Filling,
    /// The projected crossing lies before the last observed sample.
    NearEmpty,
    /// Fewer samples than the fit requires.
    InsufficientData,
    /// Minutes remaining after the last sample until the threshold is reached.
    Estimate { eta_minutes: f64 },
}

impl fmt::Display for Forecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Forecast::Filling => {
                write!(f, "Level trend is flat or rising; the tank is not emptying.")
            }
            Forecast::NearEmpty => write!(
                f,
                "The empty threshold was already crossed within the observed window; the tank is critically low."
            ),
            Forecast::InsufficientData => {
                write!(f, "Not enough samples to fit a trend (at least 4 are required).")
            }
            Forecast::Estimate { eta_minutes } => write!(
                f,
                "The tank is projected to reach the empty threshold in {:.1} minutes.",
                eta_minutes
            ),
        }
    }
}

/// Heuristic conditions raised by the anomaly detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyFlag {
    /// Two consecutive readings differ by more than the spike threshold.
    SensorSpike,
    /// The level changed faster than the allowed depletion rate.
    FastDepletion,
    /// Every reading in the window reports the same level.
    SensorStuck,
}

impl fmt::Display for AnomalyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyFlag::SensorSpike => write!(f, "SensorSpike"),
            AnomalyFlag::FastDepletion => write!(f, "FastDepletion"),
            AnomalyFlag::SensorStuck => write!(f, "SensorStuck"),
        }
    }
}

/// Window-level summary statistics.
///
/// Fields that no sample in the window carries are reported as `0.0`, so the
/// narrator prompt always receives numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub avg_level: f64,
    pub min_level: f64,
    pub max_level: f64,
    pub avg_flow: f64,
    pub avg_quality: f64,
    pub sample_count: usize,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// The artifact produced by one pipeline run and appended to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Generation instant.
    pub timestamp: DateTime<Utc>,
    pub forecast: Forecast,
    pub anomalies: Vec<AnomalyFlag>,
    pub stats: StatsSnapshot,
    pub narrative: String,
    /// Newest sample was older than the freshness limit at generation time.
    pub stale: bool,
    /// The most recent samples handed to the narrator.
    pub raw_window: Vec<SensorSample>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when reading from or writing to the telemetry store.
#[derive(Debug, PartialEq)]
pub enum StoreError {
    /// Non-2xx HTTP response from the store.
    HttpError(u16),
    /// The request never produced a response (DNS, TLS, timeout).
    Transport(String),
    /// The response body could not be deserialized.
    ParseError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::HttpError(code) => write!(f, "HTTP error: {}", code),
            StoreError::Transport(msg) => write!(f, "Transport error: {}", msg),
            StoreError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from the text-generation backend.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// The backend process could not be started.
    Spawn(String),
    /// The backend process exited with a non-zero status.
    Failed { code: Option<i32>, stderr: String },
    /// No result within the configured limit, in seconds.
    Timeout(u64),
    /// HTTP backend returned a non-2xx status.
    HttpError(u16),
    /// HTTP backend could not be reached or its body could not be read.
    Transport(String),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Spawn(msg) => write!(f, "failed to start backend: {}", msg),
            GenerationError::Failed { code: Some(code), stderr } => {
                write!(f, "backend exited with status {}: {}", code, stderr)
            }
            GenerationError::Failed { code: None, stderr } => {
                write!(f, "backend terminated by signal: {}", stderr)
            }
            GenerationError::Timeout(secs) => {
                write!(f, "generation timed out after {}s", secs)
            }
            GenerationError::HttpError(code) => write!(f, "HTTP error: {}", code),
            GenerationError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for GenerationError {}
