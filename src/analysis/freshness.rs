/// Telemetry freshness detection.
///
/// The tank controller publishes every few seconds while it is healthy. A
/// window whose newest sample is old usually means the sensor, the relay, or
/// the controller's network link is down, and the forecast is then describing
/// the past rather than the present.
///
/// # Clock injection
/// All functions take a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, which keeps the checks deterministic in tests.

use chrono::{DateTime, Utc};

use crate::analysis::window::Window;
use crate::model::SensorSample;

/// Default freshness limit for the newest sample, in minutes.
pub const DEFAULT_MAX_SAMPLE_AGE_MINUTES: u64 = 60;

/// Age of `sample` relative to `now`, in whole minutes. Samples stamped in
/// the future report zero.
pub fn age_minutes_at(sample: &SensorSample, now: DateTime<Utc>) -> u64 {
    (now - sample.timestamp).num_minutes().max(0) as u64
}

/// Returns `true` if the sample is older than `max_age_minutes`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
pub fn is_stale_at(sample: &SensorSample, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    age_minutes_at(sample, now) > max_age_minutes
}

/// Window-level check on the newest sample. An empty window is not stale;
/// it is handled as "no data" before this is consulted.
pub fn window_is_stale_at(window: &Window, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    window
        .last()
        .map(|p| is_stale_at(&p.sample, max_age_minutes, now))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
