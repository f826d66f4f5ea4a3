/// Telemetry store access.
///
/// The `TelemetryStore` trait is the narrow seam between the analysis
/// pipeline and the persistent store. Records are fetched as raw JSON and
/// parsed one at a time, so a single malformed record is dropped without
/// affecting the rest of the batch.
///
/// Submodules:
/// - `firebase`: realtime-database REST client (`reqwest::blocking`).

pub mod firebase;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::analysis::window::{self, Window};
use crate::logging::{self, Component};
use crate::model::{SensorSample, StoreError};

// ---------------------------------------------------------------------------
// Store interface
// ---------------------------------------------------------------------------

/// A hierarchical key-value store of timestamped JSON records.
pub trait TelemetryStore {
    /// Returns every child record under `path`, keyed by its opaque store key.
    /// A missing path is an empty map, not an error.
    fn fetch(&self, path: &str) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Inserts `record` under `path` with a store-generated key and returns
    /// that key. Never updates existing records.
    fn append(&self, path: &str, record: &Value) -> Result<String, StoreError>;
}

// ---------------------------------------------------------------------------
// Field names
// ---------------------------------------------------------------------------

/// Accepted names for each field, canonical first, then the names written by
/// the MQTT relay.
const LEVEL_FIELDS: &[&str] = &["level", "distance_cm"];
const FLOW_FIELDS: &[&str] = &["flow", "flow_lpm"];
const QUALITY_FIELDS: &[&str] = &["quality", "tds_ppm"];

// ---------------------------------------------------------------------------
// Per-record parsing
// ---------------------------------------------------------------------------

/// Parses an ISO-8601 timestamp into UTC.
///
/// A trailing `Z` is normalized to `+00:00`. Basic-format offsets (`+0000`)
/// are accepted. Timestamps without an offset (the relay writes
/// `datetime.isoformat()` output) are taken as UTC, and a bare date is
/// midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let normalized = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(stem) => format!("{}+00:00", stem),
        None => s.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    let with_offset = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok());
    if let Some(dt) = with_offset {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Reads a finite number from JSON, accepting numeric strings.
fn number_field(record: &Value, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| {
        let value = match record.get(*name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    })
}

/// Parses one raw store record. Returns `None` if the timestamp or the level
/// is missing or unusable; optional fields that fail to parse are absent.
pub fn parse_record(record: &Value) -> Option<SensorSample> {
    let timestamp = record.get("timestamp")?.as_str().and_then(parse_timestamp)?;
    let level = number_field(record, LEVEL_FIELDS)?;

    Some(SensorSample {
        timestamp,
        level,
        flow: number_field(record, FLOW_FIELDS),
        quality: number_field(record, QUALITY_FIELDS),
    })
}

// ---------------------------------------------------------------------------
// Window retrieval
// ---------------------------------------------------------------------------

/// Fetches and parses every record under `path`.
///
/// Never fails: an unreachable store or an empty path yields an empty list,
/// and malformed records are dropped individually.
pub fn fetch_samples(store: &dyn TelemetryStore, path: &str) -> Vec<SensorSample> {
    let records = match store.fetch(path) {
        Ok(records) => records,
        Err(e) => {
            logging::log_store_failure(path, "fetch", &e);
            return Vec::new();
        }
    };

    let total = records.len();
    let samples: Vec<SensorSample> = records
        .iter()
        .filter_map(|(key, record)| {
            let parsed = parse_record(record);
            if parsed.is_none() {
                logging::debug(Component::Store, Some(key.as_str()), "dropped malformed record");
            }
            parsed
        })
        .collect();

    logging::log_fetch_summary(path, total, samples.len(), total - samples.len());
    samples
}

/// Fetches the telemetry window covering the last `lookback_hours` before `now`.
pub fn fetch_window(
    store: &dyn TelemetryStore,
    path: &str,
    lookback_hours: f64,
    now: DateTime<Utc>,
) -> Window {
    window::build_hours(fetch_samples(store, path), lookback_hours, now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
