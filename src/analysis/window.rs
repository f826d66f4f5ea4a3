//! Window construction: lookback filtering, ordering, and the elapsed-time axis.
//!
//! The elapsed axis is measured from the first sample of the window, so it is
//! stable for a fixed window but not comparable across runs whose windows
//! start at different instants.

use chrono::{DateTime, Duration, Utc};

use crate::model::SensorSample;

/// One sample positioned on the window's elapsed-time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPoint {
    pub sample: SensorSample,
    /// Seconds since the first sample of the window.
    pub elapsed_seconds: f64,
}

/// Samples inside the lookback period, ascending by timestamp.
///
/// Duplicate timestamps are kept; only the ordering is enforced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    points: Vec<WindowPoint>,
}

impl Window {
    pub fn points(&self) -> &[WindowPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&WindowPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&WindowPoint> {
        self.points.last()
    }

    pub fn levels(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.sample.level)
    }

    /// The most recent `n` samples, oldest first.
    pub fn tail(&self, n: usize) -> Vec<SensorSample> {
        let start = self.points.len().saturating_sub(n);
        self.points[start..].iter().map(|p| p.sample.clone()).collect()
    }
}

/// Builds the window for `[now - lookback, ..]` from parsed samples.
///
/// Returns an empty window when nothing survives the filter.
pub fn build(samples: Vec<SensorSample>, lookback: Duration, now: DateTime<Utc>) -> Window {
    let cutoff = now
        .checked_sub_signed(lookback)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut kept: Vec<SensorSample> = samples
        .into_iter()
        .filter(|s| s.timestamp >= cutoff)
        .collect();

    // Stable sort keeps store order among equal timestamps.
    kept.sort_by_key(|s| s.timestamp);

    let Some(origin) = kept.first().map(|s| s.timestamp) else {
        return Window::default();
    };

    let points = kept
        .into_iter()
        .map(|sample| {
            let elapsed_ms = (sample.timestamp - origin).num_milliseconds();
            WindowPoint {
                elapsed_seconds: elapsed_ms as f64 / 1000.0,
                sample,
            }
        })
        .collect();

    Window { points }
}

/// Convenience wrapper over [`build`] taking the lookback in hours.
///
/// Lookbacks beyond the representable range cover all history.
pub fn build_hours(samples: Vec<SensorSample>, lookback_hours: f64, now: DateTime<Utc>) -> Window {
    let millis = (lookback_hours * 3_600_000.0).clamp(0.0, i64::MAX as f64) as i64;
    let lookback = Duration::milliseconds(millis);
    build(samples, lookback, now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
