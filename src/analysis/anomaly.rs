//! Heuristic anomaly detection over a telemetry window.
//!
//! Every rule is evaluated on every run and the result is the union, in the
//! fixed order spike, depletion, stuck. No rule short-circuits another.

use crate::analysis::window::Window;
use crate::model::AnomalyFlag;

/// Default jump between consecutive readings, in cm, above which a spike is flagged.
pub const DEFAULT_SPIKE_THRESHOLD_CM: f64 = 10.0;

/// Default magnitude of the sustained level decline, in cm/hour, beyond which
/// fast depletion is flagged.
pub const DEFAULT_DEPLETION_RATE_CM_PER_HOUR: f64 = 15.0;

/// Default minimum window size before an unchanging level counts as stuck.
pub const DEFAULT_STUCK_MIN_SAMPLES: usize = 2;

/// Tunable limits for the detector rules.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyThresholds {
    /// Flags any consecutive level jump strictly greater than this delta.
    pub spike_threshold_cm: f64,
    /// Flags a first-to-last rate more negative than `-depletion_rate_cm_per_hour`.
    pub depletion_rate_cm_per_hour: f64,
    /// Windows smaller than this are never reported as stuck.
    pub stuck_min_samples: usize,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            spike_threshold_cm: DEFAULT_SPIKE_THRESHOLD_CM,
            depletion_rate_cm_per_hour: DEFAULT_DEPLETION_RATE_CM_PER_HOUR,
            stuck_min_samples: DEFAULT_STUCK_MIN_SAMPLES,
        }
    }
}

/// Runs all rules against the window.
pub fn detect(window: &Window, thresholds: &AnomalyThresholds) -> Vec<AnomalyFlag> {
    let mut flags = Vec::new();

    if has_spike(window, thresholds.spike_threshold_cm) {
        flags.push(AnomalyFlag::SensorSpike);
    }
    if is_depleting_fast(window, thresholds.depletion_rate_cm_per_hour) {
        flags.push(AnomalyFlag::FastDepletion);
    }
    if is_stuck(window, thresholds.stuck_min_samples) {
        flags.push(AnomalyFlag::SensorStuck);
    }

    flags
}

/// `true` if any consecutive pair of levels differs by more than `threshold_cm`.
pub fn has_spike(window: &Window, threshold_cm: f64) -> bool {
    window
        .points()
        .windows(2)
        .any(|pair| (pair[1].sample.level - pair[0].sample.level).abs() > threshold_cm)
}

/// Level change per hour between the first and last sample.
///
/// `None` when the window has fewer than two samples or they share a timestamp.
pub fn depletion_rate_cm_per_hour(window: &Window) -> Option<f64> {
    let (first, last) = (window.first()?, window.last()?);
    let span_ms = (last.sample.timestamp - first.sample.timestamp).num_milliseconds();
    if span_ms <= 0 {
        return None;
    }
    let hours = span_ms as f64 / 3_600_000.0;
    Some((last.sample.level - first.sample.level) / hours)
}

/// `true` if the level fell faster than `max_rate_cm_per_hour`.
///
/// A negative rate is a falling level, which is the emptying direction.
pub fn is_depleting_fast(window: &Window, max_rate_cm_per_hour: f64) -> bool {
    depletion_rate_cm_per_hour(window)
        .map(|rate| rate < -max_rate_cm_per_hour)
        .unwrap_or(false)
}

/// `true` if the window holds at least `min_samples` readings and every level
/// is bit-identical.
pub fn is_stuck(window: &Window, min_samples: usize) -> bool {
    if window.len() < min_samples.max(2) {
        return false;
    }
    let mut levels = window.levels().map(f64::to_bits);
    match levels.next() {
        Some(first) => levels.all(|bits| bits == first),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::window::build;
    use crate::model::SensorSample;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    /// Samples spaced `step_minutes` apart.
    fn window_spaced(levels: &[f64], step_minutes: i64) -> Window {
        let samples = levels
            .iter()
            .enumerate()
            .map(|(i, &level)| SensorSample {
                timestamp: start() + Duration::minutes(i as i64 * step_minutes),
                level,
                flow: None,
                quality: None,
            })
            .collect();
        build(samples, Duration::hours(48), start() + Duration::hours(24))
    }

    fn defaults() -> AnomalyThresholds {
        AnomalyThresholds::default()
    }

    // --- SensorSpike --------------------------------------------------------

    #[test]
    fn test_jump_above_ten_cm_is_a_spike() {
        let window = window_spaced(&[30.0, 30.5, 41.0, 41.2], 10);
        assert!(has_spike(&window, 10.0));
        assert!(detect(&window, &defaults()).contains(&AnomalyFlag::SensorSpike));
    }

    #[test]
    fn test_jump_of_exactly_ten_cm_is_not_a_spike() {
        let window = window_spaced(&[30.0, 40.0, 30.0, 40.0], 10);
        assert!(!has_spike(&window, 10.0), "threshold is strictly greater than");
    }

    #[test]
    fn test_spike_rule_needs_two_samples() {
        let window = window_spaced(&[99.0], 10);
        assert!(!has_spike(&window, 10.0));
    }

    #[test]
    fn test_negative_jump_counts_as_spike() {
        let window = window_spaced(&[40.0, 25.0], 10);
        assert!(has_spike(&window, 10.0));
    }

    // --- FastDepletion ------------------------------------------------------

    #[test]
    fn test_fast_depletion_sign_convention() {
        // Level falls 20 cm in one hour: rate is -20 cm/h, steeper than -15.
        let falling = window_spaced(&[50.0, 40.0, 30.0], 30);
        assert_eq!(depletion_rate_cm_per_hour(&falling), Some(-20.0));
        assert!(is_depleting_fast(&falling, 15.0));

        // The same magnitude rising must not be flagged.
        let rising = window_spaced(&[30.0, 40.0, 50.0], 30);
        assert_eq!(depletion_rate_cm_per_hour(&rising), Some(20.0));
        assert!(!is_depleting_fast(&rising, 15.0));
    }

    #[test]
    fn test_slow_depletion_is_not_flagged() {
        // -10 cm over two hours = -5 cm/h.
        let window = window_spaced(&[50.0, 45.0, 40.0], 60);
        assert!(!is_depleting_fast(&window, 15.0));
    }

    #[test]
    fn test_zero_time_span_is_not_flagged() {
        let samples = vec![
            SensorSample { timestamp: start(), level: 80.0, flow: None, quality: None },
            SensorSample { timestamp: start(), level: 10.0, flow: None, quality: None },
        ];
        let window = build(samples, Duration::hours(1), start());
        assert_eq!(depletion_rate_cm_per_hour(&window), None);
        assert!(!is_depleting_fast(&window, 15.0));
    }

    // --- SensorStuck --------------------------------------------------------

    #[test]
    fn test_identical_levels_are_stuck() {
        let window = window_spaced(&[42.5, 42.5, 42.5], 5);
        assert!(is_stuck(&window, 2));
        assert_eq!(detect(&window, &defaults()), vec![AnomalyFlag::SensorStuck]);
    }

    #[test]
    fn test_single_sample_is_never_stuck() {
        let window = window_spaced(&[42.5], 5);
        assert!(!is_stuck(&window, 2));
        assert!(!is_stuck(&window, 1), "one sample is no evidence even if configured lower");
    }

    #[test]
    fn test_tiny_variation_is_not_stuck() {
        let window = window_spaced(&[42.5, 42.5, 42.500001], 5);
        assert!(!is_stuck(&window, 2));
    }

    #[test]
    fn test_stuck_respects_min_samples() {
        let window = window_spaced(&[42.5, 42.5, 42.5], 5);
        assert!(!is_stuck(&window, 4));
    }

    // --- Union --------------------------------------------------------------

    #[test]
    fn test_all_rules_run_and_preserve_detection_order() {
        // 60 -> 45 spike, and a 30 cm fall over 40 minutes.
        let window = window_spaced(&[60.0, 45.0, 40.0, 30.0], 10);
        let flags = detect(&window, &defaults());
        assert_eq!(flags, vec![AnomalyFlag::SensorSpike, AnomalyFlag::FastDepletion]);
    }

    #[test]
    fn test_quiet_window_has_no_flags() {
        let window = window_spaced(&[50.0, 49.0, 48.5, 48.0], 15);
        assert!(detect(&window, &defaults()).is_empty());
    }

    #[test]
    fn test_custom_thresholds_change_results() {
        let window = window_spaced(&[50.0, 44.0], 60);
        let strict = AnomalyThresholds {
            spike_threshold_cm: 5.0,
            depletion_rate_cm_per_hour: 5.0,
            stuck_min_samples: 2,
        };
        assert_eq!(
            detect(&window, &strict),
            vec![AnomalyFlag::SensorSpike, AnomalyFlag::FastDepletion]
        );
        assert!(detect(&window, &defaults()).is_empty());
    }
}
