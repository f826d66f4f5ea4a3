//! Emptying-time forecast from a least-squares trend of level over elapsed time.

use crate::analysis::window::Window;
use crate::model::Forecast;

/// Minimum number of samples before a trend is fitted.
pub const MIN_FORECAST_SAMPLES: usize = 4;

/// Ordinary least-squares fit `level = slope * elapsed_seconds + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// cm per second.
    pub slope: f64,
    /// cm at elapsed zero.
    pub intercept: f64,
}

/// Fits a line through the window's (elapsed, level) points.
///
/// Returns `None` for fewer than two points or when every point shares the
/// same elapsed time (no time axis to fit against).
pub fn fit_trend(window: &Window) -> Option<LinearFit> {
    let points = window.points();
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let x_mean = points.iter().map(|p| p.elapsed_seconds).sum::<f64>() / n;
    let y_mean = points.iter().map(|p| p.sample.level).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for p in points {
        let x_diff = p.elapsed_seconds - x_mean;
        numerator += x_diff * (p.sample.level - y_mean);
        denominator += x_diff * x_diff;
    }

    if denominator == 0.0 {
        return None;
    }

    let slope = numerator / denominator;
    Some(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

/// Projects when the fitted level reaches `empty_threshold`.
///
/// A falling level is the emptying direction; a flat or rising trend
/// (including a slope of exactly zero) reports [`Forecast::Filling`].
pub fn forecast_empty_time(window: &Window, empty_threshold: f64) -> Forecast {
    if window.len() < MIN_FORECAST_SAMPLES {
        return Forecast::InsufficientData;
    }

    let Some(fit) = fit_trend(window) else {
        return Forecast::InsufficientData;
    };

    if fit.slope >= 0.0 {
        return Forecast::Filling;
    }

    let t_empty = (empty_threshold - fit.intercept) / fit.slope;
    let last_elapsed = window.last().map(|p| p.elapsed_seconds).unwrap_or(0.0);

    if t_empty < last_elapsed {
        return Forecast::NearEmpty;
    }

    Forecast::Estimate {
        eta_minutes: (t_empty - last_elapsed) / 60.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
