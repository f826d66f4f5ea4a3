//! Window-level summary statistics.

use crate::analysis::window::Window;
use crate::model::StatsSnapshot;

/// Summarizes the window. Optional fields missing from every sample report `0.0`.
pub fn summarize(window: &Window) -> StatsSnapshot {
    let levels: Vec<f64> = window.levels().collect();
    let flows: Vec<f64> = window.points().iter().filter_map(|p| p.sample.flow).collect();
    let qualities: Vec<f64> = window.points().iter().filter_map(|p| p.sample.quality).collect();

    StatsSnapshot {
        avg_level: mean(&levels),
        min_level: levels.iter().copied().reduce(f64::min).unwrap_or(0.0),
        max_level: levels.iter().copied().reduce(f64::max).unwrap_or(0.0),
        avg_flow: mean(&flows),
        avg_quality: mean(&qualities),
        sample_count: window.len(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
