//! Report orchestration: Fetch → Analyze → Narrate → Persist.
//!
//! Each run is one sequential batch pass with no retries. Only configuration
//! problems stop the process (see `app`); inside a run every failure degrades
//! to a documented terminal state or placeholder so the numeric findings of a
//! run are never lost.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::analysis::anomaly::{self, AnomalyThresholds};
use crate::analysis::window::Window;
use crate::analysis::{forecast, freshness, stats};
use crate::config::Config;
use crate::ingest::{self, TelemetryStore};
use crate::logging::{self, Component};
use crate::model::{AnomalyFlag, Forecast, Report, StatsSnapshot};
use crate::narrate::{self, Findings, TextGenerator};

/// Lookback used by the daily raw-data summary.
pub const DAILY_SUMMARY_LOOKBACK_HOURS: f64 = 24.0;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sensor_path: String,
    pub reports_path: String,
    pub summaries_path: String,
    pub lookback_hours: f64,
    pub empty_threshold_cm: f64,
    pub thresholds: AnomalyThresholds,
    pub max_sample_age_minutes: u64,
    /// Samples included in the prompt and in `Report::raw_window`.
    pub prompt_tail: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sensor_path: config.store.sensor_path.clone(),
            reports_path: config.store.reports_path.clone(),
            summaries_path: config.store.summaries_path.clone(),
            lookback_hours: config.analysis.lookback_hours,
            empty_threshold_cm: config.analysis.empty_threshold_cm,
            thresholds: config.analysis.thresholds(),
            max_sample_age_minutes: config.analysis.max_sample_age_minutes,
            prompt_tail: config.narrator.prompt_tail,
        }
    }
}

// ---------------------------------------------------------------------------
// Stages and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Analyze,
    Narrate,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Analyze => write!(f, "analyze"),
            Stage::Narrate => write!(f, "narrate"),
            Stage::Persist => write!(f, "persist"),
        }
    }
}

fn enter(stage: Stage, message: &str) {
    let label = stage.to_string();
    logging::info(Component::Pipeline, Some(label.as_str()), message);
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The window was empty; nothing was generated or written.
    NoData,
    /// A report was produced. `persisted_key` is the store key of the
    /// appended record, or `None` if the write failed.
    Completed {
        report: Report,
        persisted_key: Option<String>,
    },
}

/// The three independent analyses of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub forecast: Forecast,
    pub anomalies: Vec<AnomalyFlag>,
    pub stats: StatsSnapshot,
    pub stale: bool,
}

/// Runs forecast, anomaly detection, statistics, and the freshness check.
pub fn analyze(window: &Window, settings: &PipelineSettings, now: DateTime<Utc>) -> Analysis {
    Analysis {
        forecast: forecast::forecast_empty_time(window, settings.empty_threshold_cm),
        anomalies: anomaly::detect(window, &settings.thresholds),
        stats: stats::summarize(window),
        stale: freshness::window_is_stale_at(window, settings.max_sample_age_minutes, now),
    }
}

// ---------------------------------------------------------------------------
// Report pipeline
// ---------------------------------------------------------------------------

/// Executes one report run against `store` and `generator` at instant `now`.
pub fn run_pipeline(
    store: &dyn TelemetryStore,
    generator: &dyn TextGenerator,
    settings: &PipelineSettings,
    now: DateTime<Utc>,
) -> PipelineOutcome {
    enter(Stage::Fetch, &format!("Fetching last {}h of telemetry...", settings.lookback_hours));
    let window = ingest::fetch_window(store, &settings.sensor_path, settings.lookback_hours, now);

    if window.is_empty() {
        logging::info(Component::Pipeline, None, "No data available. Cannot continue.");
        return PipelineOutcome::NoData;
    }

    enter(Stage::Analyze, &format!("Analyzing {} samples...", window.len()));
    let analysis = analyze(&window, settings, now);
    if analysis.stale {
        logging::warn(
            Component::Analysis,
            None,
            &format!(
                "newest sample is older than {} minutes; the sensor feed may be down",
                settings.max_sample_age_minutes
            ),
        );
    }
    if !analysis.anomalies.is_empty() {
        let names: Vec<String> = analysis.anomalies.iter().map(|a| a.to_string()).collect();
        logging::warn(Component::Analysis, None, &format!("anomalies: {}", names.join(", ")));
    }

    enter(Stage::Narrate, "Generating narrative...");
    let recent = window.tail(settings.prompt_tail);
    let prompt = narrate::build_report_prompt(&Findings {
        forecast: &analysis.forecast,
        anomalies: &analysis.anomalies,
        stats: &analysis.stats,
        recent: &recent,
        lookback_hours: settings.lookback_hours,
        stale: analysis.stale,
    });
    let narrative = narrate::narrate(generator, &prompt);

    let report = Report {
        timestamp: now,
        forecast: analysis.forecast,
        anomalies: analysis.anomalies,
        stats: analysis.stats,
        narrative,
        stale: analysis.stale,
        raw_window: recent,
    };

    enter(Stage::Persist, "Appending report to store...");
    let persisted_key = persist(store, &settings.reports_path, &report);

    PipelineOutcome::Completed {
        report,
        persisted_key,
    }
}

/// Appends `record` under `path`. Failures are logged and reported as `None`;
/// they never change what the caller already holds.
fn persist<T: Serialize>(store: &dyn TelemetryStore, path: &str, record: &T) -> Option<String> {
    let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            logging::error(Component::Store, Some(path), &format!("cannot serialize record: {}", e));
            return None;
        }
    };

    match store.append(path, &value) {
        Ok(key) => {
            logging::info(Component::Store, Some(path), &format!("Saved record {}", key));
            Some(key)
        }
        Err(e) => {
            logging::log_store_failure(path, "append", &e);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Daily summary
// ---------------------------------------------------------------------------

/// Record appended by the daily summary run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

/// Summarizes the last 24 hours of raw telemetry and appends the text to
/// the summaries path. An empty window still records the fixed
/// "no telemetry" text without calling the generator.
pub fn run_daily_summary(
    store: &dyn TelemetryStore,
    generator: &dyn TextGenerator,
    settings: &PipelineSettings,
    now: DateTime<Utc>,
) -> (DailySummary, Option<String>) {
    let window =
        ingest::fetch_window(store, &settings.sensor_path, DAILY_SUMMARY_LOOKBACK_HOURS, now);
    logging::info(Component::Pipeline, None, &format!("Fetched {} records.", window.len()));

    let summary = if window.is_empty() {
        narrate::NO_TELEMETRY_SUMMARY.to_string()
    } else {
        let samples = window.tail(window.len());
        narrate::narrate(generator, &narrate::build_daily_summary_prompt(&samples))
    };

    let record = DailySummary {
        timestamp: now,
        summary,
    };
    let key = persist(store, &settings.summaries_path, &record);
    (record, key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
