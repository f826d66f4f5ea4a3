/// Integration tests for the full report pipeline
///
/// These tests drive Fetch → Analyze → Narrate → Persist end to end with an
/// in-memory store and scripted generators, so they need no network, no
/// database and no model runtime.
///
/// They verify:
/// 1. An empty fetch ends in the "no data" terminus without generating or writing
/// 2. A generator failure still persists a report with a marked narrative
/// 3. A store write failure does not change the returned report
/// 4. The prompt carries only the capped sample tail
/// 5. The persisted record has the documented shape
///
/// Run with: cargo test --test pipeline_integration

use waterguard_service::analysis::anomaly::AnomalyThresholds;
use waterguard_service::ingest::TelemetryStore;
use waterguard_service::model::{AnomalyFlag, Forecast, GenerationError, StoreError};
use waterguard_service::narrate::{self, TextGenerator};
use waterguard_service::pipeline::{PipelineOutcome, PipelineSettings, run_daily_summary, run_pipeline};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryStore {
    nodes: RefCell<BTreeMap<String, BTreeMap<String, Value>>>,
    appends: RefCell<Vec<(String, Value)>>,
    fail_fetch: bool,
    fail_append: bool,
}

impl MemoryStore {
    fn with_records(path: &str, records: Vec<Value>) -> Self {
        let store = MemoryStore::default();
        let children = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| (format!("-Nrec{:04}", i), r))
            .collect();
        store.nodes.borrow_mut().insert(path.to_string(), children);
        store
    }

    fn append_count(&self) -> usize {
        self.appends.borrow().len()
    }
}

impl TelemetryStore for MemoryStore {
    fn fetch(&self, path: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        if self.fail_fetch {
            return Err(StoreError::Transport("connection refused".into()));
        }
        Ok(self.nodes.borrow().get(path).cloned().unwrap_or_default())
    }

    fn append(&self, path: &str, record: &Value) -> Result<String, StoreError> {
        self.appends.borrow_mut().push((path.to_string(), record.clone()));
        if self.fail_append {
            return Err(StoreError::HttpError(503));
        }
        Ok(format!("-Npush{}", self.append_count()))
    }
}

/// Records every prompt and answers with a fixed result.
struct ScriptedGenerator {
    reply: Result<String, ()>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedGenerator {
    fn ok(text: &str) -> Self {
        Self { reply: Ok(text.to_string()), prompts: RefCell::new(Vec::new()) }
    }

    fn failing() -> Self {
        Self { reply: Err(()), prompts: RefCell::new(Vec::new()) }
    }

    fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(()) => Err(GenerationError::Failed {
                code: Some(1),
                stderr: "Error: model 'tinyllama' not found".into(),
            }),
        }
    }
}

const SENSOR_PATH: &str = "WaterGuardEdge/sensor_data";
const REPORTS_PATH: &str = "WaterGuardEdge/ai_reports";
const SUMMARIES_PATH: &str = "WaterGuardEdge/summaries";

fn settings() -> PipelineSettings {
    PipelineSettings {
        sensor_path: SENSOR_PATH.into(),
        reports_path: REPORTS_PATH.into(),
        summaries_path: SUMMARIES_PATH.into(),
        lookback_hours: 24.0,
        empty_threshold_cm: 5.0,
        thresholds: AnomalyThresholds::default(),
        max_sample_age_minutes: 60,
        prompt_tail: 50,
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
}

/// Relay-shaped records, one per minute, ending at `fixed_now()`.
fn relay_records(levels: &[f64]) -> Vec<Value> {
    let n = levels.len() as i64;
    levels
        .iter()
        .enumerate()
        .map(|(i, level)| {
            let ts = fixed_now() - Duration::minutes(n - 1 - i as i64);
            json!({
                "timestamp": ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                "distance_cm": level,
                "flow_lpm": 2.5,
                "tds_ppm": 190
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// No data
// ---------------------------------------------------------------------------

#[test]
fn test_empty_store_ends_with_no_data() {
    let store = MemoryStore::default();
    let generator = ScriptedGenerator::ok("unused");

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    assert_eq!(outcome, PipelineOutcome::NoData);
    assert_eq!(generator.calls(), 0, "no generation call on empty window");
    assert_eq!(store.append_count(), 0, "no write on empty window");
}

#[test]
fn test_unreachable_store_is_treated_as_no_data() {
    let store = MemoryStore { fail_fetch: true, ..MemoryStore::default() };
    let generator = ScriptedGenerator::ok("unused");

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    assert_eq!(outcome, PipelineOutcome::NoData);
    assert_eq!(generator.calls(), 0);
    assert_eq!(store.append_count(), 0);
}

#[test]
fn test_only_out_of_window_records_is_no_data() {
    let old = json!({ "timestamp": "2024-04-01T00:00:00Z", "distance_cm": 30.0 });
    let store = MemoryStore::with_records(SENSOR_PATH, vec![old]);
    let generator = ScriptedGenerator::ok("unused");

    assert_eq!(run_pipeline(&store, &generator, &settings(), fixed_now()), PipelineOutcome::NoData);
    assert_eq!(store.append_count(), 0);
}

// ---------------------------------------------------------------------------
// Completed runs
// ---------------------------------------------------------------------------

#[test]
fn test_declining_tank_produces_estimate_and_persists() {
    let levels: Vec<f64> = (0..=10).map(|m| 50.0 - m as f64).collect();
    let store = MemoryStore::with_records(SENSOR_PATH, relay_records(&levels));
    let generator = ScriptedGenerator::ok("  The tank is draining steadily.  ");

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    let PipelineOutcome::Completed { report, persisted_key } = outcome else {
        panic!("expected Completed");
    };

    match report.forecast {
        Forecast::Estimate { eta_minutes } => assert!((eta_minutes - 35.0).abs() < 1e-6),
        ref other => panic!("expected Estimate, got {:?}", other),
    }
    assert_eq!(report.anomalies, vec![AnomalyFlag::FastDepletion]);
    assert_eq!(report.stats.sample_count, 11);
    assert_eq!(report.stats.avg_flow, 2.5);
    assert_eq!(report.stats.avg_quality, 190.0);
    assert_eq!(report.narrative, "The tank is draining steadily.");
    assert!(!report.stale);
    assert_eq!(report.timestamp, fixed_now());
    assert_eq!(persisted_key.as_deref(), Some("-Npush1"));
    assert_eq!(generator.calls(), 1);
}

#[test]
fn test_generator_failure_still_persists_marked_report() {
    let levels = [40.0, 40.0, 40.0, 40.0, 40.0];
    let store = MemoryStore::with_records(SENSOR_PATH, relay_records(&levels));
    let generator = ScriptedGenerator::failing();

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    let PipelineOutcome::Completed { report, persisted_key } = outcome else {
        panic!("expected Completed");
    };
    assert!(narrate::is_error_narrative(&report.narrative), "got {}", report.narrative);
    assert!(report.narrative.contains("not found"));
    assert_eq!(report.forecast, Forecast::Filling);
    assert_eq!(report.anomalies, vec![AnomalyFlag::SensorStuck]);

    // The write still happened, with the numeric findings intact.
    let appends = store.appends.borrow();
    assert_eq!(appends.len(), 1);
    let (path, record) = &appends[0];
    assert_eq!(path, REPORTS_PATH);
    assert_eq!(record["forecast"]["status"], "filling");
    assert_eq!(record["anomalies"], json!(["SensorStuck"]));
    assert_eq!(record["narrative"], Value::String(report.narrative.clone()));
    assert!(persisted_key.is_some());
}

#[test]
fn test_store_write_failure_keeps_report() {
    let levels = [30.0, 31.0, 32.0, 33.0];
    let store = MemoryStore {
        fail_append: true,
        ..MemoryStore::with_records(SENSOR_PATH, relay_records(&levels))
    };
    let generator = ScriptedGenerator::ok("Filling normally.");

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    let PipelineOutcome::Completed { report, persisted_key } = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(persisted_key, None);
    assert_eq!(store.append_count(), 1, "write was attempted exactly once");
    assert_eq!(report.narrative, "Filling normally.");
    assert_eq!(report.forecast, Forecast::Filling);
}

#[test]
fn test_prompt_and_raw_window_are_capped_but_stats_use_full_window() {
    // 120 samples; only the last 50 go to the prompt.
    let levels: Vec<f64> = (0..120).map(|i| 80.0 - (i as f64) * 0.1).collect();
    let store = MemoryStore::with_records(SENSOR_PATH, relay_records(&levels));
    let generator = ScriptedGenerator::ok("ok");

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    let PipelineOutcome::Completed { report, .. } = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(report.stats.sample_count, 120);
    assert_eq!(report.raw_window.len(), 50);
    assert_eq!(report.raw_window.last().map(|s| s.timestamp), Some(fixed_now()));

    let prompts = generator.prompts.borrow();
    assert!(prompts[0].contains("most recent 50 samples"));
    assert_eq!(prompts[0].matches("\"level\"").count(), 50);
}

#[test]
fn test_malformed_records_are_skipped_not_fatal() {
    let mut records = relay_records(&[45.0, 44.0, 43.0, 42.0]);
    records.push(json!({ "timestamp": "garbage", "distance_cm": 1.0 }));
    records.push(json!({ "timestamp": "2024-05-01T12:59:30Z" }));
    let store = MemoryStore::with_records(SENSOR_PATH, records);
    let generator = ScriptedGenerator::ok("ok");

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    let PipelineOutcome::Completed { report, .. } = outcome else {
        panic!("expected Completed");
    };
    assert_eq!(report.stats.sample_count, 4);
}

#[test]
fn test_stale_feed_is_reported() {
    let records = vec![
        json!({ "timestamp": "2024-05-01T09:00:00Z", "distance_cm": 20.0 }),
        json!({ "timestamp": "2024-05-01T09:05:00Z", "distance_cm": 21.0 }),
    ];
    let store = MemoryStore::with_records(SENSOR_PATH, records);
    let generator = ScriptedGenerator::ok("ok");

    let outcome = run_pipeline(&store, &generator, &settings(), fixed_now());

    let PipelineOutcome::Completed { report, .. } = outcome else {
        panic!("expected Completed");
    };
    assert!(report.stale);
    assert_eq!(report.forecast, Forecast::InsufficientData);
    assert!(generator.prompts.borrow()[0].contains("freshness limit"));
}

// ---------------------------------------------------------------------------
// Daily summary
// ---------------------------------------------------------------------------

#[test]
fn test_daily_summary_narrates_and_saves() {
    let store = MemoryStore::with_records(SENSOR_PATH, relay_records(&[40.0, 39.5, 39.0]));
    let generator = ScriptedGenerator::ok("Usage was light today.");

    let (summary, key) = run_daily_summary(&store, &generator, &settings(), fixed_now());

    assert_eq!(summary.summary, "Usage was light today.");
    assert!(key.is_some());
    let appends = store.appends.borrow();
    assert_eq!(appends[0].0, SUMMARIES_PATH);
    assert_eq!(appends[0].1["summary"], "Usage was light today.");
    assert!(generator.prompts.borrow()[0].contains("daily water system summary"));
}

#[test]
fn test_daily_summary_without_data_records_fixed_text() {
    let store = MemoryStore::default();
    let generator = ScriptedGenerator::ok("unused");

    let (summary, _) = run_daily_summary(&store, &generator, &settings(), fixed_now());

    assert_eq!(summary.summary, narrate::NO_TELEMETRY_SUMMARY);
    assert_eq!(generator.calls(), 0);
    assert_eq!(store.append_count(), 1);
}
