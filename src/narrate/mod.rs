//! Narrative generation.
//!
//! The pipeline only sees [`TextGenerator`]; how text is produced (a local
//! subprocess, an HTTP service, a test double) is decided in `main`.

pub mod ollama;

use serde::Serialize;

use crate::logging::{self, Component};
use crate::model::{AnomalyFlag, Forecast, GenerationError, SensorSample, StatsSnapshot};

/// Prefix of the narrative when the backend failed.
pub const LLM_ERROR_MARKER: &str = "[LLM Error] ";

/// Text returned by the daily summary when the window is empty.
pub const NO_TELEMETRY_SUMMARY: &str = "No telemetry available for the last 24 hours.";

/// Blocking text-in, text-out generation backend.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// The structured findings embedded in a report prompt.
#[derive(Debug, Clone)]
pub struct Findings<'a> {
    pub forecast: &'a Forecast,
    pub anomalies: &'a [AnomalyFlag],
    pub stats: &'a StatsSnapshot,
    /// Most recent samples only; the caller caps the length.
    pub recent: &'a [SensorSample],
    pub lookback_hours: f64,
    pub stale: bool,
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

/// Builds the analyst prompt for one pipeline run.
pub fn build_report_prompt(findings: &Findings<'_>) -> String {
    let freshness = if findings.stale {
        "\nNOTE: the newest sample is older than the freshness limit; the sensor feed may be down.\n"
    } else {
        ""
    };

    format!(
        r#"
You are an AI water-system analyst. Given the following information:

1. **Prediction**
{forecast}

2. **Detected Anomalies**
{anomalies}

3. **Statistical Trends (past {hours}h)**
{stats}

4. **Raw Sensor Data (most recent {count} samples)**
{recent}
{freshness}
Analyze all of this and produce:
- a detailed explanation of WHY the prediction makes sense
- possible causes for anomalies
- insights about water consumption patterns
- suggested actions (leak check, pump timing, tank cleaning)
- confidence level (high/medium/low)

Do NOT repeat the data; provide your reasoning like an expert.
"#,
        forecast = findings.forecast,
        anomalies = pretty_json(findings.anomalies),
        hours = findings.lookback_hours,
        stats = pretty_json(findings.stats),
        count = findings.recent.len(),
        recent = pretty_json(findings.recent),
        freshness = freshness,
    )
}

/// Builds the daily raw-data summary prompt.
pub fn build_daily_summary_prompt(samples: &[SensorSample]) -> String {
    format!(
        "Generate a detailed but concise daily water system summary. \
         Data fields: level (distance to water surface, cm), flow (usage, L/min), \
         quality (TDS, ppm). Identify: tank fills, usage patterns, leaks, \
         water quality warnings, and anomalies.\n\n\
         Here is the last 24h data in JSON:\n\n{}\n\n\
         Now give the final summary:",
        pretty_json(samples)
    )
}

/// Runs the backend and degrades any failure to a visible marker string.
pub fn narrate(generator: &dyn TextGenerator, prompt: &str) -> String {
    match generator.generate(prompt) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            logging::error(Component::Narrator, None, &format!("generation failed: {}", e));
            format!("{}{}", LLM_ERROR_MARKER, e)
        }
    }
}

/// `true` if a narrative is the failure placeholder.
pub fn is_error_narrative(narrative: &str) -> bool {
    narrative.starts_with(LLM_ERROR_MARKER)
}
