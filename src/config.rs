//! Service configuration.
//!
//! Non-secret settings come from a TOML file (`./waterguard.toml` unless
//! `WATERGUARD_CONFIG` points elsewhere). The store secret is read from the
//! environment, which `main` populates from `.env` via `dotenv`.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::analysis::anomaly::{
    AnomalyThresholds, DEFAULT_DEPLETION_RATE_CM_PER_HOUR, DEFAULT_SPIKE_THRESHOLD_CM,
    DEFAULT_STUCK_MIN_SAMPLES,
};
use crate::analysis::freshness::DEFAULT_MAX_SAMPLE_AGE_MINUTES;
use crate::logging::LogLevel;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "WATERGUARD_CONFIG";

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "./waterguard.toml";

/// Environment variable carrying the store auth secret.
pub const DB_SECRET_ENV: &str = "WATERGUARD_DB_SECRET";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The config file could not be read.
    Io { path: String, message: String },
    /// The config file is not valid TOML or has wrong field types.
    Parse(String),
    /// A required environment variable is unset or empty.
    MissingCredential(&'static str),
    /// A value parsed but is out of range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, message } => {
                write!(f, "cannot read config file {}: {}", path, message)
            }
            ConfigError::Parse(msg) => write!(f, "invalid config: {}", msg),
            ConfigError::MissingCredential(var) => {
                write!(f, "missing credential: set {} in the environment or .env", var)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid config value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Config structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub narrator: NarratorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Root URL of the realtime database, e.g. `https://example.firebaseio.com`.
    pub database_url: String,
    #[serde(default = "default_sensor_path")]
    pub sensor_path: String,
    #[serde(default = "default_reports_path")]
    pub reports_path: String,
    #[serde(default = "default_summaries_path")]
    pub summaries_path: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// How far back from now the window reaches.
    pub lookback_hours: f64,
    /// Level at which the tank counts as empty, in cm.
    pub empty_threshold_cm: f64,
    /// Flags consecutive level jumps above this delta, in cm.
    pub spike_threshold_cm: f64,
    /// Flags a sustained falling rate steeper than this, in cm/hour.
    pub depletion_rate_cm_per_hour: f64,
    /// Windows smaller than this are never reported as stuck.
    pub stuck_min_samples: usize,
    /// Newest sample older than this marks the report stale.
    pub max_sample_age_minutes: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 24.0,
            empty_threshold_cm: 5.0,
            spike_threshold_cm: DEFAULT_SPIKE_THRESHOLD_CM,
            depletion_rate_cm_per_hour: DEFAULT_DEPLETION_RATE_CM_PER_HOUR,
            stuck_min_samples: DEFAULT_STUCK_MIN_SAMPLES,
            max_sample_age_minutes: DEFAULT_MAX_SAMPLE_AGE_MINUTES,
        }
    }
}

impl AnalysisConfig {
    pub fn thresholds(&self) -> AnomalyThresholds {
        AnomalyThresholds {
            spike_threshold_cm: self.spike_threshold_cm,
            depletion_rate_cm_per_hour: self.depletion_rate_cm_per_hour,
            stuck_min_samples: self.stuck_min_samples,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NarratorBackend {
    /// `ollama run <model> <prompt>` as a subprocess.
    OllamaCli,
    /// Ollama's `/api/generate` HTTP endpoint.
    OllamaHttp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub backend: NarratorBackend,
    /// Executable used by the CLI backend.
    pub command: String,
    pub model: String,
    /// Base URL used by the HTTP backend.
    pub http_url: String,
    pub timeout_secs: u64,
    /// Number of most recent samples embedded in the prompt.
    pub prompt_tail: usize,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            backend: NarratorBackend::OllamaCli,
            command: "ollama".to_string(),
            model: "tinyllama".to_string(),
            http_url: "http://localhost:11434".to_string(),
            timeout_secs: 300,
            prompt_tail: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> Result<LogLevel, ConfigError> {
        self.level.parse().map_err(ConfigError::Invalid)
    }
}

fn default_sensor_path() -> String {
    "WaterGuardEdge/sensor_data".to_string()
}

fn default_reports_path() -> String {
    "WaterGuardEdge/ai_reports".to_string()
}

fn default_summaries_path() -> String {
    "WaterGuardEdge/summaries".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Loads and validates the config file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the config path from `WATERGUARD_CONFIG` or the default.
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.store.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid("store.database_url must not be empty".into()));
        }
        let a = &self.analysis;
        if !(a.lookback_hours.is_finite() && a.lookback_hours > 0.0) {
            return Err(ConfigError::Invalid(
                "analysis.lookback_hours must be a positive finite number".into(),
            ));
        }
        if !(a.spike_threshold_cm > 0.0) {
            return Err(ConfigError::Invalid("analysis.spike_threshold_cm must be positive".into()));
        }
        if !(a.depletion_rate_cm_per_hour > 0.0) {
            return Err(ConfigError::Invalid(
                "analysis.depletion_rate_cm_per_hour must be positive".into(),
            ));
        }
        if self.narrator.prompt_tail == 0 {
            return Err(ConfigError::Invalid("narrator.prompt_tail must be at least 1".into()));
        }
        if self.narrator.timeout_secs == 0 {
            return Err(ConfigError::Invalid("narrator.timeout_secs must be at least 1".into()));
        }
        self.logging.min_level()?;
        Ok(())
    }
}

/// Reads a required secret from the process environment.
pub fn require_env(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingCredential(var)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
