/// Structured logging for the tank monitoring service
///
/// Provides context-rich logging with component tags, optional record or
/// path identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for scheduled runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Store,
    Analysis,
    Narrator,
    Pipeline,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Store => write!(f, "STORE"),
            Component::Analysis => write!(f, "ANLY"),
            Component::Narrator => write!(f, "LLM"),
            Component::Pipeline => write!(f, "PIPE"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the path simply has no data yet
    Expected,
    /// Unexpected failure - indicates an outage, bad credentials, or a format change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        // A poisoned lock only means a panic happened mid-log; the slot is still usable.
        let mut slot = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(logger);
    }

    fn log(&self, level: LogLevel, component: &Component, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let context_part = context.map(|s| format!(" [{}]", s)).unwrap_or_default();
        let log_entry = format!(
            "{} {} {}{}: {}",
            timestamp, level, component, context_part, message
        );

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error => eprintln!("{}", log_entry),
                LogLevel::Warning => eprintln!("   {}", log_entry),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}", message),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, context_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, context_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn dispatch(level: LogLevel, component: Component, context: Option<&str>, message: &str) {
    let slot = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(logger) = slot.as_ref() {
        logger.log(level, &component, context, message);
    }
}

/// Log a general informational message
pub fn info(component: Component, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, component, context, message);
}

/// Log a warning message
pub fn warn(component: Component, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, component, context, message);
}

/// Log an error message
pub fn error(component: Component, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, component, context, message);
}

/// Log a debug message
pub fn debug(component: Component, context: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, component, context, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a store failure based on its message
pub fn classify_store_failure(error_message: &str) -> FailureType {
    // Auth and permission failures never fix themselves between runs
    if error_message.contains("HTTP error: 401") || error_message.contains("HTTP error: 403") {
        FailureType::Unexpected
    }
    // Server-side errors and unreachable hosts point at an outage
    else if error_message.contains("HTTP error: 5") || error_message.contains("Transport error") {
        FailureType::Unexpected
    }
    // A body we cannot read suggests a schema or endpoint change
    else if error_message.contains("Parse error") {
        FailureType::Unexpected
    }
    else if error_message.contains("HTTP error: 404") {
        FailureType::Expected
    }
    else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a store failure with automatic classification
pub fn log_store_failure(path: &str, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_store_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(Component::Store, Some(path), &message),
        FailureType::Unexpected => error(Component::Store, Some(path), &message),
        FailureType::Unknown => warn(Component::Store, Some(path), &message),
    }
}

// ---------------------------------------------------------------------------
// Fetch Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a telemetry fetch
pub fn log_fetch_summary(path: &str, total: usize, parsed: usize, dropped: usize) {
    let message = format!(
        "Fetch complete: {}/{} records parsed, {} dropped",
        parsed, total, dropped
    );

    if dropped == 0 {
        info(Component::Store, Some(path), &message);
    } else if parsed == 0 {
        error(Component::Store, Some(path), &message);
    } else {
        warn(Component::Store, Some(path), &message);
    }
}
