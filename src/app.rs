//! Process startup shared by the binaries.
//!
//! Loads configuration and credentials, installs the logger, opens the store
//! session once, and builds the configured narrator. Failures here are the
//! only ones allowed to stop the process.

use std::fmt;
use std::process::ExitCode;
use std::time::Duration;

use crate::config::{self, Config, ConfigError, NarratorBackend};
use crate::ingest::firebase::{FirebaseStore, StoreSession};
use crate::logging::{self, Component};
use crate::model::{GenerationError, StoreError};
use crate::narrate::TextGenerator;
use crate::narrate::ollama::{OllamaCli, OllamaHttp};

#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    /// The store rejected or did not answer the startup probe.
    StoreUnreachable(StoreError),
    /// The narrator client could not be constructed.
    Narrator(GenerationError),
}

impl StartupError {
    /// 2 for configuration problems, 1 for an unreachable store.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            StartupError::Config(_) | StartupError::Narrator(_) => ExitCode::from(2),
            StartupError::StoreUnreachable(_) => ExitCode::from(1),
        }
    }
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "{}", e),
            StartupError::StoreUnreachable(e) => write!(f, "store unreachable at startup: {}", e),
            StartupError::Narrator(e) => write!(f, "cannot configure narrator: {}", e),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

/// Long-lived collaborators for one process.
pub struct Services {
    pub config: Config,
    pub store: FirebaseStore,
    pub generator: Box<dyn TextGenerator>,
}

/// Builds the narrator selected in `[narrator]`.
pub fn build_generator(config: &Config) -> Result<Box<dyn TextGenerator>, GenerationError> {
    let n = &config.narrator;
    let timeout = Duration::from_secs(n.timeout_secs);
    let generator: Box<dyn TextGenerator> = match n.backend {
        NarratorBackend::OllamaCli => Box::new(OllamaCli::new(&n.command, &n.model, timeout)),
        NarratorBackend::OllamaHttp => Box::new(OllamaHttp::new(&n.http_url, &n.model, timeout)?),
    };
    Ok(generator)
}

/// Loads config from `WATERGUARD_CONFIG` and wires up all services.
///
/// Expects `.env` to have been loaded by the caller.
pub fn bootstrap() -> Result<Services, StartupError> {
    let config_path = Config::path_from_env();
    let config = Config::load(&config_path)?;

    logging::init_logger(
        config.logging.min_level()?,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );
    logging::debug(Component::System, None, &format!("config loaded from {}", config_path));

    let secret = config::require_env(config::DB_SECRET_ENV)?;
    let session = StoreSession::open(
        &config.store.database_url,
        secret,
        Duration::from_secs(config.store.timeout_secs),
    )
    .map_err(StartupError::StoreUnreachable)?;
    let store = FirebaseStore::new(session);

    store
        .verify_reachable(&config.store.sensor_path)
        .map_err(StartupError::StoreUnreachable)?;
    logging::info(Component::Store, None, "Connected to telemetry store");

    let generator = build_generator(&config).map_err(StartupError::Narrator)?;

    Ok(Services {
        config,
        store,
        generator,
    })
}
