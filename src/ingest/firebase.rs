/// Realtime Database REST client
///
/// Reads and appends telemetry nodes through the database's REST interface:
///   GET  {database_url}/{path}.json             → child map, or `null`
///   POST {database_url}/{path}.json             → `{"name": "<generated key>"}`
///   GET  {database_url}/{path}.json?shallow=true → keys only (reachability probe)
///
/// Every request carries the database secret as the `auth` query parameter.
/// REST docs: https://firebase.google.com/docs/reference/rest/database

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::ingest::TelemetryStore;
use crate::model::StoreError;

// ============================================================================
// Session
// ============================================================================

/// Process-wide connection state: one HTTP client and the credentials.
///
/// Created once in `main` and moved into [`FirebaseStore`]; dropped when the
/// process exits.
pub struct StoreSession {
    client: reqwest::blocking::Client,
    database_url: String,
    secret: String,
}

impl StoreSession {
    /// Builds the HTTP client. No request is made here.
    pub fn open(database_url: &str, secret: String, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            database_url: database_url.trim_end_matches('/').to_string(),
            secret,
        })
    }

    /// REST URL of a node, without credentials.
    pub fn node_url(&self, path: &str) -> String {
        node_url(&self.database_url, path)
    }
}

/// `{database_url}/{path}.json`, tolerant of stray slashes on either side.
pub fn node_url(database_url: &str, path: &str) -> String {
    format!(
        "{}/{}.json",
        database_url.trim_end_matches('/'),
        path.trim_matches('/')
    )
}

// reqwest errors embed the request URL, which carries the secret.
fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.without_url().to_string())
}

// ============================================================================
// Response Structures
// ============================================================================

/// Body returned by a POST (push).
#[derive(Debug, Deserialize)]
pub struct PushResponse {
    pub name: String,
}

/// Interprets a GET body as a child map. `null` (missing node) is empty.
pub fn parse_children(body: &str) -> Result<BTreeMap<String, Value>, StoreError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| StoreError::ParseError(e.to_string()))?;

    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(StoreError::ParseError(format!(
            "expected an object of records, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Store Client
// ============================================================================

pub struct FirebaseStore {
    session: StoreSession,
}

impl FirebaseStore {
    pub fn new(session: StoreSession) -> Self {
        Self { session }
    }

    /// Startup check that the database answers and accepts the secret.
    ///
    /// Uses a shallow read so no record bodies are transferred.
    pub fn verify_reachable(&self, path: &str) -> Result<(), StoreError> {
        let response = self
            .session
            .client
            .get(self.session.node_url(path))
            .query(&[("auth", self.session.secret.as_str()), ("shallow", "true")])
            .send()
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(StoreError::HttpError(response.status().as_u16()));
        }
        Ok(())
    }
}

impl TelemetryStore for FirebaseStore {
    fn fetch(&self, path: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        let response = self
            .session
            .client
            .get(self.session.node_url(path))
            .query(&[("auth", self.session.secret.as_str())])
            .header("Accept", "application/json")
            .send()
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(StoreError::HttpError(response.status().as_u16()));
        }

        let body = response.text().map_err(transport_error)?;
        parse_children(&body)
    }

    fn append(&self, path: &str, record: &Value) -> Result<String, StoreError> {
        let response = self
            .session
            .client
            .post(self.session.node_url(path))
            .query(&[("auth", self.session.secret.as_str())])
            .json(record)
            .send()
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(StoreError::HttpError(response.status().as_u16()));
        }

        let pushed: PushResponse = response
            .json()
            .map_err(|e| StoreError::ParseError(e.without_url().to_string()))?;
        Ok(pushed.name)
    }
}

// ============================================================================
// Tests
// ============================================================================
