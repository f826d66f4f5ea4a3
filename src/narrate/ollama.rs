/// Ollama text-generation backends
///
/// Two ways of reaching the same local model runtime:
/// - `OllamaCli` : `ollama run <model> <prompt>` as a subprocess.
/// - `OllamaHttp`: `POST /api/generate` on the Ollama server.
///
/// Both enforce a wall-clock limit so a hung model never blocks the
/// pipeline from persisting its numeric findings.
/// API Documentation: https://github.com/ollama/ollama/blob/main/docs/api.md

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::model::GenerationError;
use crate::narrate::TextGenerator;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Subprocess backend
// ============================================================================

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Waits for a drained pipe until `deadline`. `None` means the pipe was
/// still held open, e.g. by a background process the backend left behind.
fn collect(pipe: &mpsc::Receiver<String>, deadline: Instant) -> Option<String> {
    match pipe.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

pub struct OllamaCli {
    pub command: String,
    pub model: String,
    pub timeout: Duration,
}

impl OllamaCli {
    pub fn new(command: &str, model: &str, timeout: Duration) -> Self {
        Self {
            command: command.to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    /// Arguments passed to the executable, prompt last.
    pub fn args<'a>(&'a self, prompt: &'a str) -> [&'a str; 3] {
        ["run", self.model.as_str(), prompt]
    }

    /// Runs the executable with `args`, enforcing the timeout, and returns
    /// its trimmed stdout.
    fn run_process(&self, args: &[&str]) -> Result<String, GenerationError> {
        let mut child = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GenerationError::Spawn(format!("{}: {}", self.command, e)))?;

        // Pipes are drained on their own threads so a chatty model cannot
        // fill the OS buffer and stall before exiting.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let start = Instant::now();
        let deadline = start + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(GenerationError::Timeout(self.timeout.as_secs()));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(GenerationError::Spawn(e.to_string()));
                }
            }
        };

        let timed_out = GenerationError::Timeout(self.timeout.as_secs());
        let out = collect(&stdout, deadline).ok_or(timed_out.clone())?;
        let err = collect(&stderr, deadline).ok_or(timed_out)?;

        if !status.success() {
            return Err(GenerationError::Failed {
                code: status.code(),
                stderr: err.trim().to_string(),
            });
        }

        Ok(out.trim().to_string())
    }
}

impl TextGenerator for OllamaCli {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.run_process(&self.args(prompt))
    }
}

// ============================================================================
// HTTP backend
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

pub struct OllamaHttp {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaHttp {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    fn map_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout.as_secs())
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

impl TextGenerator for OllamaHttp {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(GenerationError::HttpError(response.status().as_u16()));
        }

        let body: GenerateResponse = response.json().map_err(|e| self.map_error(e))?;
        Ok(body.response.trim().to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
