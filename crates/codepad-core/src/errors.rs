//! Error types for the execution and diagnostic layers
//!
//! Two hierarchies live here. `CodepadError` covers configuration, model
//! transport and service state. `ExecutorError` covers infrastructure faults
//! raised while provisioning or talking to a guest engine. Faults raised by
//! the guest program itself are never errors: executors report them as
//! failed outcomes, and the dispatcher turns every `ExecutorError` into data
//! before it reaches a caller.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CodepadError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("LLM interaction failed: {0}")]
    LLMError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Service not initialized: {0}")]
    NotInitialized(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for CodepadError {
    fn from(err: std::io::Error) -> Self {
        CodepadError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for CodepadError {
    fn from(err: reqwest::Error) -> Self {
        CodepadError::LLMError(err.to_string())
    }
}

// Infrastructure faults around a guest engine
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("{runtime} runtime was not found (looked for: {candidates})")]
    RuntimeNotFound { runtime: String, candidates: String },
    #[error("I/O error while talking to the engine: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed engine message: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Engine protocol violation: {0}")]
    Protocol(String),
    #[error("Engine exited unexpectedly{}", format_stderr(.stderr))]
    EngineExited { stderr: String },
    #[error("Execution timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("Interpreter bootstrap failed: {0}")]
    Bootstrap(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}
