//! Core type definitions shared by the dispatcher, the executors and the
//! diagnostic pipeline
//!
//! These types form the contract with the editing surface: it hands in a
//! `(source, language)` pair and renders an `ExecutionResult` or a
//! `DiagnosticRecord`. All of them are plain data and serialize cleanly so a
//! front end can ship them over any transport.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A language the system can execute or analyze.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestLanguage {
    JavaScript,
    TypeScript,
    Python,
    Html,
    Css,
    Json,
    Markdown,
    Unsupported(String),
}

impl GuestLanguage {
    /// Every supported language, in the order they are listed to users.
    pub const SUPPORTED: [GuestLanguage; 7] = [
        GuestLanguage::JavaScript,
        GuestLanguage::TypeScript,
        GuestLanguage::Python,
        GuestLanguage::Html,
        GuestLanguage::Css,
        GuestLanguage::Json,
        GuestLanguage::Markdown,
    ];

    /// Map a language tag to a variant. Never fails: unknown tags become
    /// `Unsupported` so the dispatcher can answer with a guided message.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "node" | "nodejs" => GuestLanguage::JavaScript,
            "typescript" | "ts" => GuestLanguage::TypeScript,
            "python" | "py" | "python3" => GuestLanguage::Python,
            "html" | "htm" => GuestLanguage::Html,
            "css" => GuestLanguage::Css,
            "json" => GuestLanguage::Json,
            "markdown" | "md" => GuestLanguage::Markdown,
            _ => GuestLanguage::Unsupported(tag.trim().to_string()),
        }
    }

    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" => GuestLanguage::JavaScript,
            "ts" | "mts" | "cts" => GuestLanguage::TypeScript,
            "py" => GuestLanguage::Python,
            "html" | "htm" => GuestLanguage::Html,
            "css" => GuestLanguage::Css,
            "json" => GuestLanguage::Json,
            "md" | "markdown" => GuestLanguage::Markdown,
            other => GuestLanguage::Unsupported(other.to_string()),
        }
    }

    /// Lowercase identifier, also used as the fence tag in prompts.
    pub fn id(&self) -> &str {
        match self {
            GuestLanguage::JavaScript => "javascript",
            GuestLanguage::TypeScript => "typescript",
            GuestLanguage::Python => "python",
            GuestLanguage::Html => "html",
            GuestLanguage::Css => "css",
            GuestLanguage::Json => "json",
            GuestLanguage::Markdown => "markdown",
            GuestLanguage::Unsupported(tag) => tag,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            GuestLanguage::JavaScript => "JavaScript",
            GuestLanguage::TypeScript => "TypeScript",
            GuestLanguage::Python => "Python",
            GuestLanguage::Html => "HTML",
            GuestLanguage::Css => "CSS",
            GuestLanguage::Json => "JSON",
            GuestLanguage::Markdown => "Markdown",
            GuestLanguage::Unsupported(tag) => tag,
        }
    }

}

impl fmt::Display for GuestLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: GuestLanguage,
}

impl ExecutionRequest {
    pub fn new(source: impl Into<String>, language: GuestLanguage) -> Self {
        Self {
            source: source.into(),
            language,
        }
    }
}

/// What an executor reports for one run, before timing is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub output: String,
    pub failed: bool,
}

impl RunOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            failed: false,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            failed: true,
        }
    }
}

/// The single result contract produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub failed: bool,
    pub elapsed_millis: u64,
}

impl ExecutionResult {
    pub fn from_outcome(outcome: RunOutcome, elapsed_millis: u64) -> Self {
        Self {
            output: outcome.output,
            failed: outcome.failed,
            elapsed_millis,
        }
    }

    /// The text to hand to the diagnostic pipeline, if this run failed.
    pub fn error_text(&self) -> Option<&str> {
        if self.failed {
            Some(self.output.trim())
        } else {
            None
        }
    }
}

/// Structured result of asking a generative model about a piece of code.
///
/// Always populated: a reply that matches none of the expected sections still
/// produces an explanation and one suggestion, and a failed model call
/// produces `success: false` with a generic explanation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub success: bool,
    pub explanation: String,
    pub cause: String,
    pub suggestions: Vec<String>,
    pub error_line: Option<u32>,
    pub error_column: Option<u32>,
    pub fixed_code: Option<String>,
    pub raw_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiagnosticRecord {
    pub fn transport_failure(explanation: &str, error: String) -> Self {
        Self {
            success: false,
            explanation: explanation.to_string(),
            error: Some(error),
            ..Default::default()
        }
    }
}
