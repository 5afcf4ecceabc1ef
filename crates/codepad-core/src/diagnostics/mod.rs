//! Diagnostic pipeline: asks a generative model about a piece of code and
//! returns a structured `DiagnosticRecord`.
//!
//! The only error this module returns is `NotInitialized`, when no model
//! client was configured. Transport faults (network, auth, quota) become
//! `success: false` records and reply drift is absorbed by the parser.

use std::sync::Arc;

use crate::config::CodepadConfig;
use crate::core_types::{DiagnosticRecord, GuestLanguage};
use crate::errors::CodepadError;
use crate::llm::{create_llm_client, LLM};

pub mod parser;
pub mod prompts;

pub use parser::parse_response;

pub const ERROR_ANALYSIS_UNAVAILABLE: &str =
    "Unable to analyze error at this time. Please check your API key and try again.";
pub const REVIEW_UNAVAILABLE: &str = "Unable to analyze code at this time.";
pub const OPTIMIZATION_UNAVAILABLE: &str = "Unable to get optimization suggestions at this time.";

pub struct DiagnosticService {
    llm: Option<Arc<dyn LLM>>,
}

impl DiagnosticService {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self { llm: Some(llm) }
    }

    pub fn uninitialized() -> Self {
        Self { llm: None }
    }

    /// Build the model client from the `llm` section. A missing section or
    /// credential leaves the service uninitialized instead of failing, so
    /// code still runs without a key.
    pub fn from_config(config: &CodepadConfig) -> Self {
        let Some(llm_config) = &config.llm else {
            log::debug!("No llm section configured, diagnostics disabled");
            return Self::uninitialized();
        };
        match create_llm_client(llm_config) {
            Ok(llm) => {
                log::info!("Diagnostics enabled with model {}", llm_config.model);
                Self::new(llm)
            }
            Err(e) => {
                log::warn!("Diagnostics disabled: {}", e);
                Self::uninitialized()
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.llm.is_some()
    }

    /// Explain a failed run. `error_text` is the failed result's output.
    pub async fn analyze_error(
        &self,
        source: &str,
        language: &GuestLanguage,
        error_text: &str,
    ) -> Result<DiagnosticRecord, CodepadError> {
        let prompt = prompts::error_analysis(source, language, error_text);
        self.consult(&prompt, ERROR_ANALYSIS_UNAVAILABLE).await
    }

    /// Review code before it is run.
    pub async fn analyze_before_run(
        &self,
        source: &str,
        language: &GuestLanguage,
    ) -> Result<DiagnosticRecord, CodepadError> {
        let prompt = prompts::review(source, language);
        self.consult(&prompt, REVIEW_UNAVAILABLE).await
    }

    pub async fn suggest_optimizations(
        &self,
        source: &str,
        language: &GuestLanguage,
    ) -> Result<DiagnosticRecord, CodepadError> {
        let prompt = prompts::optimization(source, language);
        self.consult(&prompt, OPTIMIZATION_UNAVAILABLE).await
    }

    async fn consult(
        &self,
        prompt: &str,
        unavailable: &str,
    ) -> Result<DiagnosticRecord, CodepadError> {
        let llm = self.llm.as_ref().ok_or_else(|| {
            CodepadError::NotInitialized(
                "no model client configured. Set GEMINI_API_KEY or add an llm section to codepad.yaml"
                    .to_string(),
            )
        })?;

        match llm.generate(prompt).await {
            Ok(reply) => {
                log::debug!("Model replied with {} characters", reply.len());
                Ok(parse_response(&reply))
            }
            Err(e) => {
                log::warn!("Model call failed: {}", e);
                Ok(DiagnosticRecord::transport_failure(unavailable, e.to_string()))
            }
        }
    }
}
