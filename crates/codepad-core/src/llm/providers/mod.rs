//! LLM provider implementations

use std::sync::Arc;
use crate::config::{LlmConfig, LlmProvider};
use crate::llm::LLM;
use crate::errors::CodepadError;

pub mod gemini;

/// Create an LLM client based on the provider configuration
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, CodepadError> {
    match &config.provider {
        // Custom endpoints speak the same generateContent protocol
        LlmProvider::Gemini | LlmProvider::Custom { .. } => gemini::create_client(config),
    }
}
