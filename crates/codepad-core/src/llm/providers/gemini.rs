//! Google Gemini API client
//!
//! Talks to the `generateContent` REST endpoint with a single user turn and
//! concatenates the text parts of the first candidate.

use crate::config::{LlmConfig, LlmProvider, ModelParameters};
use crate::errors::CodepadError;
use crate::llm::LLM;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
    parameters: ModelParameters,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client against another endpoint speaking the same protocol
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            parameters: ModelParameters::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        let timeout = Duration::from_secs(parameters.timeout_secs);
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Could not apply a {:?} request timeout: {}", timeout, e);
                Client::new()
            });
        self.parameters = parameters;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "topP")]
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetails {
    code: u16,
    message: String,
}

impl GeminiClient {
    fn build_request(&self, prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.parameters.temperature,
                max_output_tokens: self.parameters.max_tokens,
                top_p: self.parameters.top_p,
            },
        }
    }

    fn extract_text(response: GeminiResponse) -> Result<String, CodepadError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| CodepadError::LLMError("No candidates in Gemini response".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(CodepadError::LLMError(format!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl LLM for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, CodepadError> {
        let request = self.build_request(prompt);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        log::debug!("Sending {} prompt characters to {}", prompt.len(), url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CodepadError::LLMError(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if let Ok(gemini_error) = serde_json::from_str::<GeminiError>(&error_text) {
                return Err(CodepadError::LLMError(format!(
                    "Gemini API error {}: {}",
                    gemini_error.error.code, gemini_error.error.message
                )));
            }

            return Err(CodepadError::LLMError(format!(
                "Gemini API request failed with status {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            CodepadError::ParsingError(format!("Failed to parse Gemini response: {}", e))
        })?;

        Self::extract_text(gemini_response)
    }
}

/// Create a Gemini LLM client from configuration
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LLM>, CodepadError> {
    let api_key = match &config.auth.api_key {
        Some(key) => key.clone(),
        None => match &config.auth.api_key_env {
            Some(env_var) => env::var(env_var).map_err(|_| {
                CodepadError::ConfigError(format!(
                    "Environment variable {} not found for Gemini API key",
                    env_var
                ))
            })?,
            None => env::var("GEMINI_API_KEY").map_err(|_| {
                CodepadError::ConfigError("No API key found for Gemini. Set GEMINI_API_KEY environment variable or provide api_key in config".to_string())
            })?,
        },
    };

    let client = match &config.provider {
        LlmProvider::Gemini => GeminiClient::new(api_key, config.model.clone()),
        LlmProvider::Custom { base_url } => {
            GeminiClient::with_base_url(api_key, config.model.clone(), base_url.clone())
        }
    };

    Ok(Arc::new(client.with_parameters(config.parameters.clone())))
}
