//! Configuration type definitions
//!
//! Every section is optional in YAML and falls back to the defaults below, so
//! an empty file (or no file at all) yields a working configuration. Only the
//! `llm` section has no default: without it the diagnostic pipeline stays
//! uninitialized and the editor still runs code.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::CodepadError;
use crate::executors::runtime::parse_version;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodepadConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub javascript: JavaScriptConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Upper bound for one run, provisioning included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_output_lines")]
    pub max_output_lines: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_output_lines: default_max_output_lines(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JavaScriptConfig {
    /// Explicit `node` binary; `node` on PATH otherwise.
    #[serde(default)]
    pub program: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Explicit interpreter; `python3` then `python` on PATH otherwise.
    #[serde(default)]
    pub program: Option<PathBuf>,
    #[serde(default = "default_min_python")]
    pub min_version: String,
    #[serde(default = "default_bootstrap_timeout_secs")]
    pub bootstrap_timeout_secs: u64,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            program: None,
            min_version: default_min_python(),
            bootstrap_timeout_secs: default_bootstrap_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub auth: LlmAuth,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            parameters: ModelParameters::default(),
            auth: LlmAuth::default(),
        }
    }
}

/// Model providers. `Custom` speaks the Gemini protocol against another
/// base URL (a proxy or a local mock).
///
/// Written in YAML as `provider: gemini` or
/// `provider: { custom: { base_url: ... } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ProviderSpec", into = "ProviderSpec")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Custom {
        base_url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ProviderSpec {
    Named(String),
    Custom { custom: CustomEndpoint },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomEndpoint {
    base_url: String,
}

impl TryFrom<ProviderSpec> for LlmProvider {
    type Error = String;

    fn try_from(spec: ProviderSpec) -> Result<Self, Self::Error> {
        match spec {
            ProviderSpec::Named(name) if name.eq_ignore_ascii_case("gemini") => Ok(Self::Gemini),
            ProviderSpec::Named(name) => Err(format!(
                "unknown provider '{}' (expected 'gemini' or a 'custom' section)",
                name
            )),
            ProviderSpec::Custom { custom } => Ok(Self::Custom {
                base_url: custom.base_url,
            }),
        }
    }
}

impl From<LlmProvider> for ProviderSpec {
    fn from(provider: LlmProvider) -> Self {
        match provider {
            LlmProvider::Gemini => Self::Named("gemini".to_string()),
            LlmProvider::Custom { base_url } => Self::Custom {
                custom: CustomEndpoint { base_url },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Bound on one model round trip.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_timeout_secs() -> u64 { 10 }
fn default_max_output_lines() -> usize { 10_000 }
fn default_min_python() -> String { "3.8".to_string() }
fn default_bootstrap_timeout_secs() -> u64 { 30 }
pub fn default_model() -> String { "gemini-2.0-flash-exp".to_string() }
fn default_temperature() -> f32 { 0.4 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f32 { 0.95 }
fn default_llm_timeout_secs() -> u64 { 60 }
fn default_log_level() -> String { "warn".to_string() }

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl CodepadConfig {
    pub fn validate(&self) -> Result<(), CodepadError> {
        if self.execution.timeout_secs == 0 {
            return Err(CodepadError::ConfigError(
                "execution.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.execution.max_output_lines == 0 {
            return Err(CodepadError::ConfigError(
                "execution.max_output_lines must be greater than 0".to_string(),
            ));
        }

        if self.python.bootstrap_timeout_secs == 0 {
            return Err(CodepadError::ConfigError(
                "python.bootstrap_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if parse_version(&self.python.min_version).is_none() {
            return Err(CodepadError::ConfigError(format!(
                "python.min_version '{}' is not a version like 3.8",
                self.python.min_version
            )));
        }

        if let Some(ref llm_config) = self.llm {
            if llm_config.model.trim().is_empty() {
                return Err(CodepadError::ConfigError(
                    "LLM model cannot be empty".to_string(),
                ));
            }
            if let LlmProvider::Custom { base_url } = &llm_config.provider {
                if base_url.is_empty() {
                    return Err(CodepadError::ConfigError(
                        "Custom provider requires a valid 'base_url'".to_string(),
                    ));
                }
            }
            if llm_config.parameters.timeout_secs == 0 {
                return Err(CodepadError::ConfigError(
                    "llm.parameters.timeout_secs must be greater than 0".to_string(),
                ));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(CodepadError::ConfigError(format!(
                "Unknown log level '{}' (expected one of: {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}
