//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::CodepadError;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const ENV_TIMEOUT_SECS: &str = "CODEPAD_TIMEOUT_SECS";
pub const ENV_NODE: &str = "CODEPAD_NODE";
pub const ENV_PYTHON: &str = "CODEPAD_PYTHON";
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// `<config_dir>/codepad/codepad.yaml`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("codepad").join("codepad.yaml"))
    }

    /// Load an explicit file, or the default file if it exists, or the
    /// built-in defaults. An explicit path that cannot be read is an error.
    pub async fn load(path: Option<&Path>) -> Result<CodepadConfig, CodepadError> {
        if let Some(path) = path {
            return Self::from_file(path).await;
        }

        match Self::default_path() {
            Some(default) if default.exists() => {
                log::debug!("Using configuration file {}", default.display());
                Self::from_file(&default).await
            }
            _ => {
                log::debug!("No configuration file found, using built-in defaults");
                Self::finish(CodepadConfig::default())
            }
        }
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<CodepadConfig, CodepadError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            CodepadError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<CodepadConfig, CodepadError> {
        let config = if content.trim().is_empty() {
            CodepadConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                CodepadError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::finish(config)
    }

    fn finish(mut config: CodepadConfig) -> Result<CodepadConfig, CodepadError> {
        Self::resolve_environment(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CODEPAD_*` overrides and resolve the model credential.
    fn resolve_environment(config: &mut CodepadConfig) -> Result<(), CodepadError> {
        if let Ok(raw) = env::var(ENV_TIMEOUT_SECS) {
            config.execution.timeout_secs = raw.trim().parse().map_err(|_| {
                CodepadError::ConfigError(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_TIMEOUT_SECS, raw
                ))
            })?;
        }

        if let Some(program) = env::var_os(ENV_NODE).filter(|v| !v.is_empty()) {
            config.javascript.program = Some(PathBuf::from(program));
        }

        if let Some(program) = env::var_os(ENV_PYTHON).filter(|v| !v.is_empty()) {
            config.python.program = Some(PathBuf::from(program));
        }

        if let Some(ref mut llm_config) = config.llm {
            Self::resolve_llm_auth(&mut llm_config.auth);
        } else if env::var(DEFAULT_API_KEY_ENV).is_ok() {
            // A key in the environment is enough to enable the default provider
            let mut llm_config = LlmConfig::default();
            Self::resolve_llm_auth(&mut llm_config.auth);
            config.llm = Some(llm_config);
        }

        Ok(())
    }

    fn resolve_llm_auth(auth: &mut LlmAuth) {
        if let Some(env_var) = &auth.api_key_env {
            if let Ok(api_key) = env::var(env_var) {
                auth.api_key = Some(api_key);
            }
        }

        if auth.api_key.is_none() && auth.api_key_env.is_none() {
            if let Ok(api_key) = env::var(DEFAULT_API_KEY_ENV) {
                auth.api_key = Some(api_key);
            }
        }
    }
}
