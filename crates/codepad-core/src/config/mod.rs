//! Configuration for the editor back end
//!
//! A single YAML document with sections for execution bounds, the two
//! process-backed engines, the model provider and logging. See `types` for
//! the defaults and `loader` for file discovery and environment overrides.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::CodepadError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<CodepadConfig, CodepadError> {
    ConfigLoader::from_file(path).await
}
