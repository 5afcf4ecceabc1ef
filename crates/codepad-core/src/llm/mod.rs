//! Language model abstraction used by the diagnostic pipeline.
//!
//! The pipeline only ever sends a single prompt and reads back text, so the
//! trait is deliberately small. Providers live in `providers`.

use crate::errors::CodepadError;
use async_trait::async_trait;

pub mod providers;

pub use providers::create_llm_client;

#[async_trait]
pub trait LLM: Send + Sync {
    /// Send one prompt and return the model's raw reply text.
    async fn generate(&self, prompt: &str) -> Result<String, CodepadError>;
}
