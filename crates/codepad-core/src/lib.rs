//! Execution back end for a multi-language code editor.
//!
//! The editing surface hands in `(source, language)` and gets back an
//! `ExecutionResult`; on failure it can ask the diagnostic pipeline for a
//! `DiagnosticRecord`. Both boundaries turn every fault into data.
//!
//! # Architecture Overview
//!
//! - **Dispatcher**: language routing, timeouts, fault conversion
//! - **Executors**: a `node` sandbox for JavaScript, TypeScript lowering on top
//!   of it, a long-lived Python VM session, and static analyzers for HTML,
//!   CSS, JSON and Markdown
//! - **Diagnostics**: prompt building, model transport and reply parsing
//! - **Configuration**: YAML file plus `CODEPAD_*` environment overrides

pub mod config;
pub mod core_types;
pub mod diagnostics;
pub mod dispatcher;
pub mod errors;
pub mod executors;
pub mod llm;

pub use config::*;
pub use core_types::{DiagnosticRecord, ExecutionRequest, ExecutionResult, GuestLanguage, RunOutcome};
pub use diagnostics::DiagnosticService;
pub use dispatcher::Dispatcher;
pub use errors::{CodepadError, ExecutorError};
pub use executors::Executor;
pub use llm::LLM;

#[cfg(test)]
pub mod test_utils;
