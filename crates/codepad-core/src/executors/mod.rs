//! Execution and analysis strategies, one per guest language.
//!
//! Process-backed engines (the JavaScript sandbox and the Python VM) speak the
//! event protocol in [`protocol`] and write into a per-run [`capture::CaptureSink`].
//! TypeScript is lowered by [`transpile`] and handed to the sandbox. The static
//! languages are pure functions in [`analyzers`].

use async_trait::async_trait;

use crate::core_types::{GuestLanguage, RunOutcome};
use crate::errors::ExecutorError;

/// Output reported when a program completes without writing anything.
pub const NO_OUTPUT: &str = "Code executed successfully (no output)";

/// A strategy that runs or analyzes source text for one guest language.
///
/// Guest faults are returned as failed [`RunOutcome`]s. An `Err` means the
/// engine itself could not be used, and the dispatcher turns it into data.
#[async_trait]
pub trait Executor: Send + Sync {
    fn language(&self) -> GuestLanguage;

    async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError>;

    /// Bring up any expensive engine ahead of the first run.
    async fn prepare(&self) {}
}

pub mod analyzers;
pub mod capture;
pub mod protocol;
pub mod runtime;
pub mod sandbox;
pub mod transpile;
pub mod vm;
