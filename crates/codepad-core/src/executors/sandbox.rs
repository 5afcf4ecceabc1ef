//! Disposable JavaScript realm backed by a short-lived `node` process.
//!
//! Every run provisions a new process whose driver evaluates the guest source
//! inside a fresh `vm` context. The context's only global capability is a
//! `console` that writes protocol events, which land in a capture sink owned
//! by this run. The process is killed and reaped on every exit path, including
//! when the run future is dropped on timeout.
//!
//! This is process-level isolation without resource limits: adequate for a
//! single user's scratch code, not for untrusted multi-tenant input.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use super::capture::CaptureSink;
use super::protocol::{self, Completion};
use super::runtime::RuntimeLocator;
use super::{Executor, NO_OUTPUT};
use crate::config::CodepadConfig;
use crate::core_types::{GuestLanguage, RunOutcome};
use crate::errors::ExecutorError;

const SANDBOX_DRIVER: &str = include_str!("drivers/sandbox.js");

pub struct SandboxExecutor {
    locator: RuntimeLocator,
    max_output_lines: usize,
}

impl SandboxExecutor {
    pub fn new(locator: RuntimeLocator, max_output_lines: usize) -> Self {
        Self {
            locator,
            max_output_lines,
        }
    }

    pub fn from_config(config: &CodepadConfig) -> Self {
        Self::new(
            RuntimeLocator::node().with_program(config.javascript.program.clone()),
            config.execution.max_output_lines,
        )
    }

    /// Evaluate `source` in a fresh realm. Guest faults come back as failed
    /// outcomes; only infrastructure trouble is an error.
    pub async fn evaluate(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
        let program = self.locator.find()?;
        let mut realm = Realm::provision(&program)?;
        let outcome = realm
            .execute(source, CaptureSink::new(self.max_output_lines))
            .await;
        realm.teardown().await;
        outcome
    }
}

#[async_trait]
impl Executor for SandboxExecutor {
    fn language(&self) -> GuestLanguage {
        GuestLanguage::JavaScript
    }

    async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
        self.evaluate(source).await
    }
}

/// One provisioned node process. Dropping it kills the process.
struct Realm {
    child: Child,
}

impl Realm {
    fn provision(program: &Path) -> Result<Self, ExecutorError> {
        let child = Command::new(program)
            .arg("-e")
            .arg(SANDBOX_DRIVER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        log::debug!(
            "Provisioned JavaScript realm (pid {:?}) using {}",
            child.id(),
            program.display()
        );
        Ok(Self { child })
    }

    async fn execute(
        &mut self,
        source: &str,
        mut sink: CaptureSink,
    ) -> Result<RunOutcome, ExecutorError> {
        let mut stdin = self
            .child
            .stdin
            .take()
            .ok_or_else(|| ExecutorError::Protocol("realm stdin was not captured".to_string()))?;
        let request = serde_json::json!({ "code": source });
        stdin.write_all(request.to_string().as_bytes()).await?;
        stdin.shutdown().await?;
        drop(stdin);

        let stdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Protocol("realm stdout was not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        match protocol::collect_run(&mut lines, &mut sink).await? {
            Some(Completion::Completed) => Ok(RunOutcome::success(sink.drain_or(NO_OUTPUT))),
            Some(Completion::Faulted(message)) => {
                Ok(RunOutcome::failure(format!("JavaScript Error: {}", message)))
            }
            None => {
                let mut stderr = String::new();
                if let Some(mut pipe) = self.child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr).await;
                }
                Err(ExecutorError::EngineExited { stderr })
            }
        }
    }

    async fn teardown(mut self) {
        let _ = self.child.start_kill();
        match self.child.wait().await {
            Ok(status) => log::debug!("JavaScript realm torn down ({})", status),
            Err(e) => log::warn!("Failed to reap JavaScript realm: {}", e),
        }
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sandbox() -> Option<SandboxExecutor> {
        if which::which("node").is_err() {
            eprintln!("node not found on PATH, skipping sandbox test");
            return None;
        }
        Some(SandboxExecutor::new(RuntimeLocator::node(), 100))
    }

    #[tokio::test]
    async fn test_captures_console_output() {
        let Some(sandbox) = sandbox() else { return };
        let outcome = sandbox
            .evaluate("console.log('Hello', 42); console.info({ a: 1 });")
            .await
            .unwrap();
        assert!(!outcome.failed);
        assert_eq!(outcome.output, "Hello 42\n{ a: 1 }");
    }

    #[tokio::test]
    async fn test_no_output_sentinel() {
        let Some(sandbox) = sandbox() else { return };
        let outcome = sandbox.evaluate("const x = 1 + 1;").await.unwrap();
        assert_eq!(outcome, RunOutcome::success(NO_OUTPUT));
    }

    #[tokio::test]
    async fn test_runtime_fault_is_reported() {
        let Some(sandbox) = sandbox() else { return };
        let outcome = sandbox.evaluate("undefinedFunction();").await.unwrap();
        assert!(outcome.failed);
        assert_eq!(
            outcome.output,
            "JavaScript Error: ReferenceError: undefinedFunction is not defined"
        );
    }

    #[tokio::test]
    async fn test_runs_do_not_share_state() {
        let Some(sandbox) = sandbox() else { return };
        let first = sandbox
            .evaluate("var leaked = 'from run one'; console.log(leaked);")
            .await
            .unwrap();
        assert_eq!(first.output, "from run one");

        let second = sandbox
            .evaluate("console.log(typeof leaked);")
            .await
            .unwrap();
        assert_eq!(second.output, "undefined");
    }

    #[tokio::test]
    async fn test_microtask_output_is_captured() {
        let Some(sandbox) = sandbox() else { return };
        let outcome = sandbox
            .evaluate("Promise.resolve(7).then(v => console.log('later', v)); console.log('now');")
            .await
            .unwrap();
        assert_eq!(outcome.output, "now\nlater 7");
    }

    #[tokio::test]
    async fn test_async_fault_is_a_guest_fault() {
        let Some(sandbox) = sandbox() else { return };
        let outcome = sandbox
            .evaluate(
                "async function main() { console.log('start'); throw new Error('boom'); }\nmain();",
            )
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::failure("JavaScript Error: Error: boom"));

        let outcome = sandbox
            .evaluate("Promise.reject('plain reason');")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::failure("JavaScript Error: plain reason"));
    }

    #[tokio::test]
    async fn test_missing_runtime_is_an_error() {
        let sandbox = SandboxExecutor::new(
            RuntimeLocator::node().with_program(Some(PathBuf::from("/no/such/node"))),
            10,
        );
        let err = sandbox.evaluate("console.log(1)").await.unwrap_err();
        assert!(matches!(err, ExecutorError::RuntimeNotFound { .. }));
    }
}
