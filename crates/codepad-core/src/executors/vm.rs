//! Long-lived Python interpreter shared by every Python run.
//!
//! Booting an interpreter is slow, so a single [`VmSession`] owns one for the
//! whole process and walks it through an explicit lifecycle:
//!
//! ```text
//! Uninitialized -> Loading -> Ready
//!                          -> Failed   (sticky until `retry`)
//! ```
//!
//! Callers go through [`VmSession::ensure_ready`] and [`VmSession::run`]; the
//! interpreter handle is never exposed. Runs are serialized by the session
//! and every run starts by clearing the interpreter's globals.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use super::capture::CaptureSink;
use super::protocol::{self, Completion};
use super::runtime::{probe_version, version_at_least, RuntimeLocator};
use super::{Executor, NO_OUTPUT};
use crate::config::{CodepadConfig, PythonConfig};
use crate::core_types::{GuestLanguage, RunOutcome};
use crate::errors::ExecutorError;

const VM_DRIVER: &str = include_str!("drivers/vm_driver.py");

pub const NOT_STARTED_MESSAGE: &str =
    "Python environment is not started. Prepare the Python environment before running code.";
pub const LOADING_MESSAGE: &str = "Python environment is still loading. Please wait and try again.";
const RETRY_HINT: &str = "Retry loading the Python environment to try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmState {
    Uninitialized,
    Loading,
    Ready,
    Failed(String),
}

/// A booted interpreter. Implementations must keep globals between calls
/// until `clear_globals` is invoked.
#[async_trait]
pub trait Interpreter: Send {
    async fn clear_globals(&mut self) -> Result<(), ExecutorError>;

    /// Import `packages`, then execute `source`, writing guest output to `sink`.
    async fn run(
        &mut self,
        source: &str,
        packages: &[String],
        sink: &mut CaptureSink,
    ) -> Result<Completion, ExecutorError>;
}

/// Boots interpreters for a session.
#[async_trait]
pub trait InterpreterLoader: Send + Sync {
    /// Human readable name of what gets loaded, for logs.
    fn describe(&self) -> String;

    async fn load(&self) -> Result<Box<dyn Interpreter>, ExecutorError>;
}

pub struct VmSession {
    loader: Arc<dyn InterpreterLoader>,
    state: Mutex<VmState>,
    interpreter: tokio::sync::Mutex<Option<Box<dyn Interpreter>>>,
    max_output_lines: usize,
}

impl VmSession {
    pub fn new(loader: Arc<dyn InterpreterLoader>, max_output_lines: usize) -> Self {
        Self {
            loader,
            state: Mutex::new(VmState::Uninitialized),
            interpreter: tokio::sync::Mutex::new(None),
            max_output_lines,
        }
    }

    pub fn from_config(config: &CodepadConfig) -> Self {
        Self::new(
            Arc::new(PythonLoader::from_config(&config.python)),
            config.execution.max_output_lines,
        )
    }

    pub fn state(&self) -> VmState {
        lock_state(&self.state).clone()
    }

    /// Bring the interpreter up if nobody has yet.
    ///
    /// Concurrent callers queue behind the first one and observe its result,
    /// so at most one bootstrap is ever in flight. A failed bootstrap is not
    /// retried here.
    pub async fn ensure_ready(&self) -> VmState {
        let mut slot = self.interpreter.lock().await;
        match self.state() {
            VmState::Ready if slot.is_some() => return VmState::Ready,
            VmState::Failed(message) => return VmState::Failed(message),
            _ => {}
        }

        let transition = LoadTransition::begin(&self.state);
        log::info!("Loading {}", self.loader.describe());
        let started = Instant::now();
        match self.loader.load().await {
            Ok(interpreter) => {
                *slot = Some(interpreter);
                transition.finish(VmState::Ready);
                log::info!("Python environment ready in {:?}", started.elapsed());
            }
            Err(e) => {
                log::error!("Python environment failed to load: {}", e);
                transition.finish(VmState::Failed(e.to_string()));
            }
        }
        self.state()
    }

    /// Leave the sticky `Failed` state and bootstrap again.
    pub async fn retry(&self) -> VmState {
        {
            let _slot = self.interpreter.lock().await;
            let mut state = lock_state(&self.state);
            if let VmState::Failed(previous) = &*state {
                log::info!("Retrying Python environment after failure: {}", previous);
                *state = VmState::Uninitialized;
            }
        }
        self.ensure_ready().await
    }

    /// Run `source` against a clean global namespace.
    ///
    /// Returns a guided failure without waiting when the session is not
    /// `Ready`. If the returned future is dropped before completion the
    /// interpreter is discarded and the session goes back to `Uninitialized`.
    pub async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
        match self.state() {
            VmState::Ready => {}
            VmState::Uninitialized => return Ok(RunOutcome::failure(NOT_STARTED_MESSAGE)),
            VmState::Loading => return Ok(RunOutcome::failure(LOADING_MESSAGE)),
            VmState::Failed(message) => {
                return Ok(RunOutcome::failure(format!(
                    "Python Environment Error: {}\n\n{}",
                    message, RETRY_HINT
                )))
            }
        }

        let mut guard = RunGuard {
            slot: self.interpreter.lock().await,
            state: &self.state,
            settled: false,
        };
        let Some(interpreter) = guard.slot.as_mut() else {
            guard.settled = true;
            return Ok(RunOutcome::failure(NOT_STARTED_MESSAGE));
        };

        interpreter.clear_globals().await?;
        let packages = required_packages(source);
        if !packages.is_empty() {
            log::debug!("Python run requires packages: {:?}", packages);
        }
        let mut sink = CaptureSink::new(self.max_output_lines);
        let completion = interpreter.run(source, &packages, &mut sink).await?;
        guard.settled = true;

        Ok(match completion {
            Completion::Completed => RunOutcome::success(sink.drain_or(NO_OUTPUT)),
            Completion::Faulted(message) => {
                RunOutcome::failure(format!("Python Error: {}", message))
            }
        })
    }
}

fn lock_state(state: &Mutex<VmState>) -> MutexGuard<'_, VmState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks the session `Loading` for the duration of one bootstrap. If the
/// bootstrap future is dropped part way, the session falls back to
/// `Uninitialized` instead of staying `Loading` forever.
struct LoadTransition<'a> {
    state: &'a Mutex<VmState>,
    finished: bool,
}

impl<'a> LoadTransition<'a> {
    fn begin(state: &'a Mutex<VmState>) -> Self {
        *lock_state(state) = VmState::Loading;
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self, next: VmState) {
        *lock_state(self.state) = next;
        self.finished = true;
    }
}

impl Drop for LoadTransition<'_> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("Python environment load was abandoned");
            *lock_state(self.state) = VmState::Uninitialized;
        }
    }
}

/// Holds the interpreter for one run. An unsettled guard means the run was
/// abandoned or the engine broke mid-run, so the interpreter cannot be
/// trusted and is thrown away.
struct RunGuard<'a> {
    slot: tokio::sync::MutexGuard<'a, Option<Box<dyn Interpreter>>>,
    state: &'a Mutex<VmState>,
    settled: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.slot.take().is_some() {
            log::warn!("Python run did not finish; discarding the interpreter");
        }
        *lock_state(self.state) = VmState::Uninitialized;
    }
}

static IMPORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:from[ \t]+([A-Za-z_][A-Za-z0-9_]*)[A-Za-z0-9_.]*[ \t]+import\b|import[ \t]+([^#;\r\n]+))",
    )
    .expect("import pattern is valid")
});

/// Top-level module names imported by `source`, in first-seen order.
/// Relative imports are skipped.
pub fn required_packages(source: &str) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    let mut add = |name: &str| {
        let valid = name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid && !packages.iter().any(|p| p == name) {
            packages.push(name.to_string());
        }
    };

    for captures in IMPORT_PATTERN.captures_iter(source) {
        if let Some(module) = captures.get(1) {
            add(module.as_str());
        } else if let Some(list) = captures.get(2) {
            for item in list.as_str().split(',') {
                let dotted = item.split_whitespace().next().unwrap_or("");
                add(dotted.split('.').next().unwrap_or(""));
            }
        }
    }
    packages
}

/// Boots a `python3` driver process.
pub struct PythonLoader {
    locator: RuntimeLocator,
    min_version: String,
    bootstrap_timeout: Duration,
}

impl PythonLoader {
    pub fn new(locator: RuntimeLocator, min_version: &str, bootstrap_timeout: Duration) -> Self {
        Self {
            locator,
            min_version: min_version.to_string(),
            bootstrap_timeout,
        }
    }

    pub fn from_config(config: &PythonConfig) -> Self {
        Self::new(
            RuntimeLocator::python().with_program(config.program.clone()),
            &config.min_version,
            Duration::from_secs(config.bootstrap_timeout_secs),
        )
    }
}

#[async_trait]
impl InterpreterLoader for PythonLoader {
    fn describe(&self) -> String {
        format!("Python >= {}", self.min_version)
    }

    async fn load(&self) -> Result<Box<dyn Interpreter>, ExecutorError> {
        let program = self.locator.find()?;
        let version = probe_version(&program).await?;
        if !version_at_least(&version, &self.min_version) {
            return Err(ExecutorError::Bootstrap(format!(
                "Python {} at {} is older than the required {}",
                version,
                program.display(),
                self.min_version
            )));
        }

        let interpreter =
            tokio::time::timeout(self.bootstrap_timeout, PythonInterpreter::spawn(&program))
                .await
                .map_err(|_| {
                    ExecutorError::Bootstrap(format!(
                        "interpreter did not report ready within {}s",
                        self.bootstrap_timeout.as_secs()
                    ))
                })??;
        log::info!(
            "Python {} driver started from {}",
            interpreter.version,
            program.display()
        );
        Ok(Box::new(interpreter))
    }
}

/// A running driver process. Dropping it kills the process.
pub struct PythonInterpreter {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    stderr: Option<ChildStderr>,
    version: String,
    runs: u64,
}

impl PythonInterpreter {
    async fn spawn(program: &Path) -> Result<Self, ExecutorError> {
        let mut child = Command::new(program)
            .arg("-u")
            .arg("-c")
            .arg(VM_DRIVER)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecutorError::Protocol("driver stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutorError::Protocol("driver stdout was not captured".to_string()))?;
        let stderr = child.stderr.take();

        let mut interpreter = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            stderr,
            version: String::new(),
            runs: 0,
        };
        match protocol::await_ready(&mut interpreter.lines).await? {
            Some(version) => interpreter.version = version,
            None => return Err(interpreter.engine_exited().await),
        }
        Ok(interpreter)
    }

    async fn send(&mut self, request: serde_json::Value) -> Result<(), ExecutorError> {
        let mut line = request.to_string();
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn engine_exited(&mut self) -> ExecutorError {
        let mut stderr = String::new();
        if let Some(mut pipe) = self.stderr.take() {
            let _ = tokio::time::timeout(
                Duration::from_secs(1),
                pipe.read_to_string(&mut stderr),
            )
            .await;
        }
        ExecutorError::EngineExited { stderr }
    }
}

#[async_trait]
impl Interpreter for PythonInterpreter {
    async fn clear_globals(&mut self) -> Result<(), ExecutorError> {
        self.send(serde_json::json!({ "op": "reset" })).await?;
        let mut sink = CaptureSink::new(1);
        match protocol::collect_run(&mut self.lines, &mut sink).await? {
            Some(Completion::Completed) => Ok(()),
            Some(Completion::Faulted(message)) => Err(ExecutorError::Protocol(format!(
                "clearing globals failed: {}",
                message
            ))),
            None => Err(self.engine_exited().await),
        }
    }

    async fn run(
        &mut self,
        source: &str,
        packages: &[String],
        sink: &mut CaptureSink,
    ) -> Result<Completion, ExecutorError> {
        // Threads a guest leaves running may still write; their output is
        // tagged with the run that started them and dropped here
        self.runs += 1;
        let run_id = self.runs;
        self.send(serde_json::json!({
            "op": "run",
            "run": run_id,
            "code": source,
            "packages": packages,
        }))
        .await?;
        match protocol::collect_tagged_run(&mut self.lines, sink, run_id).await? {
            Some(completion) => Ok(completion),
            None => Err(self.engine_exited().await),
        }
    }
}

impl Drop for PythonInterpreter {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Python executor backed by a shared [`VmSession`].
pub struct VmExecutor {
    session: Arc<VmSession>,
}

impl VmExecutor {
    pub fn new(session: Arc<VmSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Executor for VmExecutor {
    fn language(&self) -> GuestLanguage {
        GuestLanguage::Python
    }

    async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
        self.session.run(source).await
    }

    async fn prepare(&self) {
        if let VmState::Failed(message) = self.session.ensure_ready().await {
            log::warn!("Python environment unavailable: {}", message);
        }
    }
}
