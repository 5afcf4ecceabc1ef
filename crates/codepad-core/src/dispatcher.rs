//! Execution dispatcher: the single entry point from the editing surface.
//!
//! Maps a language to its executor, bounds every run with a timeout and turns
//! every fault (executor errors, timeouts, panics) into a failed
//! `ExecutionResult`. Nothing raised below this layer reaches the caller.

use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::CodepadConfig;
use crate::core_types::{ExecutionRequest, ExecutionResult, GuestLanguage, RunOutcome};
use crate::errors::ExecutorError;
use crate::executors::analyzers::StaticAnalyzer;
use crate::executors::sandbox::SandboxExecutor;
use crate::executors::transpile::TranspileExecutor;
use crate::executors::vm::{VmExecutor, VmSession};
use crate::executors::Executor;

pub const BUSY_MESSAGE: &str =
    "Another execution is still running. Wait for it to finish and try again.";

pub struct Dispatcher {
    executors: HashMap<GuestLanguage, Arc<dyn Executor>>,
    timeout: Duration,
    in_flight: AtomicBool,
}

/// Marks a run as in flight for as long as it lives.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Dispatcher {
    /// A dispatcher with no executors registered.
    pub fn new(timeout: Duration) -> Self {
        Self {
            executors: HashMap::new(),
            timeout,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The standard registry: one executor per supported language. The
    /// TypeScript executor shares the JavaScript sandbox.
    pub fn from_config(config: &CodepadConfig) -> Self {
        let sandbox: Arc<dyn Executor> = Arc::new(SandboxExecutor::from_config(config));
        let session = Arc::new(VmSession::from_config(config));

        Self::new(Duration::from_secs(config.execution.timeout_secs))
            .with_executor(sandbox.clone())
            .with_executor(Arc::new(TranspileExecutor::new(sandbox)))
            .with_executor(Arc::new(VmExecutor::new(session)))
            .with_executor(Arc::new(StaticAnalyzer::html()))
            .with_executor(Arc::new(StaticAnalyzer::css()))
            .with_executor(Arc::new(StaticAnalyzer::json()))
            .with_executor(Arc::new(StaticAnalyzer::markdown()))
    }

    /// Register `executor` for the language it reports, replacing any
    /// previous one.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executors.insert(executor.language(), executor);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Supported languages in display order.
    pub fn languages(&self) -> Vec<GuestLanguage> {
        GuestLanguage::SUPPORTED
            .iter()
            .filter(|language| self.executors.contains_key(*language))
            .cloned()
            .collect()
    }

    /// Warm up the executor for `language` (e.g. boot the Python VM).
    pub async fn prepare(&self, language: &GuestLanguage) {
        if let Some(executor) = self.executors.get(language) {
            executor.prepare().await;
        }
    }

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();
        let finish = |outcome: RunOutcome| {
            ExecutionResult::from_outcome(outcome, started.elapsed().as_millis() as u64)
        };

        let Some(executor) = self.executors.get(&request.language).cloned() else {
            log::info!("Rejected unsupported language {:?}", request.language.id());
            return finish(RunOutcome::success(self.unsupported_message(&request.language)));
        };

        let Some(_slot) = InFlight::acquire(&self.in_flight) else {
            log::warn!("Rejected {} run: another run is in flight", request.language);
            return finish(RunOutcome::failure(BUSY_MESSAGE));
        };

        let run_id = Uuid::new_v4();
        log::info!(
            "[{}] Running {} ({} bytes)",
            run_id,
            request.language,
            request.source.len()
        );

        let guarded = AssertUnwindSafe(executor.run(&request.source)).catch_unwind();
        let outcome = match tokio::time::timeout(self.timeout, guarded).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(e))) => {
                log::error!("[{}] {} executor fault: {}", run_id, request.language, e);
                execution_error(&e)
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                log::error!("[{}] {} executor panicked: {}", run_id, request.language, message);
                RunOutcome::failure(format!("Execution Error: {}", message))
            }
            Err(_) => {
                log::warn!("[{}] Abandoned {} run after {:?}", run_id, request.language, self.timeout);
                execution_error(&ExecutorError::Timeout(self.timeout))
            }
        };

        let result = finish(outcome);
        log::info!(
            "[{}] Finished in {} ms (failed: {})",
            run_id,
            result.elapsed_millis,
            result.failed
        );
        result
    }

    fn unsupported_message(&self, language: &GuestLanguage) -> String {
        let supported = self
            .languages()
            .iter()
            .map(|l| l.display_name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Language \"{}\" is not supported yet.\n\nSupported languages: {}",
            language.id(),
            supported
        )
    }
}

fn execution_error(error: &ExecutorError) -> RunOutcome {
    RunOutcome::failure(format!("Execution Error: {}", error))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "executor panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    enum Behavior {
        Echo,
        Sleep(Duration),
        Fault,
        Panic,
    }

    struct FakeExecutor {
        language: GuestLanguage,
        behavior: Behavior,
        prepared: AtomicUsize,
    }

    impl FakeExecutor {
        fn new(language: GuestLanguage, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                language,
                behavior,
                prepared: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        fn language(&self) -> GuestLanguage {
            self.language.clone()
        }

        async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
            match &self.behavior {
                Behavior::Echo => Ok(RunOutcome::success(source)),
                Behavior::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(RunOutcome::success("slept"))
                }
                Behavior::Fault => Err(ExecutorError::Protocol("driver sent garbage".to_string())),
                Behavior::Panic => panic!("executor blew up"),
            }
        }

        async fn prepare(&self) {
            self.prepared.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispatcher_with(executor: Arc<FakeExecutor>) -> Dispatcher {
        Dispatcher::new(Duration::from_millis(100)).with_executor(executor)
    }

    fn request(source: &str, language: GuestLanguage) -> ExecutionRequest {
        ExecutionRequest::new(source, language)
    }

    #[tokio::test]
    async fn test_routes_to_registered_executor() {
        let dispatcher = dispatcher_with(FakeExecutor::new(GuestLanguage::JavaScript, Behavior::Echo));

        let result = dispatcher
            .execute(request("hello", GuestLanguage::JavaScript))
            .await;
        assert!(!result.failed);
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn test_unsupported_language_is_guided_not_failed() {
        let dispatcher = Dispatcher::from_config(&CodepadConfig::default());

        let result = dispatcher
            .execute(request("IDENTIFICATION DIVISION.", GuestLanguage::parse("cobol")))
            .await;
        assert!(!result.failed);
        assert_eq!(
            result.output,
            "Language \"cobol\" is not supported yet.\n\n\
             Supported languages: JavaScript, TypeScript, Python, HTML, CSS, JSON, Markdown"
        );
    }

    #[tokio::test]
    async fn test_unregistered_language_lists_only_registered() {
        let dispatcher = dispatcher_with(FakeExecutor::new(GuestLanguage::Css, Behavior::Echo));

        let result = dispatcher.execute(request("x", GuestLanguage::Python)).await;
        assert!(!result.failed);
        assert!(result.output.ends_with("Supported languages: CSS"));
    }

    #[tokio::test]
    async fn test_executor_fault_becomes_data() {
        let dispatcher = dispatcher_with(FakeExecutor::new(GuestLanguage::Python, Behavior::Fault));

        let result = dispatcher.execute(request("x", GuestLanguage::Python)).await;
        assert!(result.failed);
        assert_eq!(
            result.output,
            "Execution Error: Engine protocol violation: driver sent garbage"
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_data_and_releases_slot() {
        let dispatcher = Dispatcher::new(Duration::from_millis(100))
            .with_executor(FakeExecutor::new(GuestLanguage::Json, Behavior::Panic))
            .with_executor(FakeExecutor::new(GuestLanguage::Css, Behavior::Echo));

        let result = dispatcher.execute(request("{}", GuestLanguage::Json)).await;
        assert!(result.failed);
        assert_eq!(result.output, "Execution Error: executor blew up");

        let result = dispatcher.execute(request("a {}", GuestLanguage::Css)).await;
        assert!(!result.failed);
    }

    #[tokio::test]
    async fn test_timeout_bounds_the_run() {
        let dispatcher = dispatcher_with(FakeExecutor::new(
            GuestLanguage::JavaScript,
            Behavior::Sleep(Duration::from_secs(5)),
        ));

        let result = dispatcher
            .execute(request("while (true) {}", GuestLanguage::JavaScript))
            .await;
        assert!(result.failed);
        assert_eq!(result.output, "Execution Error: Execution timed out after 0.1s");
        assert!(result.elapsed_millis >= 100);
        assert!(result.elapsed_millis < 5000);
    }

    #[tokio::test]
    async fn test_second_concurrent_run_is_rejected() {
        let dispatcher = Arc::new(
            Dispatcher::new(Duration::from_secs(2)).with_executor(FakeExecutor::new(
                GuestLanguage::Python,
                Behavior::Sleep(Duration::from_millis(200)),
            )),
        );

        let first = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.execute(request("a", GuestLanguage::Python)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = dispatcher.execute(request("b", GuestLanguage::Python)).await;
        assert!(second.failed);
        assert_eq!(second.output, BUSY_MESSAGE);

        let first = first.await.unwrap();
        assert_eq!(first.output, "slept");

        let third = dispatcher.execute(request("c", GuestLanguage::Python)).await;
        assert_eq!(third.output, "slept");
    }

    #[tokio::test]
    async fn test_elapsed_covers_the_awaited_run() {
        let dispatcher = dispatcher_with(FakeExecutor::new(
            GuestLanguage::Markdown,
            Behavior::Sleep(Duration::from_millis(30)),
        ));

        let result = dispatcher.execute(request("# hi", GuestLanguage::Markdown)).await;
        assert!(result.elapsed_millis >= 30);
    }

    #[tokio::test]
    async fn test_prepare_reaches_executor() {
        let executor = FakeExecutor::new(GuestLanguage::Python, Behavior::Echo);
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.prepare(&GuestLanguage::Python).await;
        dispatcher.prepare(&GuestLanguage::Html).await;
        assert_eq!(executor.prepared.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_standard_registry_runs_analyzers() {
        let dispatcher = Dispatcher::from_config(&CodepadConfig::default());
        assert_eq!(dispatcher.languages(), GuestLanguage::SUPPORTED.to_vec());
        assert_eq!(dispatcher.timeout(), Duration::from_secs(10));

        let result = dispatcher
            .execute(request("[1, 2]", GuestLanguage::Json))
            .await;
        assert!(!result.failed);
        assert!(result.output.contains("Array contains 2 elements."));

        let result = dispatcher
            .execute(request("{\"a\": }", GuestLanguage::Json))
            .await;
        assert!(result.failed);
        assert!(result.output.starts_with("JSON Error:"));
    }

    #[tokio::test]
    async fn test_sandbox_runs_are_independent() {
        if which::which("node").is_err() {
            eprintln!("node not found on PATH, skipping sandbox isolation test");
            return;
        }
        let dispatcher = Dispatcher::from_config(&CodepadConfig::default());

        let first = dispatcher
            .execute(request("var leaked = 1; console.log(leaked);", GuestLanguage::JavaScript))
            .await;
        assert_eq!(first.output, "1");

        let second = dispatcher
            .execute(request("console.log(typeof leaked);", GuestLanguage::JavaScript))
            .await;
        assert_eq!(second.output, "undefined");
    }
}
