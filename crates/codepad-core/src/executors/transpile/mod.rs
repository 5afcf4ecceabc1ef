//! TypeScript executor: strip the types, then run the result in the
//! JavaScript sandbox.
//!
//! Lowering is purely syntactic. Nothing here checks types, so a program
//! with type errors runs exactly as its JavaScript would.

use async_trait::async_trait;
use std::sync::Arc;

use super::Executor;
use crate::core_types::{GuestLanguage, RunOutcome};
use crate::errors::ExecutorError;

pub mod lexer;
pub mod lower;

pub use lexer::TranspileError;
pub use lower::lower;

pub const TYPES_NOT_CHECKED: &str =
    "Note: TypeScript types are stripped before running, not checked.";

pub struct TranspileExecutor {
    target: Arc<dyn Executor>,
}

impl TranspileExecutor {
    /// `target` runs the lowered JavaScript.
    pub fn new(target: Arc<dyn Executor>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl Executor for TranspileExecutor {
    fn language(&self) -> GuestLanguage {
        GuestLanguage::TypeScript
    }

    async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
        let lowered = match lower(source) {
            Ok(lowered) => lowered,
            Err(e) => {
                log::debug!("TypeScript lowering failed: {}", e);
                return Ok(RunOutcome::failure(format!("TypeScript Error: {}", e)));
            }
        };
        log::trace!("Lowered TypeScript:\n{}", lowered);

        let outcome = self.target.run(&lowered).await?;
        if !outcome.failed {
            return Ok(outcome);
        }
        let fault = outcome
            .output
            .strip_prefix("JavaScript Error: ")
            .unwrap_or(&outcome.output);
        Ok(RunOutcome::failure(format!(
            "TypeScript Error: {}\n\n{}",
            fault, TYPES_NOT_CHECKED
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::runtime::RuntimeLocator;
    use crate::executors::sandbox::SandboxExecutor;
    use std::sync::Mutex;

    /// Records what it was asked to run and answers with a canned outcome.
    struct Recorder {
        seen: Mutex<Vec<String>>,
        answer: RunOutcome,
    }

    #[async_trait]
    impl Executor for Recorder {
        fn language(&self) -> GuestLanguage {
            GuestLanguage::JavaScript
        }

        async fn run(&self, source: &str) -> Result<RunOutcome, ExecutorError> {
            self.seen.lock().unwrap().push(source.to_string());
            Ok(self.answer.clone())
        }
    }

    fn recorder(answer: RunOutcome) -> Arc<Recorder> {
        Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            answer,
        })
    }

    #[tokio::test]
    async fn test_forwards_lowered_source() {
        let target = recorder(RunOutcome::success("3"));
        let executor = TranspileExecutor::new(target.clone());

        let outcome = executor
            .run("const n: number = 3;\nconsole.log(n);")
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::success("3"));
        assert_eq!(
            target.seen.lock().unwrap().as_slice(),
            ["const n = 3;\nconsole.log(n);"]
        );
    }

    #[tokio::test]
    async fn test_transform_fault_never_reaches_target() {
        let target = recorder(RunOutcome::success("unused"));
        let executor = TranspileExecutor::new(target.clone());

        let outcome = executor.run("let s: string = 'open").await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::failure("TypeScript Error: Unterminated string literal (1:17)")
        );
        assert!(target.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_runtime_fault_mentions_unchecked_types() {
        let target = recorder(RunOutcome::failure(
            "JavaScript Error: TypeError: x.foo is not a function",
        ));
        let executor = TranspileExecutor::new(target);

        let outcome = executor.run("x.foo();").await.unwrap();
        assert!(outcome.failed);
        assert_eq!(
            outcome.output,
            format!(
                "TypeScript Error: TypeError: x.foo is not a function\n\n{}",
                TYPES_NOT_CHECKED
            )
        );
    }

    #[tokio::test]
    async fn test_typed_program_runs_in_sandbox() {
        if which::which("node").is_err() {
            eprintln!("node not found on PATH, skipping TypeScript sandbox test");
            return;
        }
        let sandbox = Arc::new(SandboxExecutor::new(RuntimeLocator::node(), 100));
        let executor = TranspileExecutor::new(sandbox);

        let source = r#"
interface User {
  name: string;
  age: number;
}

enum Role { Admin, Guest }

class Account<T> implements Named {
  constructor(private readonly user: User, public role: Role = Role.Guest) {}
  describe(): string {
    return `${this.user.name} (${this.user.age}) is ${Role[this.role]}`;
  }
}

function createUser(name: string, age: number): User {
  return { name, age };
}

const account = new Account<User>(createUser("Alice", 30));
const total = [1, 2, 3].reduce((sum: number, n: number): number => sum + n, 0 as number);
console.log(account.describe());
console.log(total!);
"#;
        let outcome = executor.run(source).await.unwrap();
        assert_eq!(outcome, RunOutcome::success("Alice (30) is Guest\n6"));
    }

    #[tokio::test]
    async fn test_async_fault_in_sandbox() {
        if which::which("node").is_err() {
            return;
        }
        let sandbox = Arc::new(SandboxExecutor::new(RuntimeLocator::node(), 100));
        let executor = TranspileExecutor::new(sandbox);

        let outcome = executor
            .run("async function main(): Promise<void> {\n  throw new Error('boom');\n}\nmain();")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RunOutcome::failure(format!("TypeScript Error: Error: boom\n\n{}", TYPES_NOT_CHECKED))
        );
    }

    #[tokio::test]
    async fn test_namespace_runs_in_sandbox() {
        if which::which("node").is_err() {
            return;
        }
        let sandbox = Arc::new(SandboxExecutor::new(RuntimeLocator::node(), 100));
        let executor = TranspileExecutor::new(sandbox);

        let source = r#"
namespace Shapes {
  export const sides: number = 4;
  export function describe(name: string): string {
    return `${name} has ${sides} sides`;
  }
}
console.log(Shapes.describe("square"));
"#;
        let outcome = executor.run(source).await.unwrap();
        assert_eq!(outcome, RunOutcome::success("square has 4 sides"));
    }
}
