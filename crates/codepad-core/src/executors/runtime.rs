//! Locating guest engines on the host.
//
// An explicitly configured program wins; otherwise each candidate name is
// resolved against PATH in order.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use which::which;

use crate::errors::ExecutorError;

#[derive(Debug, Clone)]
pub struct RuntimeLocator {
    runtime: String,
    explicit: Option<PathBuf>,
    candidates: Vec<String>,
}

impl RuntimeLocator {
    pub fn new(runtime: &str, candidates: &[&str]) -> Self {
        Self {
            runtime: runtime.to_string(),
            explicit: None,
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_program(mut self, program: Option<PathBuf>) -> Self {
        self.explicit = program;
        self
    }

    pub fn node() -> Self {
        Self::new("JavaScript", &["node", "nodejs"])
    }

    pub fn python() -> Self {
        Self::new("Python", &["python3", "python"])
    }

    pub fn find(&self) -> Result<PathBuf, ExecutorError> {
        if let Some(program) = &self.explicit {
            return find_program(program).ok_or_else(|| ExecutorError::RuntimeNotFound {
                runtime: self.runtime.clone(),
                candidates: program.display().to_string(),
            });
        }

        self.candidates
            .iter()
            .find_map(|candidate| which(candidate).ok())
            .ok_or_else(|| ExecutorError::RuntimeNotFound {
                runtime: self.runtime.clone(),
                candidates: self.candidates.join(", "),
            })
    }
}

fn find_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        program.exists().then(|| program.to_path_buf())
    } else {
        which(program).ok()
    }
}

/// Run `<program> --version` and pull the first dotted version out of it.
pub async fn probe_version(program: &Path) -> Result<String, ExecutorError> {
    let output = Command::new(program).arg("--version").output().await?;
    // Older Pythons print the version on stderr
    let text = format!(
        "{} {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    extract_version(&text).ok_or_else(|| {
        ExecutorError::Bootstrap(format!(
            "could not read a version from `{} --version`: {}",
            program.display(),
            text.trim()
        ))
    })
}

pub fn extract_version(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|word| word.trim_start_matches('v'))
        .find(|word| {
            word.split('.').count() >= 2
                && word
                    .split('.')
                    .next()
                    .map(|major| !major.is_empty() && major.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
        })
        .map(|word| word.to_string())
}

/// Parse the numeric prefix of each dotted component: "3.11.4rc1" -> [3, 11, 4].
pub fn parse_version(version: &str) -> Option<Vec<u32>> {
    let parts: Vec<u32> = version
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

pub fn version_at_least(actual: &str, minimum: &str) -> bool {
    match (parse_version(actual), parse_version(minimum)) {
        (Some(mut actual), Some(mut minimum)) => {
            let len = actual.len().max(minimum.len());
            actual.resize(len, 0);
            minimum.resize(len, 0);
            actual >= minimum
        }
        _ => false,
    }
}
