//! Newline-delimited JSON protocol spoken by the engine drivers.
//!
//! Each driver writes one event per line on its stdout. Guest writes arrive as
//! `output` events and go straight into the run's capture sink; a run ends
//! with exactly one `done` or `error` event. Long-lived drivers tag output
//! with the id of the run that produced it.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::capture::CaptureSink;
use crate::errors::ExecutorError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DriverEvent {
    Ready { version: String },
    Output {
        text: String,
        #[serde(default)]
        run: Option<u64>,
    },
    Done,
    Error { message: String },
}

/// How a guest program finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Completed,
    Faulted(String),
}

pub fn parse_event(line: &str) -> Result<DriverEvent, ExecutorError> {
    Ok(serde_json::from_str(line)?)
}

/// Read events until the run completes, appending guest writes to `sink`.
///
/// Returns `Ok(None)` when the stream closes before a terminal event; the
/// caller decides how to describe a dead engine.
pub async fn collect_run<R>(
    lines: &mut Lines<R>,
    sink: &mut CaptureSink,
) -> Result<Option<Completion>, ExecutorError>
where
    R: AsyncBufRead + Unpin,
{
    collect(lines, sink, None).await
}

/// [`collect_run`] for run `run_id`. Output tagged with any other run is
/// dropped.
pub async fn collect_tagged_run<R>(
    lines: &mut Lines<R>,
    sink: &mut CaptureSink,
    run_id: u64,
) -> Result<Option<Completion>, ExecutorError>
where
    R: AsyncBufRead + Unpin,
{
    collect(lines, sink, Some(run_id)).await
}

async fn collect<R>(
    lines: &mut Lines<R>,
    sink: &mut CaptureSink,
    run_id: Option<u64>,
) -> Result<Option<Completion>, ExecutorError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_event(line)? {
            DriverEvent::Output {
                run: Some(other), ..
            } if run_id.is_some_and(|expected| expected != other) => {
                log::debug!("Dropping output from run {} during run {:?}", other, run_id);
            }
            DriverEvent::Output { text, .. } => sink.write(text),
            DriverEvent::Done => return Ok(Some(Completion::Completed)),
            DriverEvent::Error { message } => return Ok(Some(Completion::Faulted(message))),
            DriverEvent::Ready { .. } => {
                return Err(ExecutorError::Protocol(
                    "unexpected ready event during a run".to_string(),
                ))
            }
        }
    }
    Ok(None)
}

/// Wait for the driver's `ready` handshake and return the engine version.
pub async fn await_ready<R>(lines: &mut Lines<R>) -> Result<Option<String>, ExecutorError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        return match parse_event(line)? {
            DriverEvent::Ready { version } => Ok(Some(version)),
            other => Err(ExecutorError::Protocol(format!(
                "expected ready event, got {:?}",
                other
            ))),
        };
    }
    Ok(None)
}
