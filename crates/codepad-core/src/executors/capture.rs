//! Bounded output buffer for one guest run.

/// Default bound on captured writes per run.
pub const DEFAULT_MAX_LINES: usize = 10_000;

/// Append-only record of the writes a guest program makes during one run.
///
/// A sink is created fresh for every run and consumed by [`CaptureSink::drain`],
/// so a buffer can never leak into the next run.
#[derive(Debug)]
pub struct CaptureSink {
    writes: Vec<String>,
    max_lines: usize,
    dropped: usize,
}

impl CaptureSink {
    pub fn new(max_lines: usize) -> Self {
        Self {
            writes: Vec::new(),
            max_lines: max_lines.max(1),
            dropped: 0,
        }
    }

    pub fn write(&mut self, text: impl Into<String>) {
        if self.writes.len() < self.max_lines {
            self.writes.push(text.into());
        } else {
            self.dropped += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Consume the sink and join its writes with newlines.
    pub fn drain(self) -> String {
        let mut text = self.writes.join("\n");
        if self.dropped > 0 {
            log::warn!("Capture sink dropped {} writes over its bound", self.dropped);
            text.push_str(&format!(
                "\n... output truncated ({} more writes omitted)",
                self.dropped
            ));
        }
        text
    }

    /// Drain into the text shown to the user, falling back to `empty_sentinel`
    /// when the guest wrote nothing.
    pub fn drain_or(self, empty_sentinel: &str) -> String {
        if self.is_empty() {
            empty_sentinel.to_string()
        } else {
            self.drain()
        }
    }
}

impl Default for CaptureSink {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}
