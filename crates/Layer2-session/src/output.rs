//! Session output capture
//!
//! Bounded line buffer fed by the PTY reader. Keeps the unfinished last
//! line separately so a prompt without a trailing newline is still
//! visible to readiness checks.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Shared, bounded record of a session's output
#[derive(Clone)]
pub struct OutputBuffer {
    inner: Arc<Mutex<OutputInner>>,
}

struct OutputInner {
    lines: VecDeque<String>,
    partial: String,
    max_lines: usize,
    total_bytes: usize,
    last_output: Option<DateTime<Utc>>,
    closed: bool,
}

impl OutputBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutputInner {
                lines: VecDeque::new(),
                partial: String::new(),
                max_lines: max_lines.max(1),
                total_bytes: 0,
                last_output: None,
                closed: false,
            })),
        }
    }

    /// Append a raw chunk read from the terminal
    pub fn push_bytes(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let clean = strip_ansi_escapes::strip(chunk);
        let text = String::from_utf8_lossy(&clean);

        let mut inner = self.inner.lock();
        inner.total_bytes += chunk.len();
        inner.last_output = Some(Utc::now());

        for c in text.chars() {
            match c {
                '\n' => {
                    let line = std::mem::take(&mut inner.partial);
                    inner.push_line(line);
                }
                '\r' => {}
                c => inner.partial.push(c),
            }
        }
    }

    /// Last `n` lines, oldest first; includes the unfinished line if any
    pub fn tail(&self, n: usize) -> Vec<String> {
        let inner = self.inner.lock();
        let has_partial = !inner.partial.is_empty();
        let from_lines = if has_partial { n.saturating_sub(1) } else { n };

        let skip = inner.lines.len().saturating_sub(from_lines);
        let mut out: Vec<String> = inner.lines.iter().skip(skip).cloned().collect();
        if has_partial && n > 0 {
            out.push(inner.partial.clone());
        }
        out
    }

    /// Whether `marker` occurs in any of the last `n` lines
    pub fn contains_recent(&self, marker: &str, n: usize) -> bool {
        self.tail(n).iter().any(|line| line.contains(marker))
    }

    /// Mark the end of output; nothing is pushed after this
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    /// Whether the reader has seen the end of the terminal
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Time of the most recent chunk
    pub fn last_output(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_output
    }

    /// Raw bytes received so far
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    pub fn line_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.lines.len() + usize::from(!inner.partial.is_empty())
    }
}

impl OutputInner {
    fn push_line(&mut self, line: String) {
        if self.lines.len() >= self.max_lines {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("lines", &self.line_count())
            .field("total_bytes", &self.total_bytes())
            .finish()
    }
}
