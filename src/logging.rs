//! Structured logging setup plus the in-memory ring buffer the browser's
//! debug page reads from (the equivalent of the original's
//! `HomeScreenLogHandler`).

use crate::config::LOG_RING_CAPACITY;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Shared, capped ring of formatted log lines. Cloning is cheap (an `Arc`);
/// every clone sees the same underlying buffer.
#[derive(Clone)]
pub struct LogRing {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogRing {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(LOG_RING_CAPACITY))),
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push_back(line);
            while lines.len() > LOG_RING_CAPACITY {
                lines.pop_front();
            }
        }
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

/// A `tracing_subscriber` writer that appends each formatted record to a
/// [`LogRing`] instead of (or alongside) stderr, so the browser's debug page
/// can render the last [`crate::config::LOG_RING_CAPACITY`] records without
/// the UI fighting stderr for the terminal.
#[derive(Clone)]
pub struct RingWriter {
    ring: LogRing,
}

impl RingWriter {
    pub fn new(ring: LogRing) -> Self {
        Self { ring }
    }
}

pub struct RingWriterHandle(RingWriter);

impl std::io::Write for RingWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.lines() {
            if !line.is_empty() {
                self.0.ring.push(line.to_string());
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RingWriter {
    type Writer = RingWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RingWriterHandle(self.clone())
    }
}

/// Install a `tracing-subscriber` pipeline honouring `RUST_LOG` (and the
/// CLI's `-v/--verbose` as a floor of `debug`), writing formatted records
/// into `ring` so the browser's debug page can show the last 50.
pub fn init(ring: LogRing, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RingWriter::new(ring))
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_caps_at_capacity() {
        let ring = LogRing::new();
        for i in 0..(LOG_RING_CAPACITY + 10) {
            ring.push(format!("line {i}"));
        }
        assert_eq!(ring.snapshot().len(), LOG_RING_CAPACITY);
        assert_eq!(ring.snapshot().last().unwrap(), &format!("line {}", LOG_RING_CAPACITY + 9));
    }
}
