//! Destinations for serialized records.
//!
//! The emitter turns every record into one JSON line and hands it to an
//! [`EventSink`]. Sinks are synchronous: records are also written from
//! `Drop`, where nothing can be awaited.

use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::constants::TRACING_TARGET;
use crate::context::lock;
use crate::error::TelemetryResult;
use crate::types::LogLevel;

// =============================================================================
// EventSink Trait
// =============================================================================

/// Receives serialized records.
pub trait EventSink: Send + Sync {
    /// Writes one record. `line` is a complete JSON object without a
    /// trailing newline.
    fn write(&self, level: LogLevel, line: &str);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn write(&self, level: LogLevel, line: &str) {
        (**self).write(level, line)
    }
}

// =============================================================================
// TracingSink
// =============================================================================

/// Forwards each record as a `tracing` event on the `request_telemetry`
/// target, at the record's level.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn write(&self, level: LogLevel, line: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: TRACING_TARGET, "{}", line),
            LogLevel::Debug => tracing::debug!(target: TRACING_TARGET, "{}", line),
            LogLevel::Info => tracing::info!(target: TRACING_TARGET, "{}", line),
            LogLevel::Warn => tracing::warn!(target: TRACING_TARGET, "{}", line),
            LogLevel::Error => tracing::error!(target: TRACING_TARGET, "{}", line),
            LogLevel::Off => {}
        }
    }
}

// =============================================================================
// WriterSink
// =============================================================================

/// Writes records as JSON lines to any writer.
///
/// Thread-safe via internal mutex. Write failures are reported through
/// `tracing` and never reach the caller.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl WriterSink<io::Stdout> {
    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl WriterSink<File> {
    /// Sink appending to a file, creating it and its parent directory.
    pub fn file(path: &Path) -> TelemetryResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tracing::debug!(path = %parent.display(), "Creating log directory");
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::debug!(path = %path.display(), "File sink initialized");
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> EventSink for WriterSink<W> {
    fn write(&self, _level: LogLevel, line: &str) {
        let mut writer = lock(&self.writer);
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::warn!(error = %e, "Failed to write telemetry record");
        }
    }
}

impl<W: Write + Send> std::fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

// =============================================================================
// MemorySink
// =============================================================================

/// Keeps every record in memory.
///
/// Clones share the same buffer, so a test can keep one clone and hand the
/// other to the emitter.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured lines.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines)
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Returns all captured records parsed back into JSON.
    pub fn events(&self) -> Vec<Value> {
        lock(&self.lines)
            .iter()
            .filter_map(|(_, line)| serde_json::from_str(line).ok())
            .collect()
    }

    /// Returns the captured records whose `type` equals `kind`.
    pub fn events_of_type(&self, kind: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event["type"] == kind)
            .collect()
    }

    /// Returns the level each record was written at.
    pub fn levels(&self) -> Vec<LogLevel> {
        lock(&self.lines).iter().map(|(level, _)| *level).collect()
    }

    /// Clears all captured records.
    pub fn clear(&self) {
        lock(&self.lines).clear();
    }

    /// Returns the number of captured records.
    pub fn len(&self) -> usize {
        lock(&self.lines).len()
    }

    /// Returns true if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        lock(&self.lines).is_empty()
    }
}

impl EventSink for MemorySink {
    fn write(&self, level: LogLevel, line: &str) {
        lock(&self.lines).push((level, line.to_string()));
    }
}
