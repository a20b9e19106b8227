//! Log sink abstraction and the sinks shipped with the crate.
//!
//! # Design
//! The dispatcher only knows `LogSink`: a level check and an `emit` taking a
//! level, a message and an ordered field map. `TracingSink` forwards records
//! to `tracing`; `RecordingSink` keeps them in memory.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

/// Insertion-ordered log fields.
pub type Fields = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Error,
}

/// One structured log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub fields: Fields,
}

/// Destination for dispatch records.
pub trait LogSink: Send + Sync {
    fn enabled(&self, level: Level) -> bool;

    fn emit(&self, record: &LogRecord);
}

/// Forwards records to the current `tracing` subscriber under the
/// `instrumented_http` target.
///
/// `tracing` field names are fixed at compile time, so a record's fields are
/// rendered into a single logfmt `fields` value. A JSON layer sees that one
/// string, not the individual keys; attach a custom `LogSink` when they are
/// needed separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn enabled(&self, level: Level) -> bool {
        match level {
            Level::Info => tracing::enabled!(target: "instrumented_http", tracing::Level::INFO),
            Level::Error => tracing::enabled!(target: "instrumented_http", tracing::Level::ERROR),
        }
    }

    fn emit(&self, record: &LogRecord) {
        let fields = Logfmt(&record.fields);
        match record.level {
            Level::Info => {
                tracing::info!(target: "instrumented_http", fields = %fields, "{}", record.message)
            }
            Level::Error => {
                tracing::error!(target: "instrumented_http", fields = %fields, "{}", record.message)
            }
        }
    }
}

/// Renders fields as space-separated `key=value` pairs, quoting strings that
/// contain whitespace, quotes or `=`.
pub struct Logfmt<'a>(pub &'a Fields);

impl fmt::Display for Logfmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                Value::String(s) if needs_quoting(s) => write!(f, "{key}={s:?}")?,
                Value::String(s) => write!(f, "{key}={s}")?,
                other => write!(f, "{key}={other}")?,
            }
        }
        Ok(())
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '=')
}

/// Keeps every emitted record in memory.
#[derive(Debug)]
pub struct RecordingSink {
    records: Mutex<Vec<LogRecord>>,
    enabled: AtomicBool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink {
            records: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// A sink that reports every level as disabled.
    pub fn disabled() -> Self {
        let sink = Self::new();
        sink.set_enabled(false);
        sink
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Drains and returns what has been recorded so far.
    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl LogSink for RecordingSink {
    fn enabled(&self, _level: Level) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn emit(&self, record: &LogRecord) {
        self.records.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn logfmt_keeps_insertion_order() {
        let f = fields(&[
            ("duration", json!(12)),
            ("status", json!(200)),
            ("response", json!("ok")),
        ]);
        assert_eq!(Logfmt(&f).to_string(), "duration=12 status=200 response=ok");
    }

    #[test]
    fn logfmt_quotes_strings_that_need_it() {
        let f = fields(&[
            ("request", json!(r#"{"a":1}"#)),
            ("error", json!("connection refused")),
            ("empty", json!("")),
        ]);
        assert_eq!(
            Logfmt(&f).to_string(),
            r#"request="{\"a\":1}" error="connection refused" empty="""#
        );
    }

    #[test]
    fn recording_sink_collects_and_drains() {
        let sink = RecordingSink::new();
        sink.emit(&LogRecord {
            level: Level::Info,
            message: "GET http://x".to_string(),
            fields: Fields::new(),
        });
        assert_eq!(sink.records().len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.records().is_empty());
    }

    #[test]
    fn disabled_recording_sink_reports_no_levels() {
        let sink = RecordingSink::disabled();
        assert!(!sink.enabled(Level::Info));
        assert!(!sink.enabled(Level::Error));
        sink.set_enabled(true);
        assert!(sink.enabled(Level::Info));
    }

    #[test]
    fn tracing_sink_follows_subscriber_level() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(!TracingSink.enabled(Level::Info));
            assert!(TracingSink.enabled(Level::Error));
        });
    }
}
