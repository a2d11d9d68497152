//! Structured error reporting.
//!
//! Recovered failures (a fetch that fell back to the offline response, a sync
//! action that will be retried, an audio asset that failed to load) never reach
//! the caller. They are handed to an [`ErrorReporter`] instead, as a kind plus
//! context fields, so an observability collaborator can collect them.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{ErrorCode, WorkerError};

/// Where in the system a reported failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Static asset precache during install.
    Install,
    /// Runtime fetch that fell back to an offline response.
    Fetch,
    /// Detached write into the dynamic cache.
    CacheWrite,
    /// Stale cache removal during activate.
    Activate,
    /// A single pending offline action.
    SyncAction,
    /// Listing pending actions for background sync.
    Sync,
    /// Page message handling.
    Message,
    /// Host effect (notification, window, client claim).
    Host,
    /// Audio asset load.
    AudioLoad,
    /// Audio playback start.
    AudioPlayback,
    /// Audio resource release.
    AudioTeardown,
}

impl ReportKind {
    /// Returns the string representation used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Install => "install",
            ReportKind::Fetch => "fetch",
            ReportKind::CacheWrite => "cache_write",
            ReportKind::Activate => "activate",
            ReportKind::SyncAction => "sync_action",
            ReportKind::Sync => "sync",
            ReportKind::Message => "message",
            ReportKind::Host => "host",
            ReportKind::AudioLoad => "audio_load",
            ReportKind::AudioPlayback => "audio_playback",
            ReportKind::AudioTeardown => "audio_teardown",
        }
    }
}

/// A single structured error report.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: ReportKind,
    pub code: ErrorCode,
    pub message: String,
    pub context: Vec<(&'static str, String)>,
}

impl ErrorReport {
    /// Builds a report from an error.
    pub fn from_error(kind: ReportKind, error: &WorkerError) -> Self {
        Self {
            kind,
            code: error.code,
            message: error.message.clone(),
            context: Vec::new(),
        }
    }

    /// Adds a context field.
    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Returns the value of a context field, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sink for structured error reports.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: ErrorReport);
}

/// Context keys that [`TracingReporter`] records as individual fields.
/// Other keys are folded into a single `extra` field.
pub const CONTEXT_FIELDS: &[&str] = &[
    "url",
    "stage",
    "destination",
    "cache",
    "effect",
    "message_type",
    "urls",
    "action_id",
    "path",
];

/// Reporter that forwards every report to `tracing` at warn level, inside an
/// `error_report` span carrying the kind, code and one field per context key.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, report: ErrorReport) {
        use tracing::field::Empty;

        let span = tracing::warn_span!(
            "error_report",
            kind = report.kind.as_str(),
            code = report.code.as_str(),
            url = Empty,
            stage = Empty,
            destination = Empty,
            cache = Empty,
            effect = Empty,
            message_type = Empty,
            urls = Empty,
            action_id = Empty,
            path = Empty,
            extra = Empty,
        );

        let mut extra = Vec::new();
        for (key, value) in &report.context {
            if CONTEXT_FIELDS.contains(key) {
                span.record(*key, value.as_str());
            } else {
                extra.push(format!("{}={}", key, value));
            }
        }
        if !extra.is_empty() {
            span.record("extra", extra.join(" ").as_str());
        }

        let _entered = span.enter();
        tracing::warn!("{}", report.message);
    }
}

/// Reporter that keeps reports in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryReporter {
    reports: Arc<Mutex<Vec<ErrorReport>>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every report received so far.
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the reports of one kind.
    pub fn of_kind(&self, kind: ReportKind) -> Vec<ErrorReport> {
        self.reports()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }
}

impl ErrorReporter for MemoryReporter {
    fn report(&self, report: ErrorReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_carries_context() {
        let err = WorkerError::network("http://localhost/a.js", "offline");
        let report = ErrorReport::from_error(ReportKind::Fetch, &err)
            .with("url", "http://localhost/a.js")
            .with("destination", "script");

        assert_eq!(report.code, ErrorCode::NetworkFailed);
        assert_eq!(report.field("url"), Some("http://localhost/a.js"));
        assert_eq!(report.field("destination"), Some("script"));
        assert_eq!(report.field("missing"), None);
    }

    #[test]
    fn memory_reporter_filters_by_kind() {
        let reporter = MemoryReporter::new();
        let err = WorkerError::cache_storage("disk full");
        reporter.report(ErrorReport::from_error(ReportKind::CacheWrite, &err));
        reporter.report(ErrorReport::from_error(ReportKind::Install, &err));

        assert_eq!(reporter.reports().len(), 2);
        assert_eq!(reporter.of_kind(ReportKind::CacheWrite).len(), 1);
        assert!(reporter.of_kind(ReportKind::AudioLoad).is_empty());
    }

    #[test]
    fn tracing_reporter_does_not_panic_without_subscriber() {
        let err = WorkerError::host("window closed");
        TracingReporter.report(ErrorReport::from_error(ReportKind::Host, &err).with("url", "/"));
    }

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn tracing_reporter_emits_each_context_field() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();

        let err = WorkerError::network("http://localhost:5173/app.js", "offline");
        tracing::subscriber::with_default(subscriber, || {
            TracingReporter.report(
                ErrorReport::from_error(ReportKind::Fetch, &err)
                    .with("url", "http://localhost:5173/app.js")
                    .with("stage", "cache_lookup")
                    .with("attempt", "2"),
            );
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("kind=\"fetch\""), "{}", output);
        assert!(output.contains("code=\"NETWORK_FAILED\""), "{}", output);
        assert!(output.contains("url=\"http://localhost:5173/app.js\""), "{}", output);
        assert!(output.contains("stage=\"cache_lookup\""), "{}", output);
        assert!(output.contains("extra=\"attempt=2\""), "{}", output);
        assert!(!output.contains("context="), "{}", output);
    }

    #[test]
    fn context_fields_cover_every_key_in_use() {
        for key in ["url", "cache", "effect", "path", "action_id", "message_type"] {
            assert!(CONTEXT_FIELDS.contains(&key), "{} not a field", key);
        }
    }
}
