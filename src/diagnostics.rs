//! Diagnostics sinks
//!
//! Checkers never reach for a process-wide logger directly. Every entry point
//! takes a `&dyn Diagnostics`; the default sink forwards to `tracing`, and
//! `CollectingDiagnostics` keeps events in memory for callers that want to
//! surface them elsewhere (and for tests).

use std::sync::Mutex;

/// Severity of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single diagnostic event emitted during a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub severity: Severity,
    /// Component that emitted the event (e.g. "avro.add_only")
    pub source: &'static str,
    pub message: String,
}

/// Receiver for diagnostics emitted by the checkers
pub trait Diagnostics: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);

    fn debug(&self, source: &'static str, message: String) {
        self.emit(DiagnosticEvent { severity: Severity::Debug, source, message });
    }

    fn info(&self, source: &'static str, message: String) {
        self.emit(DiagnosticEvent { severity: Severity::Info, source, message });
    }

    fn warn(&self, source: &'static str, message: String) {
        self.emit(DiagnosticEvent { severity: Severity::Warn, source, message });
    }

    fn error(&self, source: &'static str, message: String) {
        self.emit(DiagnosticEvent { severity: Severity::Error, source, message });
    }
}

/// Forwards every event to the `tracing` subscriber installed by the host
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, event: DiagnosticEvent) {
        match event.severity {
            Severity::Debug => tracing::debug!(source = event.source, "{}", event.message),
            Severity::Info => tracing::info!(source = event.source, "{}", event.message),
            Severity::Warn => tracing::warn!(source = event.source, "{}", event.message),
            Severity::Error => tracing::error!(source = event.source, "{}", event.message),
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events at or above `severity`
    pub fn at_least(&self, severity: Severity) -> Vec<DiagnosticEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.severity >= severity)
            .collect()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn emit(&self, event: DiagnosticEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
