//! Diagnostic sink for merge progress, warnings, and debug output
//!
//! The merge engine never writes to stdout/stderr directly; everything goes
//! through a `DiagnosticSink` so callers (CLI, build integration, tests) can
//! decide what to do with it. Warnings never stop execution.

use std::sync::Mutex;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warn,
    Info,
    Debug,
}

/// A single recorded diagnostic
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

/// Receiver for merge diagnostics
pub trait DiagnosticSink {
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Sink that prints to stderr
///
/// Debug messages are only printed in verbose mode.
pub struct ConsoleSink {
    verbose: bool,
}

impl ConsoleSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl DiagnosticSink for ConsoleSink {
    fn warn(&self, message: &str) {
        eprintln!("warning: {}", message);
    }

    fn info(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn debug(&self, message: &str) {
        if self.verbose {
            eprintln!("debug: {}", message);
        }
    }
}

/// Sink that records every message, for inspection in tests
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded diagnostics, in emission order
    pub fn messages(&self) -> Vec<Diagnostic> {
        self.messages.lock().expect("sink poisoned").clone()
    }

    /// Just the warning texts
    pub fn warnings(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|d| d.level == Level::Warn)
            .map(|d| d.message)
            .collect()
    }

    fn record(&self, level: Level, message: &str) {
        self.messages.lock().expect("sink poisoned").push(Diagnostic {
            level,
            message: message.to_string(),
        });
    }
}

impl DiagnosticSink for RecordingSink {
    fn warn(&self, message: &str) {
        self.record(Level::Warn, message);
    }

    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.record(Level::Debug, message);
    }
}
