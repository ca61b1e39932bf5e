//! Log sink implementations

use std::sync::Mutex;

use crate::ports::{LogLevel, LogSink};

/// Forwards pipeline messages to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "semidao", "{}", message),
            LogLevel::Info => tracing::info!(target: "semidao", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "semidao", "{}", message),
            LogLevel::Error => tracing::error!(target: "semidao", "{}", message),
        }
    }
}

/// Keeps every message in memory
///
/// Used by hosts that want to display the run log afterwards, and by tests.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|(_, m)| m.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        // A poisoned lock only loses diagnostics
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}
