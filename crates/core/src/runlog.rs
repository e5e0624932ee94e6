//! Per-run diagnostic log. Every line is mirrored to `tracing` and also kept
//! so it can be returned to the caller alongside the result.

use types::{LogLevel, LogLine};

#[derive(Clone, Debug, Default)]
pub struct RunLog {
    lines: Vec<LogLine>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Trace => tracing::trace!("{message}"),
            LogLevel::Debug => tracing::debug!("{message}"),
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
        self.lines.push(LogLine { level, message });
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Debug, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Appends lines that were already mirrored elsewhere.
    pub fn absorb(&mut self, lines: impl IntoIterator<Item = LogLine>) {
        self.lines.extend(lines);
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<LogLine> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .iter()
            .any(|l| l.level == level && l.message.contains(needle))
    }
}
