//! Log Facade Processor
//!
//! Forwards execution events to the `log` facade, so events end up
//! wherever the application's logger writes.

use log::{log, log_enabled, warn, Level};

use crate::error::ProcessorError;
use crate::event::{ExecutionEvent, ExecutionEventProcessor, ExecutionInfoFormat, InfoType};

use super::tracker::SeverityTracker;

/// Log target for forwarded events.
pub const EVENT_TARGET: &str = "stepwise::events";

/// The log level an event severity is written with.
pub fn log_level(severity: InfoType) -> Level {
    match severity {
        InfoType::Debug => Level::Trace,
        InfoType::Progress => Level::Debug,
        InfoType::Info | InfoType::Iteration => Level::Info,
        InfoType::Warning => Level::Warn,
        InfoType::Error | InfoType::Fatal | InfoType::Loss | InfoType::Deadly => Level::Error,
    }
}

/// Writes every event as one log record under [`EVENT_TARGET`].
pub struct LogEventProcessor {
    metadata_info: String,
    format: ExecutionInfoFormat,
    json: bool,
    minimal_severity: InfoType,
    tracker: SeverityTracker,
}

impl LogEventProcessor {
    /// Logs events in the full format, minus the time stamp the logger
    /// adds itself.
    pub fn new(metadata_info: &str) -> Self {
        Self {
            metadata_info: metadata_info.to_string(),
            format: ExecutionInfoFormat {
                with_time: false,
                ..ExecutionInfoFormat::full()
            },
            json: false,
            minimal_severity: InfoType::lowest(),
            tracker: SeverityTracker::new(),
        }
    }

    pub fn with_format(mut self, format: ExecutionInfoFormat) -> Self {
        self.format = format;
        self
    }

    /// Logs events as JSON objects instead of text.
    pub fn as_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_minimal_severity(mut self, severity: InfoType) -> Self {
        self.minimal_severity = severity;
        self
    }

    /// The worst severity processed so far.
    pub fn severity(&self) -> Option<InfoType> {
        self.tracker.value()
    }

    fn render(&self, event: &ExecutionEvent) -> Option<String> {
        if !self.json {
            return Some(event.description(&self.format, Some(&self.metadata_info)));
        }
        match event.to_json() {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Could not serialize event {}: {}", event.core_event, e);
                None
            }
        }
    }
}

impl ExecutionEventProcessor for LogEventProcessor {
    fn process(&self, event: ExecutionEvent) {
        self.tracker.record(event.severity);
        if !event.severity.meets(self.minimal_severity) {
            return;
        }

        let level = log_level(event.severity);
        if !log_enabled!(target: EVENT_TARGET, level) {
            return;
        }
        if let Some(line) = self.render(&event) {
            log!(target: EVENT_TARGET, level, "{}", line);
        }
    }

    fn close_event_processing(&self) -> Result<(), ProcessorError> {
        log::logger().flush();
        Ok(())
    }

    fn metadata_info(&self) -> &str {
        &self.metadata_info
    }
}
