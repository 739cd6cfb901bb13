//! Collecting Event Processor
//!
//! Renders events on a background writer thread and keeps both the
//! rendered lines and the events. Callers hand events over through a
//! channel, so parallel branches never block on rendering and never tear
//! each other's lines.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::error::ProcessorError;
use crate::event::{ExecutionEvent, ExecutionEventProcessor, ExecutionInfoFormat, InfoType};

use super::tracker::SeverityTracker;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Collected {
    lines: Vec<String>,
    events: Vec<ExecutionEvent>,
}

/// Number of events handed over but not yet written.
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    written: Condvar,
}

impl Pending {
    fn add(&self) {
        *lock(&self.count) += 1;
    }

    fn done(&self) {
        let mut count = lock(&self.count);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.written.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = lock(&self.count);
        while *count > 0 {
            count = self
                .written
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Collects rendered event lines in memory.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stepwise::sink::CollectingEventProcessor;
/// use stepwise::{Execution, ExecutionInfoFormat, InfoType};
///
/// let processor = Arc::new(CollectingEventProcessor::with_format(
///     "app",
///     ExecutionInfoFormat { add_type: true, ..Default::default() },
/// ));
/// let mut execution = Execution::new(processor.clone());
/// execution.log(InfoType::Warning, "disk almost full", None);
///
/// processor.wait();
/// assert_eq!(processor.lines(), vec!["{warning} disk almost full"]);
/// ```
pub struct CollectingEventProcessor {
    metadata_info: String,
    minimal_severity: InfoType,
    tracker: SeverityTracker,
    sender: Mutex<Option<Sender<ExecutionEvent>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    collected: Arc<Mutex<Collected>>,
    pending: Arc<Pending>,
}

impl CollectingEventProcessor {
    /// Renders events with [`ExecutionEvent::default_description`].
    pub fn new(metadata_info: &str) -> Self {
        Self::start(metadata_info, None)
    }

    /// Renders events with the given format.
    pub fn with_format(metadata_info: &str, format: ExecutionInfoFormat) -> Self {
        Self::start(metadata_info, Some(format))
    }

    /// Drops events less severe than `severity`. The severity tracker
    /// still sees them.
    pub fn with_minimal_severity(mut self, severity: InfoType) -> Self {
        self.minimal_severity = severity;
        self
    }

    fn start(metadata_info: &str, format: Option<ExecutionInfoFormat>) -> Self {
        let (tx, rx) = channel();
        let collected = Arc::new(Mutex::new(Collected::default()));
        let pending = Arc::new(Pending::default());

        let writer = {
            let metadata_info = metadata_info.to_string();
            let collected = Arc::clone(&collected);
            let pending = Arc::clone(&pending);
            thread::spawn(move || write_events(rx, &metadata_info, format, &collected, &pending))
        };

        Self {
            metadata_info: metadata_info.to_string(),
            minimal_severity: InfoType::lowest(),
            tracker: SeverityTracker::new(),
            sender: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            collected,
            pending,
        }
    }

    /// Blocks until every event handed over so far has been written.
    pub fn wait(&self) {
        self.pending.wait();
    }

    /// The lines written so far.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.collected).lines.clone()
    }

    /// The events written so far.
    pub fn events(&self) -> Vec<ExecutionEvent> {
        lock(&self.collected).events.clone()
    }

    /// The worst severity processed so far, filtered events included.
    pub fn severity(&self) -> Option<InfoType> {
        self.tracker.value()
    }
}

fn write_events(
    rx: Receiver<ExecutionEvent>,
    metadata_info: &str,
    format: Option<ExecutionInfoFormat>,
    collected: &Mutex<Collected>,
    pending: &Pending,
) {
    for event in rx {
        let line = match &format {
            Some(format) => event.description(format, Some(metadata_info)),
            None => event.default_description(Some(metadata_info)),
        };
        {
            let mut collected = lock(collected);
            collected.lines.push(line);
            collected.events.push(event);
        }
        pending.done();
    }
    debug!("Event writer for '{}' finished", metadata_info);
}

impl ExecutionEventProcessor for CollectingEventProcessor {
    fn process(&self, event: ExecutionEvent) {
        self.tracker.record(event.severity);
        if !event.severity.meets(self.minimal_severity) {
            return;
        }

        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            warn!("Event after close dropped: {}", event.core_event);
            return;
        };
        self.pending.add();
        if sender.send(event).is_err() {
            self.pending.done();
            warn!("Event writer for '{}' is gone", self.metadata_info);
        }
    }

    fn close_event_processing(&self) -> Result<(), ProcessorError> {
        drop(lock(&self.sender).take());
        let writer = lock(&self.writer).take();
        match writer {
            Some(writer) => writer.join().map_err(|_| ProcessorError::WriterPanicked),
            None => Ok(()),
        }
    }

    fn metadata_info(&self) -> &str {
        &self.metadata_info
    }
}

impl Drop for CollectingEventProcessor {
    fn drop(&mut self) {
        if let Err(e) = self.close_event_processing() {
            warn!("Closing event processing failed: {}", e);
        }
    }
}
