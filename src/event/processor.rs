//! Event Processor Contract
//!
//! The sink every execution reports to. One processor is typically shared
//! by many executions running on different threads.

use crate::error::ProcessorError;

use super::model::ExecutionEvent;

/// Receives the events of one or more executions.
///
/// Implementations must accept concurrent calls to [`process`] from
/// parallel branches without losing or tearing events.
///
/// [`process`]: ExecutionEventProcessor::process
pub trait ExecutionEventProcessor: Send + Sync {
    /// Handles one event.
    fn process(&self, event: ExecutionEvent);

    /// Flushes and releases the processor's resources. Calling it more than
    /// once is allowed.
    fn close_event_processing(&self) -> Result<(), ProcessorError>;

    /// Metadata used as a prefix for log lines.
    fn metadata_info(&self) -> &str;

    /// Metadata for user-facing interaction.
    fn metadata_info_for_user_interaction(&self) -> &str {
        self.metadata_info()
    }
}
