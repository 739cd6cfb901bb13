//! Event Sinks
//!
//! Concrete [`ExecutionEventProcessor`](crate::event::ExecutionEventProcessor)
//! implementations.
//!
//! # Components
//!
//! - [`CollectingEventProcessor`]: In-memory lines and events, written on a background thread
//! - [`LogEventProcessor`]: Forwards events to the `log` facade
//! - [`SeverityTracker`]: Worst severity seen, shared by both

pub mod collecting;
pub mod logger;
pub mod tracker;

pub use collecting::CollectingEventProcessor;
pub use logger::{log_level, LogEventProcessor, EVENT_TARGET};
pub use tracker::SeverityTracker;
