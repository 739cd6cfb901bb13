//! Execution Monitoring
//!
//! Derives timing information from the event stream.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step and part durations for reports and Gantt charts

pub mod timeline;

pub use timeline::{ExecutionTimeline, SpanOutcome, TimelineSpan};
