//! Stepwise - Execution Tracking for Re-entrant Pipelines
//!
//! Tracks the execution of hierarchical pipelines made of named steps.
//! A step runs at most once per execution unless forced, and every step,
//! part and message is reported as a nested, structured event.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`event`]: Severities, step identities and the event model
//! - [`execution`]: The engine, its async bridge and snapshots for parallel forks
//! - [`localization`]: Multi-language message texts
//! - [`sink`]: Event processors collecting or logging events
//! - [`monitoring`]: Timing derived from the event stream
//! - [`config`]: YAML configuration for new executions
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stepwise::sink::CollectingEventProcessor;
//! use stepwise::{step_id, Execution, ExecutionInfoFormat, InfoType, StepId};
//!
//! const LOAD: StepId = step_id!("load()");
//! const CHECK: StepId = step_id!("check()");
//!
//! fn load(execution: &mut Execution) {
//!     execution.effectuate(None, &LOAD, |execution| {
//!         execution.log(InfoType::Info, "loading", None);
//!     });
//! }
//!
//! fn check(execution: &mut Execution) {
//!     execution.effectuate(None, &CHECK, |execution| {
//!         load(execution);
//!     });
//! }
//!
//! let processor = Arc::new(CollectingEventProcessor::with_format(
//!     "example",
//!     ExecutionInfoFormat::bare_indented(),
//! ));
//! let mut execution = Execution::new(processor.clone());
//! load(&mut execution);
//! check(&mut execution); // load() is not run a second time
//!
//! processor.wait();
//! let lines = processor.lines();
//! assert_eq!(lines.len(), 6);
//! assert_eq!(lines[1], "    loading");
//! assert!(lines[4].starts_with("    skipping previously executed step load()@"));
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod localization;
pub mod monitoring;
pub mod sink;

// Re-export commonly used types
pub use config::{load_config, ExecutionConfig};
pub use error::{ConfigError, ProcessorError};
pub use event::{
    CoreEvent, Effectuation, ExecutionEvent, ExecutionEventProcessor, ExecutionInfoFormat,
    InfoType, StepId,
};
pub use execution::{AsyncExecution, Execution, ExecutionState, Message, PauseHook};
pub use localization::{Language, MultiLanguageText};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
