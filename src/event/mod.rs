//! Execution Event Module
//!
//! Everything an execution reports about itself.
//!
//! - [`severity`]: Ordered severities and appeasement clamping
//! - [`model`]: Step identities, scope frames and event records
//! - [`processor`]: The sink contract events are delivered to

pub mod model;
pub mod processor;
pub mod severity;

pub use model::{
    execution_path, full_execution_path, CoreEvent, Effectuation, ExecutionEvent,
    ExecutionInfoFormat, StepId,
};
pub use processor::ExecutionEventProcessor;
pub use severity::InfoType;
