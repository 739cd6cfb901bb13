//! Execution Module
//!
//! The execution-state engine and everything built directly on it.
//!
//! # Architecture
//!
//! - [`engine`]: The synchronous engine and its scope operations
//! - [`logging`]: Message logging with appeasement and fatal stops
//! - [`bridge`]: Async operations and the serialized [`AsyncExecution`] handle
//! - [`state`]: Snapshots, forks and parallel branches

pub mod bridge;
pub mod engine;
pub mod logging;
pub mod state;

pub use bridge::AsyncExecution;
pub use engine::{Execution, PauseHook};
pub use logging::Message;
pub use state::ExecutionState;
