//! Execution Snapshots
//!
//! [`ExecutionState`] is an immutable capture of an engine's configuration
//! and mutable state. Engines built from it start exactly where the
//! captured one was:
//! - resuming a saved state in a new engine
//! - forking independent branches for parallel work, each with its own
//!   copy of the executed steps

use std::collections::HashSet;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use log::{debug, warn};

use crate::event::{execution_path, Effectuation, ExecutionEventProcessor, InfoType, StepId};
use crate::localization::Language;

use super::bridge::AsyncExecution;
use super::engine::{Execution, PauseHook};

/// Everything needed to reconstruct an [`Execution`].
#[derive(Clone)]
pub struct ExecutionState {
    pub(crate) language: Language,
    pub(crate) processor: Arc<dyn ExecutionEventProcessor>,
    pub(crate) stop_at_fatal_error: bool,
    pub(crate) activated_options: Option<HashSet<String>>,
    pub(crate) dispensed_with: Option<HashSet<String>>,
    pub(crate) executed_steps: HashSet<StepId>,
    pub(crate) effectuation_stack: Vec<Effectuation>,
    pub(crate) pause_hook: Option<PauseHook>,
    pub(crate) force_values: Vec<bool>,
    pub(crate) appease_types: Vec<InfoType>,
    pub(crate) stopped: bool,
}

impl ExecutionState {
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn stop_at_fatal_error(&self) -> bool {
        self.stop_at_fatal_error
    }

    pub fn activated_options(&self) -> Option<&HashSet<String>> {
        self.activated_options.as_ref()
    }

    pub fn dispensed_with(&self) -> Option<&HashSet<String>> {
        self.dispensed_with.as_ref()
    }

    pub fn executed_steps(&self) -> &HashSet<StepId> {
        &self.executed_steps
    }

    pub fn effectuation_stack(&self) -> &[Effectuation] {
        &self.effectuation_stack
    }

    pub fn execution_path(&self) -> String {
        execution_path(&self.effectuation_stack)
    }

    pub fn force_values(&self) -> &[bool] {
        &self.force_values
    }

    pub fn appease_types(&self) -> &[InfoType] {
        &self.appease_types
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn has_pause_hook(&self) -> bool {
        self.pause_hook.is_some()
    }

    /// A new engine for an independent branch.
    pub fn fork(&self) -> Execution {
        Execution::from_state(self.clone())
    }

    /// A new async handle for an independent branch.
    pub fn fork_async(&self) -> AsyncExecution {
        AsyncExecution::from_state(self.clone())
    }

    /// Runs `worker` for every item, each on its own fork of this state,
    /// using at most `threads` threads. Results keep the order of `items`.
    ///
    /// A panicking worker propagates its panic once all threads ended.
    pub fn run_in_parallel<T, R, F>(&self, items: Vec<T>, threads: usize, worker: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(&mut Execution, T) -> R + Sync,
    {
        let count = items.len();
        let threads = threads.clamp(1, count.max(1));
        debug!("Running {} items on {} threads", count, threads);

        let queue = Mutex::new(items.into_iter().enumerate());
        let (tx, rx) = channel();

        thread::scope(|scope| {
            for _ in 0..threads {
                let tx = tx.clone();
                let queue = &queue;
                let worker = &worker;

                scope.spawn(move || loop {
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .next();
                    let Some((index, item)) = next else {
                        break;
                    };

                    let mut execution = self.fork();
                    let result = worker(&mut execution, item);

                    if tx.send((index, result)).is_err() {
                        warn!("Result receiver dropped, abandoning parallel work");
                        break;
                    }
                });
            }
        });
        drop(tx);

        let mut results: Vec<(usize, R)> = rx.into_iter().collect();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}

impl Execution {
    /// Captures the current configuration and state.
    pub fn state(&self) -> ExecutionState {
        ExecutionState {
            language: self.language,
            processor: Arc::clone(&self.processor),
            stop_at_fatal_error: self.stop_at_fatal_error,
            activated_options: self.activated_options.clone(),
            dispensed_with: self.dispensed_with.clone(),
            executed_steps: self.executed_steps.clone(),
            effectuation_stack: self.effectuation_stack.clone(),
            pause_hook: self.pause_hook.clone(),
            force_values: self.force_values.clone(),
            appease_types: self.appease_types.clone(),
            stopped: self.stopped,
        }
    }

    /// Reconstructs an engine from a captured state.
    pub fn from_state(state: ExecutionState) -> Self {
        Execution {
            language: state.language,
            processor: state.processor,
            stop_at_fatal_error: state.stop_at_fatal_error,
            activated_options: state.activated_options,
            dispensed_with: state.dispensed_with,
            executed_steps: state.executed_steps,
            effectuation_stack: state.effectuation_stack,
            pause_hook: state.pause_hook,
            force_values: state.force_values,
            appease_types: state.appease_types,
            stopped: state.stopped,
        }
    }
}

impl From<ExecutionState> for Execution {
    fn from(state: ExecutionState) -> Self {
        Execution::from_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ExecutionInfoFormat;
    use crate::sink::CollectingEventProcessor;

    const STEP_A: StepId = StepId::new("stepwise/state", "a()");
    const STEP_B: StepId = StepId::new("stepwise/state", "b()");

    fn processor() -> Arc<CollectingEventProcessor> {
        Arc::new(CollectingEventProcessor::with_format(
            "test",
            ExecutionInfoFormat::default(),
        ))
    }

    #[test]
    fn test_state_reproduces_engine() {
        let mut execution = Execution::new(processor())
            .with_language(Language::Fr)
            .with_options(["opt"])
            .with_pause_hook(|| ());
        execution.effectuate(None, &STEP_A, |_| ());

        execution.effectuate(Some("b"), &STEP_B, |execution| {
            execution.appease(InfoType::Warning, |execution| {
                let state = execution.state();
                assert_eq!(state.language(), Language::Fr);
                assert!(state.activated_options().is_some_and(|o| o.contains("opt")));
                assert!(state.executed_steps().contains(&STEP_A));
                assert_eq!(state.effectuation_stack().len(), 1);
                assert_eq!(state.appease_types(), &[InfoType::Warning]);
                assert!(state.has_pause_hook());

                let restored = Execution::from(state);
                assert_eq!(restored.level(), 1);
                assert_eq!(restored.execution_path(), execution.execution_path());
                assert!(restored.has_executed(&STEP_B));
            });
        });
    }

    #[test]
    fn test_stopped_flag_captured() {
        let mut execution = Execution::new(processor());
        execution.stop("done");
        let fork = execution.state().fork();
        assert!(fork.stopped());
    }

    #[test]
    fn test_forks_do_not_share_executed_steps() {
        let state = Execution::new(processor()).state();
        let mut first = state.fork();
        let mut second = state.fork();

        assert_eq!(first.effectuate(None, &STEP_A, |_| 1), Some(1));
        assert_eq!(second.effectuate(None, &STEP_A, |_| 2), Some(2));
        assert!(!state.executed_steps().contains(&STEP_A));
    }

    #[test]
    fn test_run_in_parallel_keeps_order() {
        let state = Execution::new(processor()).state();
        let results = state.run_in_parallel((0..20).collect(), 4, |execution, item: u32| {
            execution
                .effectuate(None, &STEP_A, |_| item * 2)
                .unwrap_or_default()
        });
        assert_eq!(results, (0..20).map(|item| item * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_run_in_parallel_no_items() {
        let state = Execution::new(processor()).state();
        let results: Vec<()> = state.run_in_parallel(Vec::<u8>::new(), 8, |_, _| ());
        assert!(results.is_empty());
    }
}
