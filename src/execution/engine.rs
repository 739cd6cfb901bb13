//! Execution Engine
//!
//! The single-threaded state machine behind every pipeline run:
//! - Run-once memoization of steps, with forced re-execution
//! - The nested effectuation stack used for levels and execution paths
//! - Optional and dispensable parts, described blocks
//! - Cooperative stopping and pausing
//!
//! Every operation pushes its frames through a [`ScopeGuard`], so the
//! effectuation, force and appeasement stacks are restored on every exit
//! path: normal return, returned error, or unwinding panic.

use std::collections::HashSet;
use std::convert::Infallible;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::error::ProcessorError;
use crate::event::{
    execution_path, CoreEvent, Effectuation, ExecutionEvent, ExecutionEventProcessor, InfoType,
    StepId,
};
use crate::localization::Language;

/// Called at the start of every step, part and forcing block. May block
/// the calling thread while the execution is paused.
pub type PauseHook = Arc<dyn Fn() + Send + Sync>;

/// Manages the execution of steps. In particular it
/// - prevents double execution of steps
/// - keeps the nesting information used for logging
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use stepwise::sink::CollectingEventProcessor;
/// use stepwise::{step_id, Execution, StepId};
///
/// const PREPARE: StepId = step_id!("prepare()");
///
/// fn prepare(execution: &mut Execution) {
///     execution.effectuate(Some("preparing"), &PREPARE, |_| {
///         // the actual work
///     });
/// }
///
/// let processor = Arc::new(CollectingEventProcessor::new("app"));
/// let mut execution = Execution::new(processor.clone());
/// prepare(&mut execution);
/// prepare(&mut execution); // skipped, already executed
/// processor.wait();
/// assert_eq!(processor.lines().len(), 3);
/// ```
pub struct Execution {
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

/// Outcome of the run-or-skip decision for a step that is to run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepRun {
    pub(crate) forced: bool,
    pub(crate) structural_id: Uuid,
    pub(crate) started: Instant,
}

impl Execution {
    /// Creates an execution with the default configuration: English,
    /// stopping at fatal errors, no activated options, nothing dispensed
    /// with and no pause hook.
    pub fn new(processor: Arc<dyn ExecutionEventProcessor>) -> Self {
        Self {
            language: Language::default(),
            processor,
            stop_at_fatal_error: true,
            activated_options: None,
            dispensed_with: None,
            executed_steps: HashSet::new(),
            effectuation_stack: Vec::new(),
            pause_hook: None,
            force_values: Vec::new(),
            appease_types: Vec::new(),
            stopped: false,
        }
    }

    /// Creates an execution from a loaded configuration.
    pub fn from_config(
        config: &ExecutionConfig,
        processor: Arc<dyn ExecutionEventProcessor>,
    ) -> Self {
        let mut execution = Self::new(processor)
            .with_language(config.language)
            .stopping_at_fatal_error(config.stop_at_fatal_error);
        execution.activated_options = config.activated_options.clone();
        execution.dispensed_with = config.dispensed_with.clone();
        execution
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn stopping_at_fatal_error(mut self, stop_at_fatal_error: bool) -> Self {
        self.stop_at_fatal_error = stop_at_fatal_error;
        self
    }

    /// Activates optional parts by name.
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activated_options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Names the dispensable (and optional) parts to skip.
    pub fn dispensing_with<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dispensed_with = Some(parts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pause_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.set_pause_hook(hook);
        self
    }

    /// Replaces the pause hook.
    pub fn set_pause_hook(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.pause_hook = Some(Arc::new(hook));
    }

    /// A fresh execution for a parallel branch.
    ///
    /// Shares the configuration and starts with the current executed steps
    /// and stopped flag, but is unnested and has its own state from now on.
    pub fn parallel(&self) -> Execution {
        let mut execution = self.with_same_configuration();
        execution.executed_steps = self.executed_steps.clone();
        execution.stopped = self.stopped;
        execution
    }

    /// An execution with this configuration and no state at all.
    pub(crate) fn with_same_configuration(&self) -> Execution {
        Execution {
            language: self.language,
            processor: Arc::clone(&self.processor),
            stop_at_fatal_error: self.stop_at_fatal_error,
            activated_options: self.activated_options.clone(),
            dispensed_with: self.dispensed_with.clone(),
            executed_steps: HashSet::new(),
            effectuation_stack: Vec::new(),
            pause_hook: self.pause_hook.clone(),
            force_values: Vec::new(),
            appease_types: Vec::new(),
            stopped: false,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn stop_at_fatal_error(&self) -> bool {
        self.stop_at_fatal_error
    }

    /// The current nesting depth.
    pub fn level(&self) -> usize {
        self.effectuation_stack.len()
    }

    pub fn effectuation_stack(&self) -> &[Effectuation] {
        &self.effectuation_stack
    }

    /// The current stack rendered as `step a -> step b`.
    pub fn execution_path(&self) -> String {
        execution_path(&self.effectuation_stack)
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Returns true if `step` is marked as executed.
    pub fn has_executed(&self, step: &StepId) -> bool {
        self.executed_steps.contains(step)
    }

    /// Returns true if the nearest enclosing force context forces.
    pub fn is_forced(&self) -> bool {
        self.force_values.last() == Some(&true)
    }

    pub fn metadata_info(&self) -> &str {
        self.processor.metadata_info()
    }

    pub fn metadata_info_for_user_interaction(&self) -> &str {
        self.processor.metadata_info_for_user_interaction()
    }

    /// Closes the event processor.
    pub fn close_event_processing(&self) -> Result<(), ProcessorError> {
        self.processor.close_event_processing()
    }

    /// Stops the execution. Steps not yet started will be skipped from now
    /// on; this cannot be undone.
    pub fn stop(&mut self, reason: &str) {
        info!("Stopping execution: {}", reason);
        self.emit(
            CoreEvent::StoppingExecution {
                reason: reason.to_string(),
            },
            None,
        );
        self.stopped = true;
    }

    pub(crate) fn emit(&self, core_event: CoreEvent, structural_id: Option<Uuid>) {
        self.emit_event(self.event(InfoType::Progress, core_event, structural_id));
    }

    pub(crate) fn event(
        &self,
        severity: InfoType,
        core_event: CoreEvent,
        structural_id: Option<Uuid>,
    ) -> ExecutionEvent {
        ExecutionEvent::new(
            severity,
            self.level(),
            structural_id,
            core_event,
            self.effectuation_stack.clone(),
        )
    }

    pub(crate) fn emit_event(&self, event: ExecutionEvent) {
        self.processor.process(event);
    }

    pub(crate) fn wait_not_paused(&self) {
        if let Some(hook) = &self.pause_hook {
            hook();
        }
    }

    /// Runs `work` with the force value, the optional appeasement ceiling
    /// and the optional step frame pushed.
    fn execute<T, E>(
        &mut self,
        step: Option<(&StepId, Option<&str>)>,
        force: bool,
        appease_to: Option<InfoType>,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = ScopeGuard::enter(self, step, force, appease_to);
        work(&mut *guard)
    }

    /// Emits the begin event for a part, runs it with its frame pushed and
    /// emits the end event once it returned successfully.
    fn run_part<T, E>(
        &mut self,
        frame: Effectuation,
        begin: CoreEvent,
        end: CoreEvent,
        body: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<T, E> {
        let structural_id = Uuid::now_v7();
        self.emit(begin, Some(structural_id));
        let result = {
            let mut guard = ScopeGuard::new(self);
            guard.push_frame(frame);
            body(&mut *guard)
        };
        let value = result?;
        self.emit(end, Some(structural_id));
        Ok(value)
    }

    /// Forces all contained steps to run, even if executed before.
    pub fn force<T>(&mut self, work: impl FnOnce(&mut Execution) -> T) -> T {
        infallible(self.try_force(|execution| Ok(work(execution))))
    }

    pub fn try_force<T, E>(
        &mut self,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<T, E> {
        self.run_part(
            Effectuation::Forcing,
            CoreEvent::BeginningForcingSteps,
            CoreEvent::EndingForcingSteps,
            |execution| execution.execute(None, true, None, work),
        )
    }

    /// Runs `work`, then forgets which steps were executed during it.
    pub fn disremember<T>(&mut self, work: impl FnOnce(&mut Execution) -> T) -> T {
        infallible(self.try_disremember(|execution| Ok(work(execution))))
    }

    pub fn try_disremember<T, E>(
        &mut self,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<T, E> {
        let remembered = self.executed_steps.clone();
        let result = self.execute(None, false, None, work);
        self.executed_steps = remembered;
        result
    }

    /// Runs `work` forced if the enclosing context is forced, without
    /// opening a new scope.
    pub fn inherit_forced<T>(&mut self, work: impl FnOnce(&mut Execution) -> T) -> T {
        infallible(self.try_inherit_forced(|execution| Ok(work(execution))))
    }

    pub fn try_inherit_forced<T, E>(
        &mut self,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<T, E> {
        let forced = self.is_forced();
        self.execute(None, forced, None, work)
    }

    pub(crate) fn is_activated(&self, name: &str) -> bool {
        self.activated_options
            .as_ref()
            .is_some_and(|options| options.contains(name))
    }

    pub(crate) fn is_dispensed(&self, name: &str) -> bool {
        self.dispensed_with
            .as_ref()
            .is_some_and(|parts| parts.contains(name))
    }

    /// A part that only runs if activated (and not dispensed with).
    /// Names should carry the module name as prefix.
    pub fn optional<T>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: impl FnOnce(&mut Execution) -> T,
    ) -> Option<T> {
        infallible(self.try_optional(name, description, |execution| Ok(work(execution))))
    }

    pub fn try_optional<T, E>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<Option<T>, E> {
        let description = description.map(str::to_string);
        if !self.is_activated(name) || self.is_dispensed(name) {
            self.emit(
                CoreEvent::SkippingOptionalPart {
                    name: name.to_string(),
                    description,
                },
                None,
            );
            return Ok(None);
        }
        self.run_part(
            Effectuation::OptionalPart {
                name: name.to_string(),
                description: description.clone(),
            },
            CoreEvent::BeginningOptionalPart {
                name: name.to_string(),
                description: description.clone(),
            },
            CoreEvent::EndingOptionalPart {
                name: name.to_string(),
                description,
            },
            |execution| execution.execute(None, false, None, work),
        )
        .map(Some)
    }

    /// A part that runs unless dispensed with.
    /// Names should carry the module name as prefix.
    pub fn dispensable<T>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: impl FnOnce(&mut Execution) -> T,
    ) -> Option<T> {
        infallible(self.try_dispensable(name, description, |execution| Ok(work(execution))))
    }

    pub fn try_dispensable<T, E>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<Option<T>, E> {
        let description = description.map(str::to_string);
        if self.is_dispensed(name) {
            self.emit(
                CoreEvent::SkippingDispensablePart {
                    name: name.to_string(),
                    description,
                },
                None,
            );
            return Ok(None);
        }
        self.run_part(
            Effectuation::DispensablePart {
                name: name.to_string(),
                description: description.clone(),
            },
            CoreEvent::BeginningDispensablePart {
                name: name.to_string(),
                description: description.clone(),
            },
            CoreEvent::EndingDispensablePart {
                name: name.to_string(),
                description,
            },
            |execution| execution.execute(None, false, None, work),
        )
        .map(Some)
    }

    /// Messages logged inside `work` that are worse than `to` are logged
    /// as `to`, keeping their original severity in the event.
    pub fn appease<T>(&mut self, to: InfoType, work: impl FnOnce(&mut Execution) -> T) -> T {
        infallible(self.try_appease(to, |execution| Ok(work(execution))))
    }

    /// [`appease`](Execution::appease) to [`InfoType::Error`], so fatal
    /// messages inside `work` are logged as errors.
    pub fn appease_errors<T>(&mut self, work: impl FnOnce(&mut Execution) -> T) -> T {
        self.appease(InfoType::Error, work)
    }

    pub fn try_appease<T, E>(
        &mut self,
        to: InfoType,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<T, E> {
        self.execute(None, false, Some(to), work)
    }

    /// A described block of work that is not a step; always runs.
    pub fn doing<T>(&mut self, description: &str, work: impl FnOnce(&mut Execution) -> T) -> T {
        infallible(self.try_doing(description, |execution| Ok(work(execution))))
    }

    pub fn try_doing<T, E>(
        &mut self,
        description: &str,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<T, E> {
        self.run_part(
            Effectuation::DescribedPart {
                description: description.to_string(),
            },
            CoreEvent::BeginningDescribedPart {
                description: description.to_string(),
            },
            CoreEvent::EndingDescribedPart {
                description: description.to_string(),
            },
            work,
        )
    }

    /// Decides whether `step` runs, emitting the begin or skip event.
    pub(crate) fn effectuate_test(
        &mut self,
        step: &StepId,
        description: Option<&str>,
    ) -> Option<StepRun> {
        let id = step.clone();
        let description = description.map(str::to_string);

        if self.stopped {
            self.emit(CoreEvent::SkippingStepInStoppedExecution { id, description }, None);
            return None;
        }

        let forced = if !self.executed_steps.contains(step) {
            self.executed_steps.insert(step.clone());
            false
        } else if self.is_forced() {
            true
        } else {
            self.emit(CoreEvent::SkippingPreviouslyExecutedStep { id, description }, None);
            return None;
        };

        let structural_id = Uuid::now_v7();
        self.emit(
            CoreEvent::BeginningStep {
                id,
                description,
                forced,
            },
            Some(structural_id),
        );
        Some(StepRun {
            forced,
            structural_id,
            started: Instant::now(),
        })
    }

    /// Emits the closing event of a step that ran.
    pub(crate) fn after(&mut self, step: &StepId, description: Option<&str>, run: StepRun) {
        let id = step.clone();
        let description = description.map(str::to_string);
        let core_event = if self.stopped {
            CoreEvent::StoppedStep { id, description }
        } else {
            CoreEvent::EndingStep {
                id,
                description,
                forced: run.forced,
            }
        };
        self.emit(core_event, Some(run.structural_id));
        debug!("Step {} finished after {:.2?}", step, run.started.elapsed());
    }

    /// Runs `work` as `step` unless the step already ran (and is not
    /// forced) or the execution is stopped. Returns `None` if skipped.
    pub fn effectuate<T>(
        &mut self,
        description: Option<&str>,
        step: &StepId,
        work: impl FnOnce(&mut Execution) -> T,
    ) -> Option<T> {
        infallible(self.try_effectuate(description, step, |execution| Ok(work(execution))))
    }

    /// Like [`effectuate`](Execution::effectuate) for fallible work.
    ///
    /// An error passes through unchanged. The step's frames are popped but
    /// no ending event is emitted for it.
    pub fn try_effectuate<T, E>(
        &mut self,
        description: Option<&str>,
        step: &StepId,
        work: impl FnOnce(&mut Execution) -> Result<T, E>,
    ) -> Result<Option<T>, E> {
        let Some(run) = self.effectuate_test(step, description) else {
            return Ok(None);
        };
        let value = self.execute(Some((step, description)), false, None, work)?;
        self.after(step, description, run);
        Ok(Some(value))
    }

    /// Runs `work` on a plain execution carrying this execution's
    /// configuration and state, then takes over its executed steps and
    /// stopped flag.
    pub fn synchronous<T>(&mut self, work: impl FnOnce(&mut Execution) -> T) -> T {
        let mut execution = self.with_same_configuration();
        execution.executed_steps = self.executed_steps.clone();
        execution.effectuation_stack = self.effectuation_stack.clone();
        execution.force_values = self.force_values.clone();
        execution.appease_types = self.appease_types.clone();
        execution.stopped = self.stopped;

        let result = work(&mut execution);

        self.executed_steps = execution.executed_steps;
        self.stopped = self.stopped || execution.stopped;
        result
    }
}

pub(crate) fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Frames pushed for one operation. Dropping the guard pops them again
/// in reverse order.
pub(crate) struct ScopeGuard<'a> {
    execution: &'a mut Execution,
    frame: bool,
    appeasement: bool,
    force: bool,
}

impl<'a> ScopeGuard<'a> {
    pub(crate) fn new(execution: &'a mut Execution) -> Self {
        Self {
            execution,
            frame: false,
            appeasement: false,
            force: false,
        }
    }

    /// Waits while paused, then pushes force, appeasement and step frame.
    pub(crate) fn enter(
        execution: &'a mut Execution,
        step: Option<(&StepId, Option<&str>)>,
        force: bool,
        appease_to: Option<InfoType>,
    ) -> Self {
        execution.wait_not_paused();
        let mut guard = Self::new(execution);
        guard.push_force(force);
        if let Some(ceiling) = appease_to {
            guard.push_appeasement(ceiling);
        }
        if let Some((step, description)) = step {
            guard.push_frame(Effectuation::Step {
                step: step.clone(),
                description: description.map(str::to_string),
            });
        }
        guard
    }

    pub(crate) fn push_frame(&mut self, frame: Effectuation) {
        debug_assert!(!self.frame);
        self.execution.effectuation_stack.push(frame);
        self.frame = true;
    }

    fn push_appeasement(&mut self, ceiling: InfoType) {
        self.execution.appease_types.push(ceiling);
        self.appeasement = true;
    }

    fn push_force(&mut self, force: bool) {
        self.execution.force_values.push(force);
        self.force = true;
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Execution;

    fn deref(&self) -> &Execution {
        self.execution
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Execution {
        self.execution
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if self.frame {
            self.execution.effectuation_stack.pop();
        }
        if self.appeasement {
            self.execution.appease_types.pop();
        }
        if self.force {
            self.execution.force_values.pop();
        }
    }
}
