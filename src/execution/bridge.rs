//! Asynchronous Execution
//!
//! Async counterparts of the engine operations, and [`AsyncExecution`], a
//! cloneable handle that serializes whole operations against one engine.
//!
//! Work passed to the async operations receives the engine itself and
//! returns a boxed future borrowing it, the same shape as a database
//! transaction callback:
//!
//! ```
//! use std::sync::Arc;
//! use stepwise::sink::CollectingEventProcessor;
//! use stepwise::{step_id, AsyncExecution, Execution, InfoType, StepId};
//!
//! const FETCH: StepId = step_id!("fetch()");
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let processor = Arc::new(CollectingEventProcessor::new("app"));
//! let execution = AsyncExecution::new(Execution::new(processor.clone()));
//!
//! execution
//!     .effectuate(None, &FETCH, |execution| {
//!         Box::pin(async move {
//!             execution.log(InfoType::Info, "fetching", None);
//!         })
//!     })
//!     .await;
//! # }
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::ProcessorError;
use crate::event::{CoreEvent, Effectuation, InfoType, StepId};
use crate::localization::MultiLanguageText;

use super::engine::{infallible, Execution, ScopeGuard};
use super::logging::Message;
use super::state::ExecutionState;

/// Wraps infallible async work for the `try_*_async` operations.
fn lift<T, F>(
    work: F,
) -> impl for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, Infallible>>
where
    T: Send + 'static,
    F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
{
    move |execution| {
        let future = work(execution);
        Box::pin(async move { Ok(future.await) })
    }
}

impl Execution {
    async fn execute_async<T, E, F>(
        &mut self,
        step: Option<(&StepId, Option<&str>)>,
        force: bool,
        appease_to: Option<InfoType>,
        work: F,
    ) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        let mut guard = ScopeGuard::enter(self, step, force, appease_to);
        work(&mut *guard).await
    }

    async fn run_part_async<T, E, F>(
        &mut self,
        frame: Effectuation,
        begin: CoreEvent,
        end: CoreEvent,
        force: Option<bool>,
        work: F,
    ) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        let structural_id = uuid::Uuid::now_v7();
        self.emit(begin, Some(structural_id));
        let result = {
            let mut guard = ScopeGuard::new(self);
            guard.push_frame(frame);
            match force {
                Some(force) => guard.execute_async(None, force, None, work).await,
                None => work(&mut *guard).await,
            }
        };
        let value = result?;
        self.emit(end, Some(structural_id));
        Ok(value)
    }

    /// Async [`effectuate`](Execution::effectuate).
    pub async fn effectuate_async<T, F>(
        &mut self,
        description: Option<&str>,
        step: &StepId,
        work: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_effectuate_async(description, step, lift(work)).await)
    }

    /// Async [`try_effectuate`](Execution::try_effectuate).
    pub async fn try_effectuate_async<T, E, F>(
        &mut self,
        description: Option<&str>,
        step: &StepId,
        work: F,
    ) -> Result<Option<T>, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        let Some(run) = self.effectuate_test(step, description) else {
            return Ok(None);
        };
        let value = self
            .execute_async(Some((step, description)), false, None, work)
            .await?;
        self.after(step, description, run);
        Ok(Some(value))
    }

    /// Async [`force`](Execution::force).
    pub async fn force_async<T, F>(&mut self, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_force_async(lift(work)).await)
    }

    pub async fn try_force_async<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        self.run_part_async(
            Effectuation::Forcing,
            CoreEvent::BeginningForcingSteps,
            CoreEvent::EndingForcingSteps,
            Some(true),
            work,
        )
        .await
    }

    /// Async [`disremember`](Execution::disremember).
    pub async fn disremember_async<T, F>(&mut self, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_disremember_async(lift(work)).await)
    }

    pub async fn try_disremember_async<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        let remembered = self.executed_steps.clone();
        let result = self.execute_async(None, false, None, work).await;
        self.executed_steps = remembered;
        result
    }

    /// Async [`inherit_forced`](Execution::inherit_forced).
    pub async fn inherit_forced_async<T, F>(&mut self, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_inherit_forced_async(lift(work)).await)
    }

    pub async fn try_inherit_forced_async<T, E, F>(&mut self, work: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        let forced = self.is_forced();
        self.execute_async(None, forced, None, work).await
    }

    /// Async [`optional`](Execution::optional).
    pub async fn optional_async<T, F>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_optional_async(name, description, lift(work)).await)
    }

    pub async fn try_optional_async<T, E, F>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: F,
    ) -> Result<Option<T>, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
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
        self.run_part_async(
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
            Some(false),
            work,
        )
        .await
        .map(Some)
    }

    /// Async [`dispensable`](Execution::dispensable).
    pub async fn dispensable_async<T, F>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_dispensable_async(name, description, lift(work)).await)
    }

    pub async fn try_dispensable_async<T, E, F>(
        &mut self,
        name: &str,
        description: Option<&str>,
        work: F,
    ) -> Result<Option<T>, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
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
        self.run_part_async(
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
            Some(false),
            work,
        )
        .await
        .map(Some)
    }

    /// Async [`appease`](Execution::appease).
    pub async fn appease_async<T, F>(&mut self, to: InfoType, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_appease_async(to, lift(work)).await)
    }

    pub async fn try_appease_async<T, E, F>(&mut self, to: InfoType, work: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        self.execute_async(None, false, Some(to), work).await
    }

    /// Async [`doing`](Execution::doing).
    pub async fn doing_async<T, F>(&mut self, description: &str, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        infallible(self.try_doing_async(description, lift(work)).await)
    }

    pub async fn try_doing_async<T, E, F>(&mut self, description: &str, work: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        self.run_part_async(
            Effectuation::DescribedPart {
                description: description.to_string(),
            },
            CoreEvent::BeginningDescribedPart {
                description: description.to_string(),
            },
            CoreEvent::EndingDescribedPart {
                description: description.to_string(),
            },
            None,
            work,
        )
        .await
    }
}

/// A shareable handle running operations on one engine, one at a time.
///
/// Each operation holds the engine for its whole duration, nested work
/// included; nested work uses the `*_async` operations of the
/// [`Execution`] it is handed. Independent branches should use their own
/// handle, e.g. from [`ExecutionState::fork_async`].
#[derive(Clone)]
pub struct AsyncExecution {
    execution: Arc<Mutex<Execution>>,
}

impl AsyncExecution {
    pub fn new(execution: Execution) -> Self {
        Self {
            execution: Arc::new(Mutex::new(execution)),
        }
    }

    /// Builds a handle around an engine reconstructed from `state`.
    pub fn from_state(state: ExecutionState) -> Self {
        Self::new(Execution::from_state(state))
    }

    /// Captures the engine's current state.
    pub async fn state(&self) -> ExecutionState {
        self.execution.lock().await.state()
    }

    pub async fn level(&self) -> usize {
        self.execution.lock().await.level()
    }

    pub async fn execution_path(&self) -> String {
        self.execution.lock().await.execution_path()
    }

    pub async fn stopped(&self) -> bool {
        self.execution.lock().await.stopped()
    }

    pub async fn metadata_info(&self) -> String {
        self.execution.lock().await.metadata_info().to_string()
    }

    pub async fn metadata_info_for_user_interaction(&self) -> String {
        self.execution
            .lock()
            .await
            .metadata_info_for_user_interaction()
            .to_string()
    }

    pub async fn close_event_processing(&self) -> Result<(), ProcessorError> {
        self.execution.lock().await.close_event_processing()
    }

    /// Replaces the pause hook.
    pub async fn set_pause_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.execution.lock().await.set_pause_hook(hook);
    }

    pub async fn stop(&self, reason: &str) {
        self.execution.lock().await.stop(reason);
    }

    pub async fn log(&self, severity: InfoType, message: &str, position: Option<&str>) {
        self.execution.lock().await.log(severity, message, position);
    }

    pub async fn log_text(
        &self,
        severity: InfoType,
        text: &MultiLanguageText,
        position: Option<&str>,
    ) {
        self.execution.lock().await.log_text(severity, text, position);
    }

    pub async fn log_message(&self, message: &Message, position: Option<&str>, arguments: &[&str]) {
        self.execution
            .lock()
            .await
            .log_message(message, position, arguments);
    }

    /// Runs synchronous step code against a plain engine carrying this
    /// handle's configuration and state; executed steps and the stopped
    /// flag are taken over afterwards.
    pub async fn synchronous<T>(&self, work: impl FnOnce(&mut Execution) -> T) -> T {
        self.execution.lock().await.synchronous(work)
    }

    pub async fn effectuate<T, F>(
        &self,
        description: Option<&str>,
        step: &StepId,
        work: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.effectuate_async(description, step, work).await
    }

    pub async fn try_effectuate<T, E, F>(
        &self,
        description: Option<&str>,
        step: &StepId,
        work: F,
    ) -> Result<Option<T>, E>
    where
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, Result<T, E>>,
    {
        let mut execution = self.execution.lock().await;
        execution.try_effectuate_async(description, step, work).await
    }

    pub async fn force<T, F>(&self, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.force_async(work).await
    }

    pub async fn disremember<T, F>(&self, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.disremember_async(work).await
    }

    pub async fn inherit_forced<T, F>(&self, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.inherit_forced_async(work).await
    }

    pub async fn optional<T, F>(&self, name: &str, description: Option<&str>, work: F) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.optional_async(name, description, work).await
    }

    pub async fn dispensable<T, F>(
        &self,
        name: &str,
        description: Option<&str>,
        work: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.dispensable_async(name, description, work).await
    }

    pub async fn appease<T, F>(&self, to: InfoType, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.appease_async(to, work).await
    }

    pub async fn doing<T, F>(&self, description: &str, work: F) -> T
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut Execution) -> BoxFuture<'a, T>,
    {
        let mut execution = self.execution.lock().await;
        execution.doing_async(description, work).await
    }
}
