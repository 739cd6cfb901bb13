use std::sync::Arc;

use stepwise::sink::CollectingEventProcessor;
use stepwise::{step_id, AsyncExecution, Execution, ExecutionInfoFormat, InfoType, StepId};

const FETCH: StepId = step_id!("fetch()");
const PARSE: StepId = step_id!("parse()");

fn collecting() -> Arc<CollectingEventProcessor> {
    Arc::new(CollectingEventProcessor::with_format(
        "bridge",
        ExecutionInfoFormat::bare_indented(),
    ))
}

fn parse(execution: &mut Execution) -> Option<usize> {
    execution.effectuate(None, &PARSE, |execution| execution.level())
}

#[tokio::test]
async fn test_async_steps_call_synchronous_code() {
    let processor = collecting();
    let execution = AsyncExecution::new(Execution::new(processor.clone()));

    let level = execution
        .effectuate(None, &FETCH, |execution| {
            Box::pin(async move {
                tokio::task::yield_now().await;
                execution.synchronous(parse)
            })
        })
        .await;
    assert_eq!(level, Some(Some(2)));

    // parse() is remembered by the async handle
    assert_eq!(execution.synchronous(parse).await, None);
    processor.wait();
    assert_eq!(
        processor.lines(),
        vec![
            "beginning step fetch()@bridge",
            "    beginning step parse()@bridge",
            "    ending step parse()@bridge",
            "ending step fetch()@bridge",
            "skipping previously executed step parse()@bridge",
        ]
    );
}

#[tokio::test]
async fn test_async_forks_are_independent() {
    let processor = collecting();
    let state = Execution::new(processor.clone()).state();

    let branches: Vec<_> = (0..3)
        .map(|_| {
            let branch = state.fork_async();
            tokio::spawn(async move {
                branch
                    .synchronous(|execution| execution.effectuate(None, &FETCH, |_| ()))
                    .await
            })
        })
        .collect();

    for branch in branches {
        assert_eq!(branch.await.ok(), Some(Some(())));
    }
}

#[tokio::test]
async fn test_async_fatal_stop() {
    let processor = collecting();
    let execution = AsyncExecution::new(Execution::new(processor.clone()));

    execution.log(InfoType::Deadly, "out of disk", None).await;
    let fetched = execution
        .effectuate(None, &FETCH, |_| Box::pin(async { 1 }))
        .await;

    assert!(execution.stopped().await);
    assert_eq!(fetched, None);
    assert_eq!(processor.severity(), Some(InfoType::Deadly));
    assert!(execution.close_event_processing().await.is_ok());
}
