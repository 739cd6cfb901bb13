use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use stepwise::sink::CollectingEventProcessor;
use stepwise::{step_id, Execution, ExecutionInfoFormat, InfoType, StepId};

const PREPARE: StepId = step_id!("prepare()");
const TRANSFORM: StepId = step_id!("transform(item)");
const REPORT: StepId = step_id!("report()");

fn collecting() -> Arc<CollectingEventProcessor> {
    Arc::new(CollectingEventProcessor::with_format(
        "integration",
        ExecutionInfoFormat::bare_indented(),
    ))
}

fn prepare(execution: &mut Execution, runs: &AtomicUsize) {
    execution.effectuate(Some("preparing"), &PREPARE, |_| {
        runs.fetch_add(1, Ordering::SeqCst);
    });
}

#[test]
fn test_shared_dependency_runs_once() {
    let processor = collecting();
    let mut execution = Execution::new(processor.clone());
    let runs = AtomicUsize::new(0);

    execution.effectuate(None, &TRANSFORM, |execution| prepare(execution, &runs));
    execution.effectuate(None, &REPORT, |execution| prepare(execution, &runs));

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    processor.wait();
    let skips = processor
        .lines()
        .iter()
        .filter(|line| line.contains("skipping previously executed step prepare()"))
        .count();
    assert_eq!(skips, 1);
}

#[test]
fn test_forced_block_reruns_dependency() {
    let mut execution = Execution::new(collecting());
    let runs = AtomicUsize::new(0);

    prepare(&mut execution, &runs);
    execution.force(|execution| prepare(execution, &runs));
    prepare(&mut execution, &runs);

    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_fatal_message_stops_remaining_steps() {
    let processor = collecting();
    let mut execution = Execution::new(processor.clone());
    let runs = AtomicUsize::new(0);

    execution.effectuate(None, &TRANSFORM, |execution| {
        execution.log(InfoType::Fatal, "input is corrupt", Some("line 7"));
    });
    prepare(&mut execution, &runs);

    assert!(execution.stopped());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    processor.wait();
    assert_eq!(
        processor.lines(),
        vec![
            "beginning step transform(item)@execution",
            "    input is corrupt @ line 7",
            "    stopping execution: fatal error occurred",
            "stopped step transform(item)@execution",
            "skipping in an stopped environment step prepare()@execution (preparing)",
        ]
    );
}

#[test]
fn test_forks_detect_steps_independently() {
    let processor = collecting();
    let state = Execution::new(processor.clone()).state();

    thread::scope(|scope| {
        for _ in 0..2 {
            let mut branch = state.fork();
            scope.spawn(move || {
                branch.effectuate(None, &PREPARE, |_| ());
            });
        }
    });

    processor.wait();
    let lines = processor.lines();
    let begins = lines
        .iter()
        .filter(|line| line.starts_with("beginning step prepare()"))
        .count();
    assert_eq!(begins, 2);
    assert!(!lines.iter().any(|line| line.contains("skipping")));
}

#[test]
fn test_run_in_parallel_forks_per_item() {
    let processor = collecting();
    let mut execution = Execution::new(processor.clone());
    execution.effectuate(None, &PREPARE, |_| ());

    let state = execution.state();
    let results = state.run_in_parallel(vec!["a", "b", "c", "d"], 2, |branch, item| {
        let prepared = branch.effectuate(None, &PREPARE, |_| ()).is_some();
        let transformed = branch.effectuate(Some(item), &TRANSFORM, |_| item.to_uppercase());
        (prepared, transformed)
    });

    assert_eq!(
        results,
        vec![
            (false, Some("A".to_string())),
            (false, Some("B".to_string())),
            (false, Some("C".to_string())),
            (false, Some("D".to_string())),
        ]
    );
    // the branches never touch the original engine
    assert!(!execution.has_executed(&TRANSFORM));
}

#[test]
fn test_stop_in_branch_does_not_affect_others() {
    let state = Execution::new(collecting()).state();
    let results = state.run_in_parallel(vec![true, false], 2, |branch, stop| {
        if stop {
            branch.stop("only here");
        }
        branch.effectuate(None, &REPORT, |_| ()).is_some()
    });
    assert_eq!(results, vec![false, true]);
}
