//! Parallel execution of planned runs.
//!
//! Runs are taken from a queue in planned order by up to `max_parallel`
//! worker threads. Each run is admitted through the gate right before it
//! starts and released when it ends. With a lease ledger attached to the
//! gate, a watcher thread polls it for takeovers by other processes. The
//! same watcher cancels everything once the gate's interrupt flag is set.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use super::coordinator::RunCoordinator;
use super::events::{EventSink, RunEvent};
use super::gate::{Admission, ConcurrencyGate};
use super::run::{Run, RunResult};

/// How often the lease watcher checks the ledger.
pub const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often the watcher checks for an interrupt.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Execute `runs`, at most `max_parallel` at a time.
///
/// Results are returned in planned order.
pub fn run_all(
    runs: Vec<Run>,
    coordinator: &RunCoordinator,
    gate: &ConcurrencyGate,
    max_parallel: usize,
    sink: &dyn EventSink,
) -> Vec<RunResult> {
    let total = runs.len();
    let workers = max_parallel.max(1).min(total.max(1));
    let queue: Mutex<VecDeque<(usize, Run)>> = Mutex::new(runs.into_iter().enumerate().collect());
    let results: Mutex<Vec<Option<RunResult>>> = Mutex::new(vec![None; total]);
    let done = AtomicBool::new(false);

    debug!(runs = total, workers, "Executing runs");

    thread::scope(|scope| {
        let watcher = scope.spawn(|| {
            let mut last_lease_poll: Option<Instant> = None;
            while !done.load(Ordering::SeqCst) {
                gate.poll_interrupt();
                if last_lease_poll.map_or(true, |t| t.elapsed() >= LEASE_POLL_INTERVAL) {
                    gate.poll_leases();
                    last_lease_poll = Some(Instant::now());
                }
                thread::park_timeout(INTERRUPT_POLL_INTERVAL);
            }
        });

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| loop {
                    // Admit while holding the queue so admission follows planned order.
                    let next = queue.lock().ok().and_then(|mut q| {
                        q.pop_front().map(|(index, run)| {
                            let ticket = gate.admit(&run);
                            (index, run, ticket)
                        })
                    });
                    let Some((index, run, ticket)) = next else {
                        break;
                    };

                    if let Admission::Supersede(previous) = &ticket.admission {
                        sink.emit(RunEvent::RunSuperseded {
                            run_id: run.id.clone(),
                            previous: previous.clone(),
                        });
                    }

                    let result = coordinator.execute(&run, &ticket.token, sink);
                    gate.complete(&run.id, &run.group);

                    if let Ok(mut results) = results.lock() {
                        results[index] = Some(result);
                    }
                })
            })
            .collect();

        for handle in handles {
            let _ = handle.join();
        }
        done.store(true, Ordering::SeqCst);
        watcher.thread().unpark();
    });

    results
        .into_inner()
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::events::{NullSink, RecordingSink};
    use crate::runner::run::{GroupKey, RunId, RunParameters, RunStatus, TriggerEvent};
    use crate::steps::{FileCommentSink, ResolvedStep};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn coordinator(temp: &TempDir) -> RunCoordinator {
        let comments = Arc::new(FileCommentSink::new(
            temp.path().join("comments"),
            &temp.path().join("state"),
        ));
        RunCoordinator::new(temp.path(), temp.path().join("artifacts"), comments)
    }

    fn run(group: &str, command: &str) -> Run {
        Run {
            id: RunId::new(),
            workflow: "ci".to_string(),
            job: "test".to_string(),
            label: group.to_string(),
            event: TriggerEvent::push("dev"),
            params: RunParameters::default(),
            group: GroupKey::new("ci-dev", "test", group),
            steps: vec![ResolvedStep::shell("step", command)],
            env: HashMap::new(),
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn results_keep_planned_order() {
        let temp = TempDir::new().unwrap();
        let runs = vec![run("a", "sleep 0.3"), run("b", "true"), run("c", "exit 1")];
        let ids: Vec<_> = runs.iter().map(|r| r.id.clone()).collect();

        let results = run_all(runs, &coordinator(&temp), &ConcurrencyGate::new(), 3, &NullSink);

        let result_ids: Vec<_> = results.iter().map(|r| r.run_id.clone()).collect();
        assert_eq!(result_ids, ids);
        assert_eq!(results[2].status, RunStatus::Failed);
    }

    #[test]
    fn runs_execute_concurrently() {
        let temp = TempDir::new().unwrap();
        let runs = (0..4).map(|i| run(&i.to_string(), "sleep 0.5")).collect();

        let start = Instant::now();
        let results = run_all(runs, &coordinator(&temp), &ConcurrencyGate::new(), 4, &NullSink);

        assert_eq!(results.len(), 4);
        assert!(start.elapsed() < Duration::from_millis(1800));
    }

    #[test]
    fn same_group_later_run_supersedes_earlier() {
        let temp = TempDir::new().unwrap();
        let runs = vec![run("same", "sleep 5"), run("same", "sleep 0.3")];
        let sink = RecordingSink::new();

        let start = Instant::now();
        let results = run_all(runs, &coordinator(&temp), &ConcurrencyGate::new(), 2, &sink);

        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(results[0].status, RunStatus::Cancelled);
        assert_eq!(results[1].status, RunStatus::Succeeded);
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, RunEvent::RunSuperseded { .. })));
    }

    #[test]
    fn empty_plan_is_fine() {
        let temp = TempDir::new().unwrap();
        let results = run_all(Vec::new(), &coordinator(&temp), &ConcurrencyGate::new(), 4, &NullSink);
        assert!(results.is_empty());
    }

    #[test]
    fn interrupt_cancels_running_and_queued_runs() {
        static INTERRUPT: AtomicBool = AtomicBool::new(false);
        let temp = TempDir::new().unwrap();
        let gate = ConcurrencyGate::new().with_interrupt(&INTERRUPT);
        let runs = vec![run("a", "sleep 5"), run("b", "sleep 5"), run("c", "sleep 5")];

        let start = Instant::now();
        let results = thread::scope(|scope| {
            scope.spawn(|| {
                thread::sleep(Duration::from_millis(300));
                INTERRUPT.store(true, Ordering::SeqCst);
            });
            run_all(runs, &coordinator(&temp), &gate, 2, &NullSink)
        });

        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.status == RunStatus::Cancelled));
        assert!(gate.is_interrupted());
        assert_eq!(gate.active_count(), 0);
    }
}
