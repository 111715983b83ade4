//! Concurrency gate: newer runs supersede older runs of the same group.
//!
//! The gate is a keyed registry `GroupKey -> ActiveRun`. Admitting a run
//! replaces whatever run held its group and cancels that run's token. The
//! registry mutex is the only mutation point.
//!
//! With a [`LeaseLedger`] attached, admission also claims the group in the
//! shared state directory, and [`ConcurrencyGate::poll_leases`] cancels
//! local runs whose lease was taken by another process.

use crate::state::LeaseLedger;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::run::{GroupKey, Run, RunId};

/// Outcome of admitting a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The group was free.
    Proceed,
    /// The run took over the group; the previous run was told to cancel.
    Supersede(String),
}

/// An admitted run's handle.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub admission: Admission,
    /// Cancelled when a newer run takes the group.
    pub token: CancelToken,
}

#[derive(Debug)]
struct ActiveRun {
    run_id: RunId,
    token: CancelToken,
}

/// Keyed registry of in-flight runs.
#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    active: Mutex<HashMap<GroupKey, ActiveRun>>,
    ledger: Option<LeaseLedger>,
    // Orders ledger claims like registry inserts without holding the registry.
    claims: Mutex<()>,
    interrupt: Option<&'static AtomicBool>,
    interrupted: AtomicBool,
}

impl ConcurrencyGate {
    /// An in-process gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate that also coordinates through `ledger`.
    pub fn with_ledger(ledger: LeaseLedger) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            ledger: Some(ledger),
            claims: Mutex::new(()),
            interrupt: None,
            interrupted: AtomicBool::new(false),
        }
    }

    /// Watch `flag`; once it is set, [`poll_interrupt`](Self::poll_interrupt)
    /// cancels every run.
    pub fn with_interrupt(mut self, flag: &'static AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<GroupKey, ActiveRun>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit `run`, superseding any run in flight for its group.
    ///
    /// After [`cancel_all`](Self::cancel_all) the returned token is
    /// already cancelled.
    pub fn admit(&self, run: &Run) -> Ticket {
        let token = CancelToken::new();
        let _claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());

        let previous = self.registry().insert(
            run.group.clone(),
            ActiveRun {
                run_id: run.id.clone(),
                token: token.clone(),
            },
        );

        let mut admission = match previous {
            Some(prev) => {
                prev.token.cancel();
                info!(
                    run_id = %run.id,
                    group = %run.group,
                    "Superseding run {}", prev.run_id
                );
                Admission::Supersede(prev.run_id.to_string())
            }
            None => Admission::Proceed,
        };

        if self.interrupted.load(Ordering::SeqCst) {
            token.cancel();
        }

        if let Some(ledger) = &self.ledger {
            match ledger.claim(run.group.as_str(), &run.id.to_string()) {
                Ok(Some(lease)) if admission == Admission::Proceed => {
                    info!(
                        run_id = %run.id,
                        group = %run.group,
                        "Superseding run {} of process {}", lease.run_id, lease.pid
                    );
                    admission = Admission::Supersede(lease.run_id);
                }
                Ok(_) => {}
                Err(e) => warn!(group = %run.group, "Cannot claim lease: {}", e),
            }
        }

        debug!(run_id = %run.id, group = %run.group, "Admitted");
        Ticket { admission, token }
    }

    /// Remove `run_id` from `group` if it still owns the group.
    ///
    /// Returns true if the entry was removed.
    pub fn complete(&self, run_id: &RunId, group: &GroupKey) -> bool {
        let owned = {
            let mut registry = self.registry();
            let owned = registry
                .get(group)
                .is_some_and(|active| &active.run_id == run_id);
            if owned {
                registry.remove(group);
            }
            owned
        };

        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.release(group.as_str(), &run_id.to_string()) {
                warn!(group = %group, "Cannot release lease: {}", e);
            }
        }

        owned
    }

    /// Run currently holding `group`.
    pub fn active_run(&self, group: &GroupKey) -> Option<RunId> {
        self.registry().get(group).map(|a| a.run_id.clone())
    }

    /// Number of groups with a run in flight.
    pub fn active_count(&self) -> usize {
        self.registry().len()
    }

    /// Cancel every run in flight and every run admitted from now on.
    ///
    /// Returns the number of runs cancelled. Entries stay registered until
    /// their runs complete.
    pub fn cancel_all(&self) -> usize {
        self.interrupted.store(true, Ordering::SeqCst);
        let registry = self.registry();
        for active in registry.values() {
            active.token.cancel();
        }
        registry.len()
    }

    /// Whether [`cancel_all`](Self::cancel_all) has been called.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Cancel everything once the watched interrupt flag is set.
    ///
    /// Returns true if the gate is interrupted.
    pub fn poll_interrupt(&self) -> bool {
        let requested = self.interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst));
        if requested && !self.is_interrupted() {
            let cancelled = self.cancel_all();
            warn!("Interrupted, cancelling {} active runs", cancelled);
        }
        self.is_interrupted()
    }

    /// Cancel local runs whose lease now belongs to another run.
    ///
    /// Returns `(cancelled run, new owner)` pairs. Without a ledger this
    /// does nothing.
    pub fn poll_leases(&self) -> Vec<(RunId, String)> {
        let Some(ledger) = &self.ledger else {
            return Vec::new();
        };

        // No admission may sit between its registry insert and its claim.
        let _claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        let leases = match ledger.snapshot() {
            Ok(leases) => leases,
            Err(e) => {
                warn!("Cannot read lease ledger: {}", e);
                return Vec::new();
            }
        };

        let mut registry = self.registry();
        let mut superseded = Vec::new();

        registry.retain(|group, active| {
            let Some(lease) = leases.get(group.as_str()) else {
                return true;
            };
            if lease.run_id == active.run_id.to_string() {
                return true;
            }
            info!(
                run_id = %active.run_id,
                group = %group,
                "Superseded by run {} of process {}", lease.run_id, lease.pid
            );
            active.token.cancel();
            superseded.push((active.run_id.clone(), lease.run_id.clone()));
            false
        });

        superseded
    }
}

impl Drop for ConcurrencyGate {
    fn drop(&mut self) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        let registry = self.active.get_mut().unwrap_or_else(|e| e.into_inner());
        for (group, active) in registry.drain() {
            if let Err(e) = ledger.release(group.as_str(), &active.run_id.to_string()) {
                warn!(group = %group, "Cannot release lease: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run::{RunParameters, TriggerEvent};
    use std::collections::HashMap as Map;
    use std::time::Duration;
    use tempfile::TempDir;

    fn run_in(group: &str) -> Run {
        Run {
            id: RunId::new(),
            workflow: "ci".to_string(),
            job: "test".to_string(),
            label: String::new(),
            event: TriggerEvent::pull_request(42, "dev"),
            params: RunParameters::default(),
            group: GroupKey::new(group, "test", ""),
            steps: Vec::new(),
            env: Map::new(),
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn first_run_proceeds() {
        let gate = ConcurrencyGate::new();
        let run = run_in("ci-42");
        let ticket = gate.admit(&run);

        assert_eq!(ticket.admission, Admission::Proceed);
        assert!(!ticket.token.is_cancelled());
        assert_eq!(gate.active_run(&run.group), Some(run.id.clone()));
    }

    #[test]
    fn second_run_supersedes_first() {
        let gate = ConcurrencyGate::new();
        let first = run_in("ci-42");
        let second = run_in("ci-42");

        let t1 = gate.admit(&first);
        let t2 = gate.admit(&second);

        assert!(t1.token.is_cancelled());
        assert!(!t2.token.is_cancelled());
        assert_eq!(t2.admission, Admission::Supersede(first.id.to_string()));
        assert_eq!(gate.active_run(&second.group), Some(second.id.clone()));
    }

    #[test]
    fn different_groups_do_not_interfere() {
        let gate = ConcurrencyGate::new();
        let t1 = gate.admit(&run_in("ci-42"));
        let t2 = gate.admit(&run_in("ci-43"));

        assert_eq!(t2.admission, Admission::Proceed);
        assert!(!t1.token.is_cancelled());
        assert_eq!(gate.active_count(), 2);
    }

    #[test]
    fn complete_only_removes_owner() {
        let gate = ConcurrencyGate::new();
        let first = run_in("ci-42");
        let second = run_in("ci-42");
        gate.admit(&first);
        gate.admit(&second);

        assert!(!gate.complete(&first.id, &first.group));
        assert_eq!(gate.active_run(&second.group), Some(second.id.clone()));
        assert!(gate.complete(&second.id, &second.group));
        assert_eq!(gate.active_count(), 0);
    }

    #[test]
    fn ledger_supersedes_across_gates() {
        let temp = TempDir::new().unwrap();
        let here = ConcurrencyGate::with_ledger(LeaseLedger::new(temp.path()));
        let there = ConcurrencyGate::with_ledger(LeaseLedger::new(temp.path()));

        let old = run_in("ci-42");
        let new = run_in("ci-42");
        let old_ticket = here.admit(&old);
        let new_ticket = there.admit(&new);

        assert_eq!(new_ticket.admission, Admission::Supersede(old.id.to_string()));
        assert!(!old_ticket.token.is_cancelled());

        let superseded = here.poll_leases();
        assert_eq!(superseded, vec![(old.id.clone(), new.id.to_string())]);
        assert!(old_ticket.token.is_cancelled());
        assert_eq!(here.active_count(), 0);

        // The new owner is unaffected by its own poll.
        assert!(there.poll_leases().is_empty());
        assert!(!new_ticket.token.is_cancelled());
    }

    #[test]
    fn poll_without_ledger_is_noop() {
        let gate = ConcurrencyGate::new();
        gate.admit(&run_in("g"));
        assert!(gate.poll_leases().is_empty());
    }

    #[test]
    fn dropped_gate_releases_its_leases() {
        let temp = TempDir::new().unwrap();
        let ledger = LeaseLedger::new(temp.path());
        let abandoned = run_in("ci-42");
        {
            let gate = ConcurrencyGate::with_ledger(ledger.clone());
            gate.admit(&abandoned);
        }
        assert!(ledger.owner(abandoned.group.as_str()).unwrap().is_none());

        let gate = ConcurrencyGate::with_ledger(ledger);
        let ticket = gate.admit(&run_in("ci-42"));
        assert_eq!(ticket.admission, Admission::Proceed);
    }

    #[test]
    fn lease_of_exited_process_does_not_supersede() {
        let temp = TempDir::new().unwrap();
        let ledger = LeaseLedger::new(temp.path());
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        let content = format!(
            r#"{{"leases":{{"ci-42/test":{{"run_id":"run_1_dead","pid":{},"acquired_at":"2026-01-01T00:00:00Z"}}}}}}"#,
            dead_pid
        );
        std::fs::write(ledger.path(), content).unwrap();

        let gate = ConcurrencyGate::with_ledger(ledger.clone());
        let run = run_in("ci-42");
        let ticket = gate.admit(&run);

        assert_eq!(ticket.admission, Admission::Proceed);
        let owner = ledger.owner("ci-42/test").unwrap().unwrap();
        assert_eq!(owner.run_id, run.id.to_string());
    }

    #[test]
    fn busy_ledger_does_not_hold_the_registry() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("leases.lock"), "").unwrap();
        let gate = ConcurrencyGate::with_ledger(LeaseLedger::new(temp.path()));
        let run = run_in("ci-42");

        std::thread::scope(|scope| {
            scope.spawn(|| gate.admit(&run));
            std::thread::sleep(Duration::from_millis(200));

            let start = std::time::Instant::now();
            assert_eq!(gate.active_run(&run.group), Some(run.id.clone()));
            assert!(start.elapsed() < Duration::from_millis(500));
        });
    }

    #[test]
    fn cancel_all_cancels_active_and_later_runs() {
        let gate = ConcurrencyGate::new();
        let first = gate.admit(&run_in("a"));
        let second = gate.admit(&run_in("b"));

        assert_eq!(gate.cancel_all(), 2);
        assert!(first.token.is_cancelled());
        assert!(second.token.is_cancelled());
        assert!(gate.is_interrupted());

        let late = gate.admit(&run_in("c"));
        assert!(late.token.is_cancelled());
    }

    #[test]
    fn poll_interrupt_follows_the_flag() {
        static FLAG: AtomicBool = AtomicBool::new(false);
        let gate = ConcurrencyGate::new().with_interrupt(&FLAG);
        let ticket = gate.admit(&run_in("a"));

        assert!(!gate.poll_interrupt());
        assert!(!ticket.token.is_cancelled());

        FLAG.store(true, Ordering::SeqCst);
        assert!(gate.poll_interrupt());
        assert!(ticket.token.is_cancelled());
    }
}
