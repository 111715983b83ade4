//! Progress events emitted while runs execute.

use crate::shell::OutputLine;
use crate::steps::StepOutcome;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use super::run::{RunId, RunResult};

/// Progress of a run, in emission order.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A run was admitted and is about to execute its first step.
    RunStarted {
        run_id: RunId,
        name: String,
        steps: usize,
    },
    /// This run took over its group from `previous`, which was told to cancel.
    RunSuperseded { run_id: RunId, previous: String },
    /// A step is about to start.
    StepStarted {
        run_id: RunId,
        step: String,
        index: usize,
    },
    /// A line of step output, secrets masked.
    StepOutput { run_id: RunId, line: OutputLine },
    /// A step has a recorded outcome.
    StepFinished { run_id: RunId, outcome: StepOutcome },
    /// A run finished.
    RunFinished { result: RunResult },
}

impl RunEvent {
    /// The run this event belongs to.
    pub fn run_id(&self) -> &RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::RunSuperseded { run_id, .. }
            | RunEvent::StepStarted { run_id, .. }
            | RunEvent::StepOutput { run_id, .. }
            | RunEvent::StepFinished { run_id, .. } => run_id,
            RunEvent::RunFinished { result } => &result.run_id,
        }
    }
}

/// Receiver of run events. Shared between run threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: RunEvent) {}
}

impl EventSink for Sender<RunEvent> {
    fn emit(&self, event: RunEvent) {
        // A closed receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events emitted so far.
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
