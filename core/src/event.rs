use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// A periodic report of the progress of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Candidates tried so far, across all phases.
    pub attempts: u64,
    pub elapsed: Duration,
    /// Candidates per second since the previous snapshot.
    pub throughput: f64,
    /// The number of candidates of the whole run, when every phase knows its size.
    pub total: Option<u64>,
}

impl ProgressSnapshot {
    /// Overall progress of the run in percent, when its size is known.
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| (self.attempts as f64 / total as f64 * 100.).min(100.))
    }
}

/// An event to track the progress of a run.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Progress(ProgressSnapshot),
    /// The nth phase of the attack is starting.
    Phase {
        phase_number: usize,
        phase_count: usize,
        generator: &'static str,
        candidates: Option<u64>,
    },
    /// A worker failed. The rest of its chunk is given to another worker.
    WorkerFailed { worker: usize, cause: String },
}

/// The outcome of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrackResult {
    Found {
        candidate: String,
        attempts: u64,
        elapsed: Duration,
    },
    NotFound {
        attempts: u64,
        elapsed: Duration,
    },
    TimedOut {
        attempts: u64,
        elapsed: Duration,
    },
    /// Every worker failed, or the run was cancelled by the caller.
    Cancelled {
        attempts: u64,
        elapsed: Duration,
        cause: String,
    },
}

impl CrackResult {
    pub fn attempts(&self) -> u64 {
        match self {
            CrackResult::Found { attempts, .. }
            | CrackResult::NotFound { attempts, .. }
            | CrackResult::TimedOut { attempts, .. }
            | CrackResult::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            CrackResult::Found { elapsed, .. }
            | CrackResult::NotFound { elapsed, .. }
            | CrackResult::TimedOut { elapsed, .. }
            | CrackResult::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    /// The plaintext, if it was found.
    pub fn candidate(&self) -> Option<&str> {
        match self {
            CrackResult::Found { candidate, .. } => Some(candidate),
            _ => None,
        }
    }
}

/// A handle to a run executing in the background.
pub struct CrackHandle {
    pub(crate) handle: JoinHandle<AuditResult<CrackResult>>,
    pub(crate) receiver: Receiver<Event>,
    pub(crate) stop: Arc<AtomicBool>,
}

impl CrackHandle {
    /// Returns the outcome of the run.
    /// Blocks until the run is finished.
    pub fn join(self) -> AuditResult<CrackResult> {
        self.handle
            .join()
            .map_err(|_| AuditError::WorkerPanic("the coordinator panicked".to_owned()))?
    }

    /// Blocks until an event is received.
    /// Returns `None` if the run is finished.
    pub fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    /// Asks the workers to stop. The run ends as cancelled.
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
