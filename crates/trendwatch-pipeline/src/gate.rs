//! Single-flight run gate.
//!
//! At most one scan holds a [`RunPermit`] at a time. The permit releases the
//! gate when dropped, including on panic or cancellation.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RunStage {
    Idle = 0,
    Fetching = 1,
    Scoring = 2,
    Persisting = 3,
    Notifying = 4,
    Completed = 5,
    Failed = 6,
}

impl RunStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Idle => "idle",
            RunStage::Fetching => "fetching",
            RunStage::Scoring => "scoring",
            RunStage::Persisting => "persisting",
            RunStage::Notifying => "notifying",
            RunStage::Completed => "completed",
            RunStage::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStage::Idle | RunStage::Completed | RunStage::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RunStage::Fetching,
            2 => RunStage::Scoring,
            3 => RunStage::Persisting,
            4 => RunStage::Notifying,
            5 => RunStage::Completed,
            6 => RunStage::Failed,
            _ => RunStage::Idle,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunGate {
    active: AtomicBool,
    stage: AtomicU8,
}

impl RunGate {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Atomically claims the gate. Returns `None` while another run holds it.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<RunPermit> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.stage.store(RunStage::Idle as u8, Ordering::Release);
        Some(RunPermit {
            gate: Arc::clone(self),
        })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stage of the current run, or the terminal stage of the last one.
    #[must_use]
    pub fn stage(&self) -> RunStage {
        RunStage::from_u8(self.stage.load(Ordering::Acquire))
    }
}

/// Proof of holding the run gate.
#[derive(Debug)]
pub struct RunPermit {
    gate: Arc<RunGate>,
}

impl RunPermit {
    pub fn set_stage(&self, stage: RunStage) {
        tracing::debug!(stage = stage.as_str(), "scan stage");
        self.gate.stage.store(stage as u8, Ordering::Release);
    }

    #[must_use]
    pub fn stage(&self) -> RunStage {
        self.gate.stage()
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        // A permit dropped mid-run (panic, abort) leaves a failed marker.
        if !self.gate.stage().is_terminal() {
            self.gate
                .stage
                .store(RunStage::Failed as u8, Ordering::Release);
        }
        self.gate.active.store(false, Ordering::Release);
    }
}
