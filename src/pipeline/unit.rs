//! Per-unit execution status shared between the owning worker and the poller.
//!
//! Each unit has exactly one writer (the worker thread running it) and any
//! number of readers. Progress and phase live in atomics so a reader always
//! sees a consistent snapshot without taking a lock.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicUsize, Ordering};

use crate::utils::types::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnitPhase {
    Pending = 0,
    Running = 1,
    Done = 2,
    Failed = 3,
    Cancelled = 4,
}

impl UnitPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => UnitPhase::Pending,
            1 => UnitPhase::Running,
            2 => UnitPhase::Done,
            3 => UnitPhase::Failed,
            _ => UnitPhase::Cancelled,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, UnitPhase::Done | UnitPhase::Failed | UnitPhase::Cancelled)
    }
}

/// Status vocabulary reported for a unit, mirroring a task queue's states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitState {
    Pending,
    Running,
    Progress(f32),
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSnapshot {
    pub id: UnitId,
    /// Number of input items in the unit's chunk.
    pub size: usize,
    pub state: UnitState,
    pub progress: f32,
}

#[derive(Debug)]
pub struct UnitStatus {
    id: UnitId,
    size: usize,
    phase: AtomicU8,
    // f32 bits; non-negative floats order the same as their bit patterns
    progress: AtomicU32,
}

impl UnitStatus {
    pub fn new(id: UnitId, size: usize) -> Self {
        Self {
            id,
            size,
            phase: AtomicU8::new(UnitPhase::Pending as u8),
            progress: AtomicU32::new(0f32.to_bits()),
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn phase(&self) -> UnitPhase {
        UnitPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    /// Raises the progress fraction; lower or invalid values are ignored.
    pub(crate) fn advance(&self, fraction: f32) {
        if fraction.is_nan() {
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        self.progress.fetch_max(fraction.to_bits(), Ordering::AcqRel);
    }

    pub(crate) fn start(&self) {
        self.phase.store(UnitPhase::Running as u8, Ordering::Release);
    }

    /// Publishes the terminal phase. Must be the last write made by the worker.
    pub(crate) fn finish(&self, phase: UnitPhase) {
        if phase == UnitPhase::Done {
            self.advance(1.0);
        }
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn snapshot(&self) -> UnitSnapshot {
        // phase first: a finished phase guarantees the final progress is visible
        let phase = self.phase();
        let progress = self.progress();
        let state = match phase {
            UnitPhase::Pending => UnitState::Pending,
            UnitPhase::Running if progress > 0.0 => UnitState::Progress(progress),
            UnitPhase::Running => UnitState::Running,
            UnitPhase::Done => UnitState::Done,
            UnitPhase::Failed => UnitState::Failed,
            UnitPhase::Cancelled => UnitState::Cancelled,
        };
        UnitSnapshot { id: self.id, size: self.size, state, progress }
    }
}

/// Counters and flags for one pipeline run, owned by its handle.
#[derive(Debug, Default)]
pub struct RunState {
    cancelled: AtomicBool,
    finished: AtomicUsize,
}

impl RunState {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.fetch_add(1, Ordering::AcqRel);
    }
}

/// Handed to a worker so it can publish progress and observe cancellation.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    status: Arc<UnitStatus>,
    run: Arc<RunState>,
}

impl ProgressReporter {
    pub(crate) fn new(status: Arc<UnitStatus>, run: Arc<RunState>) -> Self {
        Self { status, run }
    }

    /// A reporter not attached to any pipeline, for running a worker inline.
    pub fn detached() -> Self {
        Self::new(Arc::new(UnitStatus::new(0, 0)), Arc::new(RunState::default()))
    }

    pub fn report(&self, fraction: f32) {
        self.status.advance(fraction);
    }

    /// Reports `completed` out of `total` items done.
    pub fn step(&self, completed: usize, total: usize) {
        if total > 0 {
            self.report(completed as f32 / total as f32);
        }
    }

    pub fn progress(&self) -> f32 {
        self.status.progress()
    }

    pub fn is_cancelled(&self) -> bool {
        self.run.is_cancelled()
    }

    /// Cancels the run this reporter belongs to.
    pub fn cancel(&self) {
        self.run.cancel();
    }
}
