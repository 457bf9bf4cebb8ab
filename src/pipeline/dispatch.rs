use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};

use crate::pipeline::context::PipelineContext;
use crate::pipeline::partition::partition;
use crate::pipeline::unit::{ProgressReporter, RunState, UnitPhase, UnitSnapshot, UnitStatus};
use crate::utils::errors::PipelineError;
use crate::utils::types::UnitId;

type UnitOutcome<R> = Result<Vec<R>, anyhow::Error>;
type OutcomeSlot<R> = Arc<Mutex<Option<UnitOutcome<R>>>>;

impl PipelineContext {
    /// Splits `items` into `config.parallelism` balanced chunks and runs
    /// `worker` on each of them in the pool.
    pub fn dispatch<T, R, C, F, E>(
        &self,
        items: Vec<T>,
        worker: F,
        shared: C,
    ) -> Result<PipelineHandle<R>, PipelineError>
    where
        T: Send + 'static,
        R: Send + 'static,
        C: Send + Sync + 'static,
        F: Fn(Vec<T>, &C, &ProgressReporter) -> Result<Vec<R>, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        self.dispatch_with(items, self.config().parallelism, worker, shared)
    }

    /// Like [`dispatch`](Self::dispatch) with an explicit parallelism degree.
    pub fn dispatch_with<T, R, C, F, E>(
        &self,
        items: Vec<T>,
        parallelism: usize,
        worker: F,
        shared: C,
    ) -> Result<PipelineHandle<R>, PipelineError>
    where
        T: Send + 'static,
        R: Send + 'static,
        C: Send + Sync + 'static,
        F: Fn(Vec<T>, &C, &ProgressReporter) -> Result<Vec<R>, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        if parallelism == 0 {
            return Err(PipelineError::InvalidParallelism(parallelism));
        }

        let run = self.next_run_id();
        let total = items.len();
        let chunks = partition(items, parallelism);
        info!(
            "Run {}: dispatching {} items as {} units {:?}",
            run,
            total,
            chunks.len(),
            chunks.iter().map(Vec::len).collect::<Vec<_>>()
        );

        let state = Arc::new(RunState::default());
        let worker = Arc::new(worker);
        let shared = Arc::new(shared);
        let (tx, rx) = unbounded();
        let pool = self.pool();

        let mut units = Vec::with_capacity(chunks.len());
        let mut slots = Vec::with_capacity(chunks.len());
        for (id, chunk) in chunks.into_iter().enumerate() {
            let status = Arc::new(UnitStatus::new(id, chunk.len()));
            let slot: OutcomeSlot<R> = Arc::new(Mutex::new(None));
            let reporter = ProgressReporter::new(Arc::clone(&status), Arc::clone(&state));

            let task = UnitTask {
                status: Arc::clone(&status),
                slot: Arc::clone(&slot),
                run: Arc::clone(&state),
                signals: tx.clone(),
            };
            let worker = Arc::clone(&worker);
            let shared = Arc::clone(&shared);
            pool.spawn(move || {
                task.execute(|| (*worker)(chunk, shared.as_ref(), &reporter).map_err(Into::into))
            });

            units.push(status);
            slots.push(slot);
        }

        let config = self.config();
        Ok(PipelineHandle {
            run,
            units,
            slots,
            state,
            signals: rx,
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        })
    }
}

struct UnitTask<R> {
    status: Arc<UnitStatus>,
    slot: OutcomeSlot<R>,
    run: Arc<RunState>,
    signals: Sender<UnitId>,
}

impl<R> UnitTask<R> {
    fn execute<F>(self, work: F)
    where
        F: FnOnce() -> UnitOutcome<R>,
    {
        let id = self.status.id();
        let outcome = if self.run.is_cancelled() {
            debug!("Unit {} skipped, run cancelled before start", id);
            Err(anyhow!(PipelineError::Cancelled))
        } else {
            self.status.start();
            match panic::catch_unwind(AssertUnwindSafe(work)) {
                Ok(outcome) => outcome,
                Err(payload) => Err(anyhow!("worker panicked: {}", panic_message(&*payload))),
            }
        };

        let phase = match &outcome {
            Ok(_) => UnitPhase::Done,
            Err(_) if self.run.is_cancelled() => UnitPhase::Cancelled,
            Err(err) => {
                warn!("Unit {} failed: {:#}", id, err);
                UnitPhase::Failed
            }
        };

        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        self.status.finish(phase);
        self.run.mark_finished();
        // the handle may already be gone
        let _ = self.signals.send(id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Caller-side view of a dispatched run.
///
/// Dropping an incomplete handle cancels every outstanding unit.
pub struct PipelineHandle<R> {
    run: u64,
    units: Vec<Arc<UnitStatus>>,
    slots: Vec<OutcomeSlot<R>>,
    pub(crate) state: Arc<RunState>,
    pub(crate) signals: Receiver<UnitId>,
    pub(crate) poll_interval: Duration,
    timeout: Option<Duration>,
}

/// Cancels a run from anywhere, e.g. another thread.
#[derive(Clone)]
pub struct Canceller(Arc<RunState>);

impl Canceller {
    pub fn cancel(&self) {
        self.0.cancel();
    }
}

impl<R> PipelineHandle<R> {
    pub fn run_id(&self) -> u64 {
        self.run
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.units.iter().map(|u| u.size()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.state.finished() == self.units.len()
    }

    /// Per-unit completion fractions in submission order.
    pub fn poll_progress(&self) -> Vec<f32> {
        self.units.iter().map(|u| u.progress()).collect()
    }

    pub fn snapshots(&self) -> Vec<UnitSnapshot> {
        self.units.iter().map(|u| u.snapshot()).collect()
    }

    pub fn cancel(&self) {
        info!("Run {}: cancelling outstanding units", self.run);
        self.state.cancel();
    }

    pub fn canceller(&self) -> Canceller {
        Canceller(Arc::clone(&self.state))
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub(crate) fn has_cancelled_units(&self) -> bool {
        self.units.iter().any(|u| u.phase() == UnitPhase::Cancelled)
    }

    /// Blocks until every unit finished and returns the concatenated results
    /// in submission order.
    pub fn join(self) -> Result<Vec<R>, PipelineError> {
        self.join_with_progress(|_, _| {})
    }

    /// [`join`](Self::join), calling `on_progress(overall, per_unit)` on every poll.
    pub fn join_with_progress<P>(mut self, on_progress: P) -> Result<Vec<R>, PipelineError>
    where
        P: FnMut(f32, &[f32]),
    {
        let timeout = self.timeout;
        self.await_completion(timeout, on_progress)?;
        self.collect()
    }

    fn collect(&mut self) -> Result<Vec<R>, PipelineError> {
        let mut outcomes = Vec::with_capacity(self.slots.len());
        for (id, slot) in std::mem::take(&mut self.slots).into_iter().enumerate() {
            let outcome = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            outcomes.push((id, self.units[id].phase(), outcome));
        }

        if let Some((unit, _, outcome)) = outcomes
            .iter_mut()
            .find(|(_, phase, _)| *phase == UnitPhase::Failed)
        {
            let source = match outcome.take() {
                Some(Err(err)) => err,
                _ => anyhow!("unit {} failed without an error", unit),
            };
            return Err(PipelineError::Execution { unit: *unit, source });
        }
        if outcomes.iter().any(|(_, phase, _)| *phase != UnitPhase::Done) {
            return Err(PipelineError::Cancelled);
        }

        let mut results = Vec::new();
        for (_, _, outcome) in outcomes {
            if let Some(Ok(chunk)) = outcome {
                results.extend(chunk);
            }
        }
        debug!("Run {}: merged {} results", self.run, results.len());
        Ok(results)
    }
}

impl<R> Drop for PipelineHandle<R> {
    fn drop(&mut self) {
        if !self.is_complete() {
            warn!("Run {}: handle dropped before completion", self.run);
            self.state.cancel();
        }
    }
}
