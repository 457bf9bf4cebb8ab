use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use log::{debug, warn};

use crate::pipeline::dispatch::PipelineHandle;
use crate::utils::errors::PipelineError;

/// Merges per-unit fractions into one overall fraction, weighting each unit
/// by its share of the input items. Never reports a lower value than before.
#[derive(Debug, Clone)]
pub struct ProgressAggregator {
    weights: Vec<f32>,
    overall: f32,
}

impl ProgressAggregator {
    pub fn new(chunk_sizes: &[usize]) -> Self {
        let total: usize = chunk_sizes.iter().sum();
        let weights = chunk_sizes
            .iter()
            .map(|&size| if total == 0 { 0.0 } else { size as f32 / total as f32 })
            .collect();
        let overall = if total == 0 { 1.0 } else { 0.0 };
        Self { weights, overall }
    }

    pub fn update(&mut self, fractions: &[f32]) -> f32 {
        let mean: f32 = self
            .weights
            .iter()
            .zip(fractions)
            .map(|(w, f)| w * f.clamp(0.0, 1.0))
            .sum();
        self.overall = self.overall.max(mean.min(1.0));
        self.overall
    }

    pub fn overall(&self) -> f32 {
        self.overall
    }
}

impl<R> PipelineHandle<R> {
    /// Waits for every unit to finish, polling progress once per interval.
    ///
    /// Sleeps between polls and wakes early when a unit finishes. Completion
    /// is read before the progress poll, so the last poll always reflects the
    /// final state. When `timeout` elapses the run is cancelled and
    /// [`PipelineError::TimedOut`] is returned.
    pub fn await_completion<P>(
        &self,
        timeout: Option<Duration>,
        mut on_progress: P,
    ) -> Result<f32, PipelineError>
    where
        P: FnMut(f32, &[f32]),
    {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut aggregator = ProgressAggregator::new(&self.chunk_sizes());

        loop {
            let complete = self.is_complete();
            let fractions = self.poll_progress();
            let overall = aggregator.update(&fractions);
            debug!("Run {}: progress {:.3} {:?}", self.run_id(), overall, fractions);
            on_progress(overall, &fractions);

            if complete {
                if self.has_cancelled_units() {
                    return Err(PipelineError::Cancelled);
                }
                return Ok(overall);
            }

            let mut wait = self.poll_interval;
            if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
                let now = Instant::now();
                if now >= deadline {
                    warn!("Run {}: timed out after {:?}", self.run_id(), timeout);
                    self.cancel();
                    return Err(PipelineError::TimedOut(timeout));
                }
                wait = wait.min(deadline - now);
            }
            self.wait_for_signal(wait);
        }
    }

    fn wait_for_signal(&self, wait: Duration) {
        match self.signals.recv_timeout(wait) {
            Ok(_) => while self.signals.try_recv().is_ok() {},
            Err(RecvTimeoutError::Timeout) => {}
            // every unit has dropped its sender; fall back to plain sleeping
            Err(RecvTimeoutError::Disconnected) => thread::sleep(wait),
        }
    }
}
