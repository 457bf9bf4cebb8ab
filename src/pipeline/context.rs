use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::utils::errors::{ConfigError, PipelineError};

/// Tunables of the dispatch layer. Every field has a default so partial
/// JSON documents load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of chunks an input sequence is split into.
    pub parallelism: usize,
    /// Threads in the execution pool.
    pub workers: usize,
    pub poll_interval_ms: u64,
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            workers: num_cpus::get(),
            poll_interval_ms: 100,
            timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::Invalid("parallelism must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Explicit state shared by every run a caller dispatches: the configuration,
/// the execution pool and a run counter. Nothing here is process-global.
pub struct PipelineContext {
    config: PipelineConfig,
    pool: Arc<ThreadPool>,
    runs: AtomicU64,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        if config.parallelism == 0 {
            return Err(PipelineError::InvalidParallelism(0));
        }
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("tldist-worker-{i}"))
            .build()?;
        info!(
            "Created pipeline context with {} workers, parallelism {}",
            config.workers, config.parallelism
        );
        Ok(Self { config, pool: Arc::new(pool), runs: AtomicU64::new(0) })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> Arc<ThreadPool> {
        Arc::clone(&self.pool)
    }

    pub(crate) fn next_run_id(&self) -> u64 {
        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        debug!("Starting pipeline run {}", run);
        run
    }

    /// Number of runs dispatched through this context so far.
    pub fn runs_dispatched(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}
