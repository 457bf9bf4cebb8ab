//! Chunked dispatch of work onto a thread pool, with progress tracking.
pub mod context;
pub mod dispatch;
pub mod partition;
pub mod progress;
pub mod unit;

pub use context::{PipelineConfig, PipelineContext};
pub use dispatch::{Canceller, PipelineHandle};
pub use progress::ProgressAggregator;
pub use unit::{ProgressReporter, UnitSnapshot, UnitState};
