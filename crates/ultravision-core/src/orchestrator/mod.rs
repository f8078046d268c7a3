//! Batch orchestration: planning with dedup, per-batch delivery with
//! retry, and the end-to-end run that ties discovery, dispatch and output
//! together.

pub(crate) mod batch;
pub(crate) mod run;

pub use batch::{plan_batches, BatchPlan, BatchRunner, BatchSettings};
pub use run::{Orchestrator, RunEvent};
