//! Pipeline stage trait
//!
//! Defines the interface shared by the extract, convert and display stages.

use anyhow::Result;
use async_trait::async_trait;

use super::state::{StageState, StopReason};

/// Trait for pipeline stages that process frames
///
/// A stage is built with its channel ends already attached and does nothing
/// until `run` is awaited; the pipeline spawns each stage on its own task.
#[async_trait]
pub trait PipelineStage: Send {
    /// Run the stage until its input ends, the pipeline is cancelled or a
    /// neighbour disconnects
    async fn run(&mut self) -> Result<StopReason>;

    /// Get the name of this stage for logging
    fn name(&self) -> &'static str;

    fn state(&self) -> StageState;
}

/// Run blocking work (codec, file or display I/O) off the async workers
pub(crate) async fn offload<F, R>(work: F) -> Result<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| anyhow::anyhow!("blocking worker failed: {e}"))
}
