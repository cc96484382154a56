//! Pipeline coordinator
//!
//! Chains extract → convert → display through two bounded channels, runs
//! every stage on its own task and collects how each one stopped.

use anyhow::{Result, anyhow};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::assets::{DEFAULT_BUFFER_SIZE, DEFAULT_FRAME_DELAY_MS, HEALTH_LOG_INTERVAL};
use crate::capture::FrameSource;
use crate::codec::{FrameCodec, FrameTransform};
use crate::display::Renderer;
use crate::pipeline::PipelineStage;
use crate::pipeline::channel::{BoundedChannel, channel};
use crate::pipeline::convert_stage::ConvertStage;
use crate::pipeline::display_stage::DisplayStage;
use crate::pipeline::extract_stage::ExtractStage;
use crate::pipeline::health::{HealthSummary, PipelineHealth, log_periodically};
use crate::pipeline::state::StopReason;
use crate::pipeline::types::Frame;

/// Tunables of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Slots in each of the two channels
    pub capacity: usize,
    /// Target time between two displayed frames
    pub frame_interval: Duration,
    /// Period of the health log, `None` to disable it
    pub health_interval: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_SIZE,
            frame_interval: Duration::from_millis(DEFAULT_FRAME_DELAY_MS),
            health_interval: Some(HEALTH_LOG_INTERVAL),
        }
    }
}

/// How one stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub name: &'static str,
    pub reason: StopReason,
}

/// Outcome of a finished pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Extract, convert and display, in that order
    pub stages: Vec<StageReport>,
    pub health: HealthSummary,
    /// Highest occupancy seen on the extract→convert and convert→display channels
    pub peak_occupancy: [usize; 2],
}

impl PipelineReport {
    pub fn reason_of(&self, name: &str) -> Option<StopReason> {
        self.stages
            .iter()
            .find(|stage| stage.name == name)
            .map(|stage| stage.reason)
    }

    /// Whether every stage saw the whole stream through
    pub fn completed(&self) -> bool {
        self.stages
            .iter()
            .all(|stage| stage.reason == StopReason::EndOfStream)
    }
}

impl std::fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<String> = self
            .stages
            .iter()
            .map(|stage| format!("{}: {}", stage.name, stage.reason))
            .collect();
        write!(
            f,
            "{} | {} | peak occupancy {}/{}",
            stages.join(", "),
            self.health,
            self.peak_occupancy[0],
            self.peak_occupancy[1]
        )
    }
}

/// A wired but not yet running pipeline
///
/// Building a pipeline creates both channels and all three stages; nothing
/// runs until [`Pipeline::start`].
pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
    channels: [Arc<BoundedChannel<Frame>>; 2],
    health: Arc<PipelineHealth>,
    cancel: CancellationToken,
    health_interval: Option<Duration>,
}

impl Pipeline {
    /// Wire the stages.
    ///
    /// # Panics
    ///
    /// Panics if `options.capacity` is zero.
    pub fn new(
        options: &PipelineOptions,
        source: Box<dyn FrameSource>,
        codec: Arc<dyn FrameCodec>,
        transform: Arc<dyn FrameTransform>,
        renderer: Box<dyn Renderer>,
        cancel: CancellationToken,
    ) -> Self {
        let health = Arc::new(PipelineHealth::new());
        let (extracted_tx, extracted_rx) = channel(options.capacity, cancel.clone());
        let (converted_tx, converted_rx) = channel(options.capacity, cancel.clone());
        let channels = [extracted_tx.channel(), converted_tx.channel()];

        let mut extract = ExtractStage::new(source, Arc::clone(&codec), Arc::clone(&health));
        extract.set_output(extracted_tx);

        let mut convert = ConvertStage::new(Arc::clone(&codec), transform, Arc::clone(&health));
        convert.set_input(extracted_rx);
        convert.set_output(converted_tx);

        let mut display = DisplayStage::new(
            codec,
            renderer,
            options.frame_interval,
            Arc::clone(&health),
            cancel.clone(),
        );
        display.set_input(converted_rx);

        Self {
            stages: vec![Box::new(extract), Box::new(convert), Box::new(display)],
            channels,
            health,
            cancel,
            health_interval: options.health_interval,
        }
    }

    /// Spawn every stage on its own task
    pub fn start(self) -> RunningPipeline {
        info!("Pipeline: starting {} stages", self.stages.len());

        let handles = self
            .stages
            .into_iter()
            .map(|mut stage| {
                let name = stage.name();
                let handle = tokio::spawn(async move { stage.run().await });
                (name, handle)
            })
            .collect();

        let monitor = CancellationToken::new();
        if let Some(interval) = self.health_interval {
            tokio::spawn(log_periodically(
                Arc::clone(&self.health),
                interval,
                monitor.clone(),
            ));
        }

        RunningPipeline {
            handles,
            channels: self.channels,
            health: self.health,
            cancel: self.cancel,
            monitor,
        }
    }

    /// Start the pipeline and wait for it to finish
    pub async fn run(self) -> Result<PipelineReport> {
        self.start().wait().await
    }
}

/// Handle to the spawned stages
pub struct RunningPipeline {
    handles: Vec<(&'static str, JoinHandle<Result<StopReason>>)>,
    channels: [Arc<BoundedChannel<Frame>>; 2],
    health: Arc<PipelineHealth>,
    cancel: CancellationToken,
    monitor: CancellationToken,
}

impl RunningPipeline {
    /// Ask every stage to stop without draining the channels
    pub fn cancel(&self) {
        info!("Pipeline: cancel requested");
        self.cancel.cancel();
    }

    /// Wait for all stages.
    ///
    /// A stage that fails or panics cancels the others; the first such
    /// failure is returned once everything has stopped.
    pub async fn wait(mut self) -> Result<PipelineReport> {
        let handles = std::mem::take(&mut self.handles);
        let mut stages = Vec::with_capacity(handles.len());
        let mut failure = None;

        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(reason)) => stages.push(StageReport { name, reason }),
                Ok(Err(e)) => {
                    error!("{}: {:#}", name, e);
                    self.cancel.cancel();
                    failure.get_or_insert(e.context(format!("{name} failed")));
                }
                Err(e) => {
                    error!("{}: task failed: {}", name, e);
                    self.cancel.cancel();
                    failure.get_or_insert(anyhow!("{name} task failed: {e}"));
                }
            }
        }
        self.monitor.cancel();

        if let Some(e) = failure {
            return Err(e);
        }

        let report = PipelineReport {
            stages,
            health: self.health.summary(),
            peak_occupancy: [self.channels[0].peak(), self.channels[1].peak()],
        };
        info!("Pipeline: finished, {}", report);
        Ok(report)
    }
}

impl Drop for RunningPipeline {
    fn drop(&mut self) {
        // the health logger never outlives its handle
        self.monitor.cancel();
    }
}
