//! Display stage
//!
//! Decodes converted frames, hands them to the [`Renderer`] and keeps them on
//! a fixed cadence with a [`FramePacer`]. The stage also owns the quit path:
//! a renderer that reports `quit_requested` cancels the whole pipeline.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::codec::FrameCodec;
use crate::display::Renderer;
use crate::pipeline::PipelineStage;
use crate::pipeline::channel::FrameReceiver;
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::pacer::FramePacer;
use crate::pipeline::stage::offload;
use crate::pipeline::state::{StageState, StopReason};
use crate::pipeline::types::{Frame, StreamItem};

/// Display stage: converted frames in, paced output on the renderer
pub struct DisplayStage {
    codec: Arc<dyn FrameCodec>,
    renderer: Option<Box<dyn Renderer>>,
    health: Arc<PipelineHealth>,
    input_rx: Option<FrameReceiver<Frame>>,
    pacer: FramePacer,
    cancel: CancellationToken,
    state: StageState,
}

impl DisplayStage {
    pub fn new(
        codec: Arc<dyn FrameCodec>,
        renderer: Box<dyn Renderer>,
        frame_interval: Duration,
        health: Arc<PipelineHealth>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            codec,
            renderer: Some(renderer),
            health,
            input_rx: None,
            pacer: FramePacer::new(frame_interval),
            cancel,
            state: StageState::default(),
        }
    }

    /// Set the input channel (frames from the convert stage)
    pub fn set_input(&mut self, rx: FrameReceiver<Frame>) {
        self.input_rx = Some(rx);
    }
}

#[async_trait]
impl PipelineStage for DisplayStage {
    async fn run(&mut self) -> Result<StopReason> {
        let mut renderer = self
            .renderer
            .take()
            .ok_or_else(|| anyhow!("No renderer"))?;
        let mut input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| anyhow!("No input channel"))?;

        info!(
            "DisplayStage: started, {} ms per frame",
            self.pacer.interval().as_millis()
        );
        self.pacer.restart();
        let mut index = 0u64;

        let reason = loop {
            let frame = match input_rx.recv().await {
                Ok(StreamItem::Frame(frame)) => frame,
                Ok(StreamItem::EndOfStream) => break StopReason::EndOfStream,
                Err(e) => break e.into(),
            };

            let codec = Arc::clone(&self.codec);
            let decoded = match offload(move || codec.decode(&frame)).await {
                Ok(decoded) => decoded.map_err(anyhow::Error::from),
                Err(e) => Err(e),
            };
            let image = match decoded {
                Ok(image) => image,
                Err(e) => {
                    warn!("DisplayStage: skipping frame {}: {e:#}", index);
                    self.health.record_codec_failure();
                    index += 1;
                    // a skipped frame gets no slot; the next one is timed from here
                    self.pacer.restart();
                    continue;
                }
            };

            debug!("Displaying frame {}", index);
            let (returned, shown) = offload(move || {
                let shown = renderer.show(&image);
                (renderer, shown)
            })
            .await
            .map_err(|e| e.context("renderer lost"))?;
            renderer = returned;

            match shown {
                Ok(()) => self.health.record_rendered(),
                Err(e) => {
                    warn!("DisplayStage: frame {}: {e}", index);
                    self.health.record_render_failure();
                }
            }
            index += 1;

            let wait = self.pacer.next_wait();
            debug!(
                "Time to process frame {} ms, waiting {} ms",
                self.pacer.elapsed().as_millis(),
                wait.as_millis()
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break StopReason::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }

            if renderer.quit_requested() {
                info!("DisplayStage: quit requested");
                self.cancel.cancel();
                break StopReason::Cancelled;
            }
            self.pacer.restart();
        };

        drop(input_rx);
        renderer.close();

        self.state.stop(reason);
        info!("DisplayStage: {} after {} frames", self.state, index);
        Ok(reason)
    }

    fn name(&self) -> &'static str {
        "DisplayStage"
    }

    fn state(&self) -> StageState {
        self.state
    }
}
