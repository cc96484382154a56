//! Convert stage
//!
//! Decodes every frame coming from the extract stage, applies the configured
//! [`FrameTransform`] (grayscale by default), re-encodes the result and hands
//! it to the display stage. Frames that fail anywhere in between are dropped
//! and counted; the stream itself keeps going.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::codec::{FrameCodec, FrameTransform};
use crate::error::ChannelError;
use crate::pipeline::PipelineStage;
use crate::pipeline::channel::{FrameReceiver, FrameSender};
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::stage::offload;
use crate::pipeline::state::{StageState, StopReason};
use crate::pipeline::types::{Frame, StreamItem};

/// Convert stage: encoded frames in, transformed encoded frames out
pub struct ConvertStage {
    codec: Arc<dyn FrameCodec>,
    transform: Arc<dyn FrameTransform>,
    health: Arc<PipelineHealth>,
    input_rx: Option<FrameReceiver<Frame>>,
    output_tx: Option<FrameSender<Frame>>,
    state: StageState,
}

impl ConvertStage {
    pub fn new(
        codec: Arc<dyn FrameCodec>,
        transform: Arc<dyn FrameTransform>,
        health: Arc<PipelineHealth>,
    ) -> Self {
        Self {
            codec,
            transform,
            health,
            input_rx: None,
            output_tx: None,
            state: StageState::default(),
        }
    }

    /// Set the input channel (frames from the extract stage)
    pub fn set_input(&mut self, rx: FrameReceiver<Frame>) {
        self.input_rx = Some(rx);
    }

    /// Set the output channel (towards the display stage)
    pub fn set_output(&mut self, tx: FrameSender<Frame>) {
        self.output_tx = Some(tx);
    }

    /// Returns the stop reason and whether end of stream still has to be queued
    async fn pump(
        codec: Arc<dyn FrameCodec>,
        transform: Arc<dyn FrameTransform>,
        health: Arc<PipelineHealth>,
        input_rx: &mut FrameReceiver<Frame>,
        output_tx: &FrameSender<Frame>,
    ) -> (StopReason, bool) {
        let mut index = 0u64;
        loop {
            let frame = match input_rx.recv().await {
                Ok(StreamItem::Frame(frame)) => frame,
                Ok(StreamItem::EndOfStream) => {
                    info!("ConvertStage: end of stream after {} frames", index);
                    return (StopReason::EndOfStream, true);
                }
                // upstream vanished: close the stream cleanly for the display
                Err(ChannelError::Disconnected) => {
                    warn!("ConvertStage: input disconnected after {} frames", index);
                    return (StopReason::Disconnected, true);
                }
                Err(ChannelError::Cancelled) => return (StopReason::Cancelled, false),
            };

            debug!("Converting frame {}", index);
            let codec = Arc::clone(&codec);
            let transform = Arc::clone(&transform);
            let converted = offload(move || {
                let image = codec.decode(&frame)?;
                let image = transform.apply(image)?;
                codec.encode(&image)
            })
            .await;

            match converted {
                Ok(Ok(frame)) => {
                    let size = frame.size();
                    if let Err(e) = output_tx.send(frame).await {
                        info!("ConvertStage: output {e}");
                        return (e.into(), false);
                    }
                    health.record_transformed(size);
                }
                Ok(Err(e)) => {
                    warn!("ConvertStage: skipping frame {}: {e}", index);
                    health.record_codec_failure();
                }
                Err(e) => {
                    warn!("ConvertStage: skipping frame {}: {e:#}", index);
                    health.record_codec_failure();
                }
            }
            index += 1;
        }
    }
}

#[async_trait]
impl PipelineStage for ConvertStage {
    async fn run(&mut self) -> Result<StopReason> {
        let mut input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| anyhow!("No input channel"))?;
        let output_tx = self
            .output_tx
            .take()
            .ok_or_else(|| anyhow!("No output channel"))?;

        info!("ConvertStage: started ({})", self.transform.name());
        let (mut reason, send_end) = Self::pump(
            Arc::clone(&self.codec),
            Arc::clone(&self.transform),
            Arc::clone(&self.health),
            &mut input_rx,
            &output_tx,
        )
        .await;
        drop(input_rx);

        if send_end {
            if let Err(e) = output_tx.finish().await {
                info!("ConvertStage: end of stream not delivered, output {e}");
                reason = e.into();
            }
        }

        self.state.stop(reason);
        info!("ConvertStage: {}", self.state);
        Ok(reason)
    }

    fn name(&self) -> &'static str {
        "ConvertStage"
    }

    fn state(&self) -> StageState {
        self.state
    }
}
