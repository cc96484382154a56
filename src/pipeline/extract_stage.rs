//! Extract stage
//!
//! Reads frames from a [`FrameSource`] in order, encodes each one into a
//! transportable [`Frame`] and feeds the convert stage. End of stream is
//! queued whenever the source runs dry or fails, so downstream stages always
//! learn that no more frames are coming.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::capture::FrameSource;
use crate::codec::FrameCodec;
use crate::pipeline::PipelineStage;
use crate::pipeline::channel::FrameSender;
use crate::pipeline::health::PipelineHealth;
use crate::pipeline::stage::offload;
use crate::pipeline::state::{StageState, StopReason};
use crate::pipeline::types::Frame;

/// Extract stage: source frames in, encoded frames out
pub struct ExtractStage {
    source: Option<Box<dyn FrameSource>>,
    codec: Arc<dyn FrameCodec>,
    health: Arc<PipelineHealth>,
    output_tx: Option<FrameSender<Frame>>,
    state: StageState,
}

impl ExtractStage {
    pub fn new(
        source: Box<dyn FrameSource>,
        codec: Arc<dyn FrameCodec>,
        health: Arc<PipelineHealth>,
    ) -> Self {
        Self {
            source: Some(source),
            codec,
            health,
            output_tx: None,
            state: StageState::default(),
        }
    }

    /// Set the output channel (towards the convert stage)
    pub fn set_output(&mut self, tx: FrameSender<Frame>) {
        self.output_tx = Some(tx);
    }

    /// Pump frames until the source ends, fails or the channel gives up.
    ///
    /// Returns the stop reason and whether end of stream still has to be queued.
    async fn pump(
        mut source: Box<dyn FrameSource>,
        codec: Arc<dyn FrameCodec>,
        health: Arc<PipelineHealth>,
        output_tx: &FrameSender<Frame>,
    ) -> (StopReason, bool) {
        let opened = offload(move || {
            let info = source.open();
            (source, info)
        })
        .await;

        match opened {
            Ok((returned, Ok(info))) => {
                source = returned;
                match info.frame_count {
                    Some(count) => info!("ExtractStage: opened {} ({} frames)", info.name, count),
                    None => info!("ExtractStage: opened {}", info.name),
                }
            }
            Ok((_, Err(e))) => {
                error!("ExtractStage: {e}");
                health.record_source_failure();
                return (StopReason::SourceFailure, true);
            }
            Err(e) => {
                error!("ExtractStage: opening source: {e:#}");
                health.record_source_failure();
                return (StopReason::SourceFailure, true);
            }
        }

        let mut index = 0u64;
        loop {
            let codec = Arc::clone(&codec);
            let next = offload(move || {
                let next = source
                    .read_next()
                    .map(|image| image.map(|image| codec.encode(&image)));
                (source, next)
            })
            .await;

            let encoded = match next {
                Ok((returned, Ok(Some(encoded)))) => {
                    source = returned;
                    encoded
                }
                Ok((_, Ok(None))) => {
                    info!("ExtractStage: source exhausted after {} frames", index);
                    return (StopReason::EndOfStream, true);
                }
                Ok((_, Err(e))) => {
                    error!("ExtractStage: frame {}: {e}", index);
                    health.record_source_failure();
                    return (StopReason::SourceFailure, true);
                }
                Err(e) => {
                    error!("ExtractStage: reading frame {}: {e:#}", index);
                    health.record_source_failure();
                    return (StopReason::SourceFailure, true);
                }
            };

            match encoded {
                Ok(frame) => {
                    debug!("Reading frame {}", index);
                    let size = frame.size();
                    if let Err(e) = output_tx.send(frame).await {
                        info!("ExtractStage: output {e}");
                        return (e.into(), false);
                    }
                    health.record_decoded(size);
                }
                Err(e) => {
                    warn!("ExtractStage: skipping frame {}: {e}", index);
                    health.record_codec_failure();
                }
            }
            index += 1;
        }
    }
}

#[async_trait]
impl PipelineStage for ExtractStage {
    async fn run(&mut self) -> Result<StopReason> {
        let source = self
            .source
            .take()
            .ok_or_else(|| anyhow!("No frame source"))?;
        let output_tx = self
            .output_tx
            .take()
            .ok_or_else(|| anyhow!("No output channel"))?;

        info!("ExtractStage: started");
        let (mut reason, send_end) = Self::pump(
            source,
            Arc::clone(&self.codec),
            Arc::clone(&self.health),
            &output_tx,
        )
        .await;

        if send_end {
            if let Err(e) = output_tx.finish().await {
                info!("ExtractStage: end of stream not delivered, output {e}");
                reason = e.into();
            }
        }

        self.state.stop(reason);
        info!("ExtractStage: {}", self.state);
        Ok(reason)
    }

    fn name(&self) -> &'static str {
        "ExtractStage"
    }

    fn state(&self) -> StageState {
        self.state
    }
}
