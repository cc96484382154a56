//! Health monitoring and metrics for pipeline

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::debug;
use tokio_util::sync::CancellationToken;

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

/// Health metrics for a pipeline
///
/// Counters are shared by all three stages. All fields use atomic operations
/// for thread-safe access.
pub struct PipelineHealth {
    /// Frames read from the source and queued by the decoder
    pub frames_decoded: AtomicU64,

    /// Frames converted and queued by the transformer
    pub frames_transformed: AtomicU64,

    /// Frames handed to the renderer
    pub frames_rendered: AtomicU64,

    /// Encoded bytes queued by the decoder and the transformer
    pub bytes_processed: AtomicU64,

    /// Frames skipped because they failed to encode, decode or transform
    pub codec_failures: AtomicU64,

    /// Frames the renderer failed to show
    pub render_failures: AtomicU64,

    /// Source open or read failures (at most one per run)
    pub source_failures: AtomicU64,

    /// Timestamp (as Unix microseconds) of the last frame activity
    pub last_frame_time: AtomicU64,
}

impl PipelineHealth {
    /// Create a new health metrics instance
    pub fn new() -> Self {
        Self {
            frames_decoded: AtomicU64::new(0),
            frames_transformed: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
            bytes_processed: AtomicU64::new(0),
            codec_failures: AtomicU64::new(0),
            render_failures: AtomicU64::new(0),
            source_failures: AtomicU64::new(0),
            last_frame_time: AtomicU64::new(now_micros()),
        }
    }

    fn touch(&self) {
        self.last_frame_time.store(now_micros(), Ordering::Relaxed);
    }

    pub fn record_decoded(&self, size: usize) {
        self.touch();
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_processed.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_transformed(&self, size: usize) {
        self.touch();
        self.frames_transformed.fetch_add(1, Ordering::Relaxed);
        self.bytes_processed.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub fn record_rendered(&self) {
        self.touch();
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_codec_failure(&self) {
        self.codec_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_failure(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_failure(&self) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    pub fn frames_transformed(&self) -> u64 {
        self.frames_transformed.load(Ordering::Relaxed)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed.load(Ordering::Relaxed)
    }

    pub fn codec_failures(&self) -> u64 {
        self.codec_failures.load(Ordering::Relaxed)
    }

    pub fn render_failures(&self) -> u64 {
        self.render_failures.load(Ordering::Relaxed)
    }

    pub fn source_failures(&self) -> u64 {
        self.source_failures.load(Ordering::Relaxed)
    }

    /// Get the timestamp of the last frame activity (Unix microseconds)
    pub fn last_frame_time(&self) -> u64 {
        self.last_frame_time.load(Ordering::Relaxed)
    }

    /// Check if the pipeline has stalled (no frames for given duration)
    pub fn is_stalled(&self, threshold: Duration) -> bool {
        let elapsed_micros = now_micros().saturating_sub(self.last_frame_time());
        elapsed_micros > threshold.as_micros() as u64
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_decoded: self.frames_decoded(),
            frames_transformed: self.frames_transformed(),
            frames_rendered: self.frames_rendered(),
            bytes_processed: self.bytes_processed(),
            codec_failures: self.codec_failures(),
            render_failures: self.render_failures(),
            source_failures: self.source_failures(),
        }
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub frames_decoded: u64,
    pub frames_transformed: u64,
    pub frames_rendered: u64,
    pub bytes_processed: u64,
    pub codec_failures: u64,
    pub render_failures: u64,
    pub source_failures: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} decoded, {} converted, {} displayed, {} bytes, {} codec failures, {} render failures, {} source failures",
            self.frames_decoded,
            self.frames_transformed,
            self.frames_rendered,
            self.bytes_processed,
            self.codec_failures,
            self.render_failures,
            self.source_failures
        )
    }
}

/// Log a health summary every `interval` until `cancel` fires
pub async fn log_periodically(
    health: Arc<PipelineHealth>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                debug!("Pipeline {}", health.summary());
                if health.is_stalled(interval) {
                    debug!("Pipeline: no frame activity for {:?}", interval);
                }
            }
        }
    }
}
