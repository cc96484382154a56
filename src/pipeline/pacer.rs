//! Frame pacing for the presentation stage

use std::time::Duration;

use tokio::time::Instant;

/// Shortest wait between two frames, even when processing overran the interval
pub const MIN_FRAME_WAIT: Duration = Duration::from_millis(1);

/// Keeps displayed frames on a fixed cadence
///
/// The pacer measures the time spent since the previous frame was retrieved
/// and tells the presenter how long to wait so that consecutive frames are one
/// interval apart. When processing already took longer than the interval the
/// wait is clamped to [`MIN_FRAME_WAIT`]: cadence slips, but the wait is never
/// negative or skipped.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    mark: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            mark: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait needed after `elapsed` of processing
    pub fn wait_for(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed).max(MIN_FRAME_WAIT)
    }

    /// Processing time since the last [`FramePacer::restart`]
    pub fn elapsed(&self) -> Duration {
        self.mark.elapsed()
    }

    /// Wait needed right now
    pub fn next_wait(&self) -> Duration {
        self.wait_for(self.elapsed())
    }

    /// Start measuring the next frame
    pub fn restart(&mut self) {
        self.mark = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_processing_waits_remainder() {
        let pacer = FramePacer::new(Duration::from_millis(42));
        assert_eq!(
            pacer.wait_for(Duration::from_millis(10)),
            Duration::from_millis(32)
        );
        assert_eq!(pacer.wait_for(Duration::ZERO), Duration::from_millis(42));
    }

    #[test]
    fn test_slow_processing_clamped_to_floor() {
        let pacer = FramePacer::new(Duration::from_millis(42));
        assert_eq!(pacer.wait_for(Duration::from_millis(42)), MIN_FRAME_WAIT);
        assert_eq!(pacer.wait_for(Duration::from_millis(500)), MIN_FRAME_WAIT);
    }

    #[test]
    fn test_wait_never_below_floor() {
        let pacer = FramePacer::new(Duration::from_millis(5));
        for ms in 0..20 {
            let wait = pacer.wait_for(Duration::from_millis(ms));
            assert!(wait >= MIN_FRAME_WAIT);
            assert!(wait <= Duration::from_millis(5));
        }
    }

    #[tokio::test]
    async fn test_restart_resets_elapsed() {
        let mut pacer = FramePacer::new(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pacer.next_wait() <= Duration::from_millis(30));

        pacer.restart();
        assert!(pacer.elapsed() < Duration::from_millis(20));
        assert!(pacer.next_wait() > Duration::from_millis(30));
    }
}
