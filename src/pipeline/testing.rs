//! In-memory collaborators for pipeline tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};
use tokio::time::Instant;

use crate::capture::{FrameSource, SourceInfo};
use crate::codec::{FrameTransform, Grayscale};
use crate::display::Renderer;
use crate::error::{CodecError, RenderError, SourceError};

/// 4x4 gray frame carrying `tag` in its first two pixels
pub fn tagged(tag: u16) -> DynamicImage {
    let [hi, lo] = tag.to_be_bytes();
    DynamicImage::ImageLuma8(GrayImage::from_fn(4, 4, |x, y| match (x, y) {
        (0, 0) => Luma([hi]),
        (1, 0) => Luma([lo]),
        _ => Luma([128]),
    }))
}

pub fn read_tag(image: &DynamicImage) -> u16 {
    let gray = image.to_luma8();
    u16::from_be_bytes([gray.get_pixel(0, 0).0[0], gray.get_pixel(1, 0).0[0]])
}

pub struct MemorySource {
    frames: VecDeque<DynamicImage>,
    fail_open: bool,
    fail_after: Option<usize>,
    delivered: usize,
}

impl MemorySource {
    pub fn tagged(tags: impl IntoIterator<Item = u16>) -> Self {
        Self {
            frames: tags.into_iter().map(tagged).collect(),
            fail_open: false,
            fail_after: None,
            delivered: 0,
        }
    }

    pub fn unopenable() -> Self {
        Self {
            fail_open: true,
            ..Self::tagged([])
        }
    }

    /// Fail mid-stream once `count` frames were delivered
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl FrameSource for MemorySource {
    fn open(&mut self) -> Result<SourceInfo, SourceError> {
        if self.fail_open {
            return Err(SourceError::Open("no such clip".to_string()));
        }
        Ok(SourceInfo {
            name: "memory".to_string(),
            frame_count: Some(self.frames.len()),
        })
    }

    fn read_next(&mut self) -> Result<Option<DynamicImage>, SourceError> {
        if self.fail_after == Some(self.delivered) {
            return Err(SourceError::Read("truncated clip".to_string()));
        }
        let next = self.frames.pop_front();
        if next.is_some() {
            self.delivered += 1;
        }
        Ok(next)
    }
}

/// Grayscale that rejects one tagged frame
pub struct FlakyTransform {
    pub fail_tag: u16,
}

impl FrameTransform for FlakyTransform {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, CodecError> {
        if read_tag(&image) == self.fail_tag {
            return Err(CodecError::Transform(format!("frame {} rejected", self.fail_tag)));
        }
        Grayscale.apply(image)
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// What a [`RecordingRenderer`] saw, shared with the test body
#[derive(Default)]
pub struct RenderLog {
    pub tags: Vec<u16>,
    pub shown_at: Vec<Instant>,
    pub grayscale: bool,
    pub closed: bool,
}

pub struct RecordingRenderer {
    log: Arc<Mutex<RenderLog>>,
    quit_after: Option<usize>,
    fail_on: Option<u16>,
    delay: Duration,
    shown: usize,
}

impl RecordingRenderer {
    pub fn new() -> (Self, Arc<Mutex<RenderLog>>) {
        let log = Arc::new(Mutex::new(RenderLog {
            grayscale: true,
            ..RenderLog::default()
        }));
        let renderer = Self {
            log: Arc::clone(&log),
            quit_after: None,
            fail_on: None,
            delay: Duration::ZERO,
            shown: 0,
        };
        (renderer, log)
    }

    /// Ask to quit once `count` frames were shown
    pub fn quitting_after(mut self, count: usize) -> Self {
        self.quit_after = Some(count);
        self
    }

    pub fn failing_on(mut self, tag: u16) -> Self {
        self.fail_on = Some(tag);
        self
    }

    /// Spend `delay` inside every `show`
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Renderer for RecordingRenderer {
    fn show(&mut self, image: &DynamicImage) -> Result<(), RenderError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.shown += 1;

        let tag = read_tag(image);
        if self.fail_on == Some(tag) {
            return Err(RenderError(format!("frame {tag} lost")));
        }

        let mut log = self.log.lock().unwrap();
        log.tags.push(tag);
        log.shown_at.push(Instant::now());
        log.grayscale &= matches!(image, DynamicImage::ImageLuma8(_));
        Ok(())
    }

    fn quit_requested(&self) -> bool {
        self.quit_after.is_some_and(|count| self.shown >= count)
    }

    fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}
