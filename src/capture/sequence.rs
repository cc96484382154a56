use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::debug;

use super::{FrameSource, SourceInfo};
use crate::error::SourceError;

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reads every image file of a directory, ordered by file name
///
/// Name the frames with zero-padded numbers (`frame_0001.jpg`, ...) so the
/// lexicographic order is the playback order.
pub struct ImageSequenceSource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
    opened: bool,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pending: VecDeque::new(),
            opened: false,
        }
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<SourceInfo, SourceError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| SourceError::Open(format!("{}: {e}", self.dir.display())))?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        frames.sort();

        debug!(
            "ImageSequenceSource: {} frames in {}",
            frames.len(),
            self.dir.display()
        );

        let frame_count = frames.len();
        self.pending = frames.into();
        self.opened = true;

        Ok(SourceInfo {
            name: self.dir.display().to_string(),
            frame_count: Some(frame_count),
        })
    }

    fn read_next(&mut self) -> Result<Option<DynamicImage>, SourceError> {
        if !self.opened {
            return Err(SourceError::Read("source was not opened".to_string()));
        }

        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        image::open(&path)
            .map(Some)
            .map_err(|e| SourceError::Read(format!("{}: {e}", path.display())))
    }
}
