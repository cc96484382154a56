//! Frame acquisition
//!
//! The extract stage pulls decoded images from a [`FrameSource`] one at a
//! time, in source order. Container demuxing is left to external tools: the
//! shipped source reads a directory of still frames.

mod sequence;

use image::DynamicImage;

use crate::error::SourceError;

pub use sequence::ImageSequenceSource;

/// What an opened source reports about itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    /// Number of frames, when known up front
    pub frame_count: Option<usize>,
}

/// Sequential, forward-only reader of decoded frames
///
/// Calls block; the pipeline drives sources from its blocking worker pool.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<SourceInfo, SourceError>;

    /// Next frame in source order, or `Ok(None)` once the source is exhausted
    fn read_next(&mut self) -> Result<Option<DynamicImage>, SourceError>;
}
