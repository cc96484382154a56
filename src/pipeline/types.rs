//! Core types for the pipeline system

use bytes::Bytes;

/// Self-contained encoded frame passed between stages
///
/// The payload is opaque to the pipeline; only the codec knows how to turn it
/// back into pixels. Frames carry no sequence number: their position is the
/// order in which they travel through the channels.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    /// Wrap encoded bytes as a frame
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Encoded payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the size of the frame data in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("size", &self.size()).finish()
    }
}

/// One slot of a bounded channel
///
/// End of stream is a variant of its own, never a special payload value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem<T> {
    Frame(T),
    EndOfStream,
}

impl<T> StreamItem<T> {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, StreamItem::EndOfStream)
    }

    pub fn into_frame(self) -> Option<T> {
        match self {
            StreamItem::Frame(frame) => Some(frame),
            StreamItem::EndOfStream => None,
        }
    }
}
