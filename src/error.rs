//! Error kinds reported by the pipeline collaborators

use std::fmt;

/// Failure of the frame source.
///
/// Reaching the end of the source is not an error: `FrameSource::read_next`
/// returns `Ok(None)` for that.
#[derive(Debug)]
pub enum SourceError {
    /// The source could not be opened at all
    Open(String),
    /// The source failed mid-stream
    Read(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Open(msg) => write!(f, "source open error: {msg}"),
            SourceError::Read(msg) => write!(f, "source read error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Open(err.to_string())
    }
}

/// Failure to encode, decode or transform a single frame.
#[derive(Debug)]
pub enum CodecError {
    Encode(String),
    Decode(String),
    Transform(String),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(msg) => write!(f, "encode error: {msg}"),
            CodecError::Decode(msg) => write!(f, "decode error: {msg}"),
            CodecError::Transform(msg) => write!(f, "transform error: {msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<base64::DecodeError> for CodecError {
    fn from(err: base64::DecodeError) -> Self {
        CodecError::Decode(err.to_string())
    }
}

/// Failure to hand a frame to the display.
#[derive(Debug)]
pub struct RenderError(pub String);

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "render error: {}", self.0)
    }
}

impl std::error::Error for RenderError {}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError(err.to_string())
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError(err.to_string())
    }
}

/// Reason a channel wait ended without an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The pipeline was cancelled while waiting
    Cancelled,
    /// The other end went away without completing the stream
    Disconnected,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Cancelled => write!(f, "channel wait cancelled"),
            ChannelError::Disconnected => write!(f, "channel peer disconnected"),
        }
    }
}

impl std::error::Error for ChannelError {}
