//! Frame pipeline
//!
//! Three stages hand frames to each other through bounded channels:
//!
//! ```text
//! FrameSource → ExtractStage → [channel] → ConvertStage → [channel] → DisplayStage → Renderer
//! ```
//!
//! - Each stage runs in its own task and implements `PipelineStage`
//! - Channels apply backpressure: a fast producer blocks until its consumer
//!   frees a slot
//! - End of stream travels through the channels as the last item, so every
//!   stage finishes after the frames that precede it
//! - One cancellation token, fired by the user or by the display stage,
//!   releases every wait in the pipeline
//! - Health counters are shared by all stages

pub mod channel;
pub mod convert_stage;
pub mod coordinator;
pub mod display_stage;
pub mod extract_stage;
pub mod health;
pub mod pacer;
pub mod stage;
pub mod state;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{BoundedChannel, FrameReceiver, FrameSender, channel};
pub use coordinator::{Pipeline, PipelineOptions, PipelineReport, RunningPipeline, StageReport};
pub use health::{HealthSummary, PipelineHealth};
pub use pacer::FramePacer;
pub use stage::PipelineStage;
pub use state::{StageState, StopReason};
pub use types::{Frame, StreamItem};
