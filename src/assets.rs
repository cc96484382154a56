use std::time::Duration;

// channels
pub const DEFAULT_BUFFER_SIZE: usize = 10;
pub const MAX_BUFFER_SIZE: usize = 4096;

// presentation, ~24 fps
pub const DEFAULT_FRAME_DELAY_MS: u64 = 42;

pub const DEFAULT_SOURCE: &str = "clip";

// transport encoding
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

pub const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

// quit key read from stdin
pub const QUIT_KEY: &str = "q";
