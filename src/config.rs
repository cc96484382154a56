use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde::{Deserialize, Serialize};

use crate::assets::{
    DEFAULT_BUFFER_SIZE, DEFAULT_FRAME_DELAY_MS, DEFAULT_JPEG_QUALITY, DEFAULT_SOURCE,
    MAX_BUFFER_SIZE,
};
use crate::codec::{FrameFormat, ImageCodec};
use crate::pipeline::PipelineOptions;

/// Runtime settings
///
/// Built from the defaults, then an optional JSON file, then the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Slots per channel
    pub buffer_size: usize,
    /// Target time between displayed frames
    pub frame_delay_ms: u64,
    /// Directory holding the clip's frames
    pub source: PathBuf,
    pub debug: bool,
    /// Transport encoding between stages
    pub format: FrameFormat,
    pub jpeg_quality: u8,
    /// Write displayed frames to this directory instead of logging them
    pub output: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buffer_size: DEFAULT_BUFFER_SIZE,
            frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            source: PathBuf::from(DEFAULT_SOURCE),
            debug: false,
            format: FrameFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            output: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Resolve the configuration from parsed command-line arguments
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(source) = matches.get_one::<PathBuf>("source") {
            config.source = source.clone();
        }
        if let Some(size) = matches.get_one::<usize>("buffer-size") {
            config.buffer_size = *size;
        }
        if let Some(delay) = matches.get_one::<u64>("frame-delay") {
            config.frame_delay_ms = *delay;
        }
        if let Some(format) = matches.get_one::<String>("format") {
            config.format = format.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(quality) = matches.get_one::<u8>("quality") {
            config.jpeg_quality = *quality;
        }
        if let Some(output) = matches.get_one::<PathBuf>("output") {
            config.output = Some(output.clone());
        }
        if matches.get_flag("debug") {
            config.debug = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            bail!("buffer size must be at least 1");
        }
        if self.buffer_size > MAX_BUFFER_SIZE {
            bail!(
                "buffer size must be at most {}, got {}",
                MAX_BUFFER_SIZE,
                self.buffer_size
            );
        }
        if self.frame_delay_ms == 0 {
            bail!("frame delay must be at least 1 ms");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("jpeg quality must be within 1..=100, got {}", self.jpeg_quality);
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            capacity: self.buffer_size,
            frame_interval: self.frame_interval(),
            ..PipelineOptions::default()
        }
    }

    /// Codec used between stages; debug runs carry frames as base64 text
    pub fn codec(&self) -> ImageCodec {
        ImageCodec::new(self.format, self.jpeg_quality).with_base64(self.debug)
    }
}

/// Command-line interface
pub fn cli() -> Command {
    Command::new(app_name())
        .version(version())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .help("Directory with the clip's frames, played in file name order.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file; command-line flags take precedence.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("buffer-size")
                .short('b')
                .long("buffer-size")
                .value_name("FRAMES")
                .help("Capacity of each channel between stages.")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("frame-delay")
                .short('d')
                .long("frame-delay")
                .value_name("MS")
                .help("Target delay between displayed frames, in milliseconds.")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .help("Encoding of frames between stages (jpeg/png).")
                .ignore_case(true)
                .value_parser(["jpeg", "jpg", "png"]),
        )
        .arg(
            Arg::new("quality")
                .short('q')
                .long("quality")
                .value_name("QUALITY")
                .help("JPEG quality, 1 to 100.")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Write displayed frames as PNG files into this directory.")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Verbose logging and base64 frame transport.")
                .action(ArgAction::SetTrue),
        )
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
