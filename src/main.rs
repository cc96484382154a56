use crate::assets::QUIT_KEY;
use crate::capture::ImageSequenceSource;
use crate::codec::Grayscale;
use crate::config::{Config, app_name, cli, version};
use crate::display::{DirectoryRenderer, LogRenderer, Renderer};
use crate::pipeline::{Pipeline, StopReason};
use anyhow::{Context, Result, bail};
use log::{info, warn};
use std::io::BufRead;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::LevelFilter;

pub mod assets;
pub mod capture;
pub mod codec;
pub mod config;
pub mod display;
pub mod error;
pub mod pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = Config::from_matches(&matches)?;

    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .init();

    info!("{} {}", app_name(), version());
    info!(
        "Playing {} ({} slots per channel, {} ms per frame, {} transport)",
        config.source.display(),
        config.buffer_size,
        config.frame_delay_ms,
        config.format
    );

    // Ctrl-C and the quit key both stop the pipeline without draining it
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        on_interrupt.cancel();
    })
    .context("Error setting Ctrl-C handler")?;
    watch_quit_key(cancel.clone());

    let renderer: Box<dyn Renderer> = match &config.output {
        Some(dir) => Box::new(DirectoryRenderer::create(dir)?),
        None => Box::new(LogRenderer::new()),
    };

    let report = Pipeline::new(
        &config.pipeline_options(),
        Box::new(ImageSequenceSource::new(&config.source)),
        Arc::new(config.codec()),
        Arc::new(Grayscale),
        renderer,
        cancel,
    )
    .run()
    .await?;

    if report.completed() {
        info!("Playback finished");
    } else if report.reason_of("DisplayStage") == Some(StopReason::Cancelled) {
        info!("Playback stopped");
    }

    if report.reason_of("ExtractStage") == Some(StopReason::SourceFailure) {
        bail!("could not read {}", config.source.display());
    }
    if report.health.codec_failures > 0 || report.health.render_failures > 0 {
        warn!(
            "{} frames dropped",
            report.health.codec_failures + report.health.render_failures
        );
    }
    Ok(())
}

/// Cancel once the quit key is entered on stdin.
///
/// Reading stdin blocks, so the watcher lives on its own detached thread and
/// simply ends with the process.
fn watch_quit_key(cancel: CancellationToken) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case(QUIT_KEY) {
                info!("Quit key pressed");
                cancel.cancel();
                break;
            }
        }
    });
}
