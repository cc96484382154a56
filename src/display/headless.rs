use image::DynamicImage;
use log::info;

use super::Renderer;
use crate::error::RenderError;

/// Renderer without a screen: reports every frame in the log
#[derive(Debug, Default)]
pub struct LogRenderer {
    shown: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl Renderer for LogRenderer {
    fn show(&mut self, image: &DynamicImage) -> Result<(), RenderError> {
        info!(
            "Displaying frame {} ({}x{})",
            self.shown,
            image.width(),
            image.height()
        );
        self.shown += 1;
        Ok(())
    }

    fn close(&mut self) {
        info!("Finished displaying {} frames", self.shown);
    }
}
