//! Display sinks for the presentation stage

mod directory;
mod headless;

use image::DynamicImage;

use crate::error::RenderError;

pub use directory::DirectoryRenderer;
pub use headless::LogRenderer;

/// Shows decoded frames
///
/// `show` must return once the frame has been handed to the display, so that
/// the presenter's pacing measures real work.
pub trait Renderer: Send {
    fn show(&mut self, image: &DynamicImage) -> Result<(), RenderError>;

    /// Whether the user asked to stop through this renderer's own UI
    fn quit_requested(&self) -> bool {
        false
    }

    /// Release display resources once presentation is over
    fn close(&mut self) {}
}
