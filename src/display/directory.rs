use std::path::PathBuf;

use image::{DynamicImage, ImageFormat};
use log::debug;

use super::Renderer;
use crate::error::RenderError;

/// Renderer that writes each displayed frame as a numbered PNG file
pub struct DirectoryRenderer {
    dir: PathBuf,
    next_index: u64,
}

impl DirectoryRenderer {
    /// Create the output directory if needed
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, next_index: 0 })
    }

    fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{index:05}.png"))
    }
}

impl Renderer for DirectoryRenderer {
    fn show(&mut self, image: &DynamicImage) -> Result<(), RenderError> {
        let path = self.frame_path(self.next_index);
        // the index advances even on failure so file names keep matching frame order
        self.next_index += 1;
        image.save_with_format(&path, ImageFormat::Png)?;
        debug!("DirectoryRenderer: wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_writes_numbered_frames() {
        let dir = std::env::temp_dir().join(format!("graypipe-{}-render", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut renderer = DirectoryRenderer::create(&dir).unwrap();
        for level in [10u8, 20] {
            let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([level])));
            renderer.show(&image).unwrap();
        }

        let second = image::open(dir.join("frame_00001.png")).unwrap();
        assert_eq!(second.to_luma8().get_pixel(0, 0).0[0], 20);
        assert!(dir.join("frame_00000.png").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
