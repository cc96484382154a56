//! Per-frame image transformations

use image::DynamicImage;

use crate::error::CodecError;

/// Pure one-frame-in, one-frame-out transformation applied by the convert stage
pub trait FrameTransform: Send + Sync {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, CodecError>;

    fn name(&self) -> &'static str;
}

/// Color to 8-bit luma conversion
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl FrameTransform for Grayscale {
    fn apply(&self, image: DynamicImage) -> Result<DynamicImage, CodecError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CodecError::Transform("empty image".to_string()));
        }
        Ok(DynamicImage::ImageLuma8(image.to_luma8()))
    }

    fn name(&self) -> &'static str {
        "grayscale"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_grayscale_output_is_luma() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([255, 0, 0])));
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([255, 255, 255])));

        let gray_red = Grayscale.apply(red).unwrap();
        let gray_white = Grayscale.apply(white).unwrap();

        assert!(matches!(gray_red, DynamicImage::ImageLuma8(_)));
        assert_eq!((gray_red.width(), gray_red.height()), (3, 2));
        assert_eq!(gray_white.to_luma8().get_pixel(0, 0).0[0], 255);

        let red_level = gray_red.to_luma8().get_pixel(1, 1).0[0];
        assert!(red_level > 0 && red_level < 255);
    }

    #[test]
    fn test_empty_image_rejected() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            Grayscale.apply(empty),
            Err(CodecError::Transform(_))
        ));
    }
}
