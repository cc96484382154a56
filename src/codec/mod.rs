//! Single-frame image codec
//!
//! Turns decoded images into self-contained [`Frame`]s that can travel
//! through the pipeline channels, and back. Frames are JPEG or PNG files in
//! memory, optionally wrapped in base64 text so they stay printable while
//! debugging.

pub mod transform;

use std::borrow::Cow;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::pipeline::Frame;

pub use transform::{FrameTransform, Grayscale};

/// Encode and decode frames for transport between stages
///
/// Implementations must be deterministic and free of side effects; the
/// pipeline calls them from its blocking worker pool.
pub trait FrameCodec: Send + Sync {
    fn encode(&self, image: &DynamicImage) -> Result<Frame, CodecError>;

    fn decode(&self, frame: &Frame) -> Result<DynamicImage, CodecError>;
}

/// Container format of an encoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    #[default]
    Jpeg,
    Png,
}

impl FrameFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            FrameFormat::Jpeg => ImageFormat::Jpeg,
            FrameFormat::Png => ImageFormat::Png,
        }
    }
}

impl FromStr for FrameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(FrameFormat::Jpeg),
            "png" => Ok(FrameFormat::Png),
            other => Err(format!("unknown frame format: {other}")),
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameFormat::Jpeg => write!(f, "jpeg"),
            FrameFormat::Png => write!(f, "png"),
        }
    }
}

/// [`FrameCodec`] backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageCodec {
    format: FrameFormat,
    quality: u8,
    base64: bool,
}

impl ImageCodec {
    pub fn new(format: FrameFormat, quality: u8) -> Self {
        Self {
            format,
            quality: quality.clamp(1, 100),
            base64: false,
        }
    }

    pub fn jpeg(quality: u8) -> Self {
        Self::new(FrameFormat::Jpeg, quality)
    }

    pub fn png() -> Self {
        Self::new(FrameFormat::Png, 100)
    }

    /// Wrap encoded frames in base64 text
    pub fn with_base64(mut self, enabled: bool) -> Self {
        self.base64 = enabled;
        self
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn encode_base64(&self) -> bool {
        self.base64
    }

    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
        let mut buffer = Vec::new();
        match self.format {
            FrameFormat::Jpeg => {
                let image = jpeg_compatible(image);
                JpegEncoder::new_with_quality(&mut buffer, self.quality).write_image(
                    image.as_bytes(),
                    image.width(),
                    image.height(),
                    image.color().into(),
                )?;
            }
            FrameFormat::Png => {
                let image = png_compatible(image);
                PngEncoder::new(&mut buffer).write_image(
                    image.as_bytes(),
                    image.width(),
                    image.height(),
                    image.color().into(),
                )?;
            }
        }
        Ok(buffer)
    }
}

impl FrameCodec for ImageCodec {
    fn encode(&self, image: &DynamicImage) -> Result<Frame, CodecError> {
        let encoded = self
            .encode_image(image)
            .map_err(|e| CodecError::Encode(e.to_string()))?;

        if self.base64 {
            Ok(Frame::new(STANDARD.encode(&encoded).into_bytes()))
        } else {
            Ok(Frame::new(encoded))
        }
    }

    fn decode(&self, frame: &Frame) -> Result<DynamicImage, CodecError> {
        let encoded: Cow<'_, [u8]> = if self.base64 {
            Cow::Owned(STANDARD.decode(frame.data())?)
        } else {
            Cow::Borrowed(frame.data())
        };

        image::load_from_memory_with_format(&encoded, self.format.image_format())
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// JPEG only stores 8-bit gray or RGB; alpha is dropped
fn jpeg_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => Cow::Owned(DynamicImage::ImageLuma8(image.to_luma8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

/// PNG takes every integer layout; float images are quantized to 8 bits
fn png_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => Cow::Borrowed(image),
        _ => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, 128])
        }))
    }

    #[test]
    fn test_png_is_lossless() {
        let codec = ImageCodec::png();
        let image = gradient(8, 6);

        let frame = codec.encode(&image).unwrap();
        let decoded = codec.decode(&frame).unwrap();

        assert_eq!(decoded.to_rgb8(), image.to_rgb8());
    }

    #[test]
    fn test_jpeg_keeps_dimensions_and_gray_level() {
        let codec = ImageCodec::jpeg(95);
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 8, Luma([200])));

        let frame = codec.encode(&gray).unwrap();
        assert_eq!(&frame.data()[..2], &[0xFF, 0xD8]);

        let decoded = codec.decode(&frame).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
        let value = decoded.to_luma8().get_pixel(3, 3).0[0];
        assert!(value.abs_diff(200) <= 2);
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let codec = ImageCodec::jpeg(90);
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 40])));

        let decoded = codec.decode(&codec.encode(&rgba).unwrap()).unwrap();
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn test_base64_frames_are_printable() {
        let codec = ImageCodec::png().with_base64(true);
        let image = gradient(4, 4);

        let frame = codec.encode(&image).unwrap();
        assert!(frame.data().iter().all(|b| b.is_ascii_graphic()));
        assert_eq!(codec.decode(&frame).unwrap().to_rgb8(), image.to_rgb8());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let codec = ImageCodec::jpeg(95);
        let err = codec.decode(&Frame::new(vec![1u8, 2, 3])).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));

        let text_codec = ImageCodec::png().with_base64(true);
        let err = text_codec.decode(&Frame::new(b"not base64!".to_vec())).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JPG".parse::<FrameFormat>(), Ok(FrameFormat::Jpeg));
        assert_eq!("png".parse::<FrameFormat>(), Ok(FrameFormat::Png));
        assert!("gif".parse::<FrameFormat>().is_err());
        assert_eq!(FrameFormat::Png.to_string(), "png");
    }
}
