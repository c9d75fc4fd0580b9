pub mod config;
pub mod cpu;
pub mod error;
pub mod geometry;
pub mod transform;

use ndarray::ArrayD;

pub use config::{ColorFormat, DEFAULT_INPUT_SIZE, LETTERBOX_COLOR, Normalization};
pub use cpu::LetterboxPreprocessor;
pub use error::{PreprocessError, Result};
pub use geometry::BoundingBox;
pub use transform::{LetterboxTransform, PadPolicy, Padding};

/// Borrowed view of an interleaved 8-bit, 3-channel image.
#[derive(Debug, Clone, Copy)]
pub struct SourceImage<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
}

impl<'a> SourceImage<'a> {
    pub fn new(pixels: &'a [u8], width: u32, height: u32, format: ColorFormat) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
        }
    }

    pub fn rgb(pixels: &'a [u8], width: u32, height: u32) -> Self {
        Self::new(pixels, width, height, ColorFormat::Rgb)
    }

    pub fn bgr(pixels: &'a [u8], width: u32, height: u32) -> Self {
        Self::new(pixels, width, height, ColorFormat::Bgr)
    }

    /// Rejects empty images and buffers that do not hold exactly `width * height * 3` bytes.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PreprocessError::InvalidInput(format!(
                "source image has zero dimension ({}x{})",
                self.width, self.height
            )));
        }

        let expected_size = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| {
                PreprocessError::InvalidInput(format!(
                    "image dimensions {}x{} overflow",
                    self.width, self.height
                ))
            })?;

        if self.pixels.len() != expected_size {
            return Err(PreprocessError::InvalidInput(format!(
                "buffer size mismatch: expected {} bytes for {}x{}x3, got {}",
                expected_size,
                self.width,
                self.height,
                self.pixels.len()
            )));
        }

        Ok(())
    }
}

impl<'a> From<&'a image::RgbImage> for SourceImage<'a> {
    fn from(img: &'a image::RgbImage) -> Self {
        Self::rgb(img.as_raw(), img.width(), img.height())
    }
}

/// Network-ready tensor and the geometry needed to map detections back.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// `[1, 3, H, W]`, RGB, normalized.
    pub tensor: ArrayD<f32>,
    pub transform: LetterboxTransform,
}

/// Trait for image preprocessing implementations
pub trait Preprocess {
    /// Letterbox and normalize `image` into the network input tensor.
    fn preprocess(&self, image: &SourceImage) -> Result<PreparedImage>;

    /// Get the input size this preprocessor targets
    fn input_size(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_size_mismatch() {
        let pixels = vec![0u8; 200];
        let err = SourceImage::rgb(&pixels, 10, 10).validate().unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidInput(_)));
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn test_validate_rejects_empty_image() {
        let err = SourceImage::rgb(&[], 0, 10).validate().unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidInput(_)));
    }

    #[test]
    fn test_from_rgb_image() {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([1, 2, 3]));
        let src = SourceImage::from(&img);
        assert_eq!((src.width, src.height), (4, 3));
        assert_eq!(src.format, ColorFormat::Rgb);
        assert_eq!(src.pixels.len(), 36);
        assert!(src.validate().is_ok());
    }
}
