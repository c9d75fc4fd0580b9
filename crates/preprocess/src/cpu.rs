use crate::config::{ColorFormat, DEFAULT_INPUT_SIZE, LETTERBOX_COLOR, Normalization};
use crate::error::{PreprocessError, Result};
use crate::transform::{LetterboxTransform, PadPolicy};
use crate::{PreparedImage, Preprocess, SourceImage};
use common::{span, span_debug};
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use ndarray::{Array, IxDyn};
use std::borrow::Cow;

/// Letterbox preprocessor running on the host.
///
/// Holds configuration only, so one instance can be shared across threads.
#[derive(Debug, Clone)]
pub struct LetterboxPreprocessor {
    input_size: (u32, u32),
    pad_policy: PadPolicy,
    pad_value: u8,
    normalization: Normalization,
}

impl LetterboxPreprocessor {
    pub fn new(input_size: (u32, u32)) -> Result<Self> {
        if input_size.0 == 0 || input_size.1 == 0 {
            return Err(PreprocessError::Configuration(format!(
                "target dimensions must be positive, got {}x{}",
                input_size.0, input_size.1
            )));
        }
        if canvas_len(input_size).is_none() {
            return Err(PreprocessError::Configuration(format!(
                "target {}x{} is too large to allocate",
                input_size.0, input_size.1
            )));
        }

        Ok(Self {
            input_size,
            pad_policy: PadPolicy::default(),
            pad_value: LETTERBOX_COLOR,
            normalization: Normalization::default(),
        })
    }

    pub fn with_pad_policy(mut self, pad_policy: PadPolicy) -> Self {
        self.pad_policy = pad_policy;
        self
    }

    pub fn with_pad_value(mut self, pad_value: u8) -> Self {
        self.pad_value = pad_value;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Result<Self> {
        if !normalization.is_valid() {
            return Err(PreprocessError::Configuration(format!(
                "normalization needs finite mean and positive std, got {:?}",
                normalization
            )));
        }
        self.normalization = normalization;
        Ok(self)
    }

    pub fn pad_policy(&self) -> PadPolicy {
        self.pad_policy
    }

    pub fn pad_value(&self) -> u8 {
        self.pad_value
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Resize and pad into an RGB, HWC, `input_size` canvas without normalizing.
    pub fn letterbox(&self, image: &SourceImage) -> Result<(Vec<u8>, LetterboxTransform)> {
        let _s = span!("letterbox");

        image.validate()?;

        tracing::trace!(
            width = image.width,
            height = image.height,
            format = ?image.format,
            "Letterboxing source image"
        );

        let transform = LetterboxTransform::compute(
            (image.width, image.height),
            self.input_size,
            self.pad_policy,
        )?;

        let rgb = to_rgb(image);
        let (new_width, new_height) = transform.resized_size();

        let resized: Cow<[u8]> = if (new_width, new_height) == (image.width, image.height) {
            rgb
        } else {
            Cow::Owned(resize(&rgb, (image.width, image.height), (new_width, new_height))?)
        };

        let len = canvas_len(self.input_size).ok_or_else(|| {
            PreprocessError::Configuration(format!(
                "target {}x{} is too large to allocate",
                self.input_size.0, self.input_size.1
            ))
        })?;
        let mut canvas = vec![self.pad_value; len];

        let stride = self.input_size.0 as usize * 3;
        let row_len = new_width as usize * 3;
        let left = transform.padding.left as usize * 3;
        let top = transform.padding.top as usize;

        for y in 0..new_height as usize {
            let src_row = y * row_len;
            let dst_row = (y + top) * stride + left;
            canvas[dst_row..dst_row + row_len].copy_from_slice(&resized[src_row..src_row + row_len]);
        }

        Ok((canvas, transform))
    }

    /// Map an RGB HWC canvas to a `[1, 3, H, W]` tensor.
    fn normalize(&self, canvas: &[u8]) -> Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = self.input_size.0 as usize;
        let height = self.input_size.1 as usize;
        let spatial = width * height;
        let (mean, std) = self.normalization.channel_params();

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in canvas.chunks_exact(3).enumerate() {
            for c in 0..3 {
                output[i + c * spatial] = (px[c] as f32 / 255.0 - mean[c]) / std[c];
            }
        }

        Ok(Array::from_shape_vec(IxDyn(&[1, 3, height, width]), output)?)
    }
}

impl Default for LetterboxPreprocessor {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            pad_policy: PadPolicy::default(),
            pad_value: LETTERBOX_COLOR,
            normalization: Normalization::default(),
        }
    }
}

impl Preprocess for LetterboxPreprocessor {
    fn preprocess(&self, image: &SourceImage) -> Result<PreparedImage> {
        let (canvas, transform) = self.letterbox(image)?;
        let tensor = self.normalize(&canvas)?;
        Ok(PreparedImage { tensor, transform })
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }
}

/// Byte length of an RGB canvas, `None` when it or the `f32` tensor built from it
/// would not fit in memory.
fn canvas_len((width, height): (u32, u32)) -> Option<usize> {
    let len = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)?;
    let tensor_bytes = len.checked_mul(std::mem::size_of::<f32>())?;
    (tensor_bytes <= isize::MAX as usize).then_some(len)
}

fn to_rgb<'a>(image: &SourceImage<'a>) -> Cow<'a, [u8]> {
    match image.format {
        ColorFormat::Rgb => Cow::Borrowed(image.pixels),
        ColorFormat::Bgr => {
            let mut rgb = Vec::with_capacity(image.pixels.len());
            for px in image.pixels.chunks_exact(3) {
                rgb.extend_from_slice(&[px[2], px[1], px[0]]);
            }
            Cow::Owned(rgb)
        }
    }
}

fn resize(pixels: &[u8], from: (u32, u32), to: (u32, u32)) -> Result<Vec<u8>> {
    let _s = span_debug!("resize");

    let src = ImageRef::new(from.0, from.1, pixels, PixelType::U8x3)?;
    let mut resized = Image::new(to.0, to.1, PixelType::U8x3);

    Resizer::new().resize(
        &src,
        &mut resized,
        &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
    )?;

    Ok(resized.buffer().to_vec())
}
