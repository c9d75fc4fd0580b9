use crate::error::{PreprocessError, Result};
use crate::geometry::BoundingBox;
use std::str::FromStr;

/// Where the letterbox borders go.
///
/// With `Center`, an odd total padding puts the extra pixel on the trailing
/// side (right or bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PadPolicy {
    #[default]
    Center,
    BottomRight,
}

impl PadPolicy {
    /// Split `total` into `(leading, trailing)`.
    pub fn split(self, total: u32) -> (u32, u32) {
        match self {
            PadPolicy::Center => {
                let leading = total / 2;
                (leading, total - leading)
            }
            PadPolicy::BottomRight => (0, total),
        }
    }
}

impl FromStr for PadPolicy {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "center" | "centre" => Ok(PadPolicy::Center),
            "bottom-right" => Ok(PadPolicy::BottomRight),
            other => Err(PreprocessError::Configuration(format!(
                "unknown pad policy '{}' (expected center or bottom-right)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Geometry of one letterbox operation.
///
/// `input = source * scale + (padding.left, padding.top)`, and the resized
/// content plus padding fills `input_size` exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub padding: Padding,
    pub source_size: (u32, u32),
    pub input_size: (u32, u32),
}

impl LetterboxTransform {
    pub fn compute(source_size: (u32, u32), input_size: (u32, u32), policy: PadPolicy) -> Result<Self> {
        let (width, height) = source_size;
        let (input_width, input_height) = input_size;

        if width == 0 || height == 0 {
            return Err(PreprocessError::InvalidInput(format!(
                "source image has zero dimension ({}x{})",
                width, height
            )));
        }
        if input_width == 0 || input_height == 0 {
            return Err(PreprocessError::Configuration(format!(
                "target dimensions must be positive, got {}x{}",
                input_width, input_height
            )));
        }

        let scale =
            (input_width as f32 / width as f32).min(input_height as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).min(input_width);
        let new_height = ((height as f32 * scale).round() as u32).min(input_height);

        // A zero axis cannot be padded back out without breaking the inverse scale.
        if new_width == 0 || new_height == 0 {
            return Err(PreprocessError::InvalidInput(format!(
                "source {}x{} is too elongated for a {}x{} target",
                width, height, input_width, input_height
            )));
        }

        let (left, right) = policy.split(input_width - new_width);
        let (top, bottom) = policy.split(input_height - new_height);

        Ok(Self {
            scale,
            padding: Padding {
                left,
                top,
                right,
                bottom,
            },
            source_size,
            input_size,
        })
    }

    /// Size of the resized image before padding.
    pub fn resized_size(&self) -> (u32, u32) {
        (
            self.input_size.0 - self.padding.left - self.padding.right,
            self.input_size.1 - self.padding.top - self.padding.bottom,
        )
    }

    /// Region of the input tensor covered by image content.
    pub fn content_rect(&self) -> BoundingBox {
        let (w, h) = self.resized_size();
        BoundingBox::from_xywh(
            self.padding.left as f32,
            self.padding.top as f32,
            w as f32,
            h as f32,
        )
    }

    #[inline]
    pub fn to_input(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale + self.padding.left as f32,
            y * self.scale + self.padding.top as f32,
        )
    }

    #[inline]
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.padding.left as f32) / self.scale,
            (y - self.padding.top as f32) / self.scale,
        )
    }

    pub fn box_to_input(&self, b: &BoundingBox) -> BoundingBox {
        let (x1, y1) = self.to_input(b.x1, b.y1);
        let (x2, y2) = self.to_input(b.x2, b.y2);
        BoundingBox::new(x1, y1, x2, y2)
    }

    pub fn box_to_source(&self, b: &BoundingBox) -> BoundingBox {
        let (x1, y1) = self.to_source(b.x1, b.y1);
        let (x2, y2) = self.to_source(b.x2, b.y2);
        BoundingBox::new(x1, y1, x2, y2)
    }
}
