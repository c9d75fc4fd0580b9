pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Mid-gray fill used for letterbox borders.
pub const LETTERBOX_COLOR: u8 = 114;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Pixel value mapping applied after letterboxing, per RGB channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Normalization {
    /// `v / 255`, giving values in `[0, 1]`.
    #[default]
    Unit,
    /// `(v / 255 - mean[c]) / std[c]`.
    MeanStd { mean: [f32; 3], std: [f32; 3] },
}

impl Normalization {
    pub const IMAGENET: Normalization = Normalization::MeanStd {
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    };

    /// Per-channel `(mean, std)` pairs.
    pub(crate) fn channel_params(&self) -> ([f32; 3], [f32; 3]) {
        match *self {
            Normalization::Unit => ([0.0; 3], [1.0; 3]),
            Normalization::MeanStd { mean, std } => (mean, std),
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        let (mean, std) = self.channel_params();
        mean.iter().all(|m| m.is_finite()) && std.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}

/// Byte order of interleaved source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    #[default]
    Rgb,
    Bgr,
}
