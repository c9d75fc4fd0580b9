use crate::error::{Error, Result};
use crate::processing::{decode::OutputLayout, post::PostProcessor};
use preprocess::{DEFAULT_INPUT_SIZE, LetterboxPreprocessor, PadPolicy};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

pub use common::Environment;

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub environment: Environment,
    pub input_size: (u32, u32),
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub layout: OutputLayout,
    pub pad_policy: PadPolicy,
    pub clip_boxes: bool,
}

impl DetectorConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// A variable that is set but cannot be parsed is an error, not a fallback.
    pub fn from_env() -> Result<Self> {
        let environment = Environment::from_env();

        let input_width = parse_var("INPUT_WIDTH", DEFAULT_INPUT_SIZE.0)?;
        let input_height = parse_var("INPUT_HEIGHT", DEFAULT_INPUT_SIZE.1)?;
        let score_threshold = parse_var("SCORE_THRESHOLD", DEFAULT_SCORE_THRESHOLD)?;
        let iou_threshold = parse_var("IOU_THRESHOLD", DEFAULT_IOU_THRESHOLD)?;
        let layout = parse_var("OUTPUT_LAYOUT", OutputLayout::default())?;
        let pad_policy = parse_var("PAD_POLICY", PadPolicy::default())?;
        let clip_boxes = parse_var("CLIP_BOXES", false)?;

        let config = Self {
            environment,
            input_size: (input_width, input_height),
            score_threshold,
            iou_threshold,
            layout,
            pad_policy,
            clip_boxes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_size.0 == 0 || self.input_size.1 == 0 {
            return Err(Error::Configuration(format!(
                "input size must be positive, got {}x{}",
                self.input_size.0, self.input_size.1
            )));
        }
        // Threshold checks live with the postprocessor.
        self.build_postprocessor().map(|_| ())
    }

    pub fn build_preprocessor(&self) -> Result<LetterboxPreprocessor> {
        Ok(LetterboxPreprocessor::new(self.input_size)?.with_pad_policy(self.pad_policy))
    }

    pub fn build_postprocessor(&self) -> Result<PostProcessor> {
        Ok(
            PostProcessor::new(self.layout, self.score_threshold, self.iou_threshold)?
                .with_clip_boxes(self.clip_boxes),
        )
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            input_size: DEFAULT_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            layout: OutputLayout::default(),
            pad_policy: PadPolicy::default(),
            clip_boxes: false,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            Error::Configuration(format!("{}={:?} could not be parsed: {}", name, raw, e))
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(Error::Configuration(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "ENVIRONMENT",
        "INPUT_WIDTH",
        "INPUT_HEIGHT",
        "SCORE_THRESHOLD",
        "IOU_THRESHOLD",
        "OUTPUT_LAYOUT",
        "PAD_POLICY",
        "CLIP_BOXES",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();

        let config = DetectorConfig::from_env().unwrap();
        assert_eq!(config, DetectorConfig::default());
    }

    #[test]
    #[serial]
    fn test_reads_all_variables() {
        clear_env();
        unsafe {
            env::set_var("ENVIRONMENT", "prod");
            env::set_var("INPUT_WIDTH", "416");
            env::set_var("INPUT_HEIGHT", "320");
            env::set_var("SCORE_THRESHOLD", "0.25");
            env::set_var("IOU_THRESHOLD", "0.7");
            env::set_var("OUTPUT_LAYOUT", "yolov8");
            env::set_var("PAD_POLICY", "bottom-right");
            env::set_var("CLIP_BOXES", "true");
        }

        let config = DetectorConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.input_size, (416, 320));
        assert_eq!(config.score_threshold, 0.25);
        assert_eq!(config.iou_threshold, 0.7);
        assert_eq!(config.layout, OutputLayout::Yolov8);
        assert_eq!(config.pad_policy, PadPolicy::BottomRight);
        assert!(config.clip_boxes);
    }

    #[test]
    #[serial]
    fn test_unparsable_value_is_an_error() {
        clear_env();
        unsafe { env::set_var("INPUT_WIDTH", "wide") };

        let err = DetectorConfig::from_env().unwrap_err();
        clear_env();

        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("INPUT_WIDTH"));
    }

    #[test]
    #[serial]
    fn test_out_of_range_threshold_is_an_error() {
        clear_env();
        unsafe { env::set_var("IOU_THRESHOLD", "0") };

        let err = DetectorConfig::from_env().unwrap_err();
        clear_env();

        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_zero_input_size() {
        let config = DetectorConfig {
            input_size: (640, 0),
            ..DetectorConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_builders_carry_configuration() {
        let config = DetectorConfig {
            pad_policy: PadPolicy::BottomRight,
            clip_boxes: true,
            layout: OutputLayout::Yolov5,
            ..DetectorConfig::default()
        };

        let pre = config.build_preprocessor().unwrap();
        assert_eq!(pre.pad_policy(), PadPolicy::BottomRight);

        let post = config.build_postprocessor().unwrap();
        assert_eq!(post.layout(), OutputLayout::Yolov5);
        assert!(post.clip_boxes());
        assert_eq!(post.iou_threshold(), DEFAULT_IOU_THRESHOLD);
    }
}
