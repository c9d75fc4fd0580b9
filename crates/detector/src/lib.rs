pub mod backend;
pub mod config;
pub mod detector;
pub mod error;
pub mod logging;
pub mod processing;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::DetectorConfig;
pub use detector::Detector;
pub use error::{Error, Result};
pub use processing::{
    decode::{Candidate, OutputLayout},
    nms,
    post::{Detection, PostProcessor},
};
pub use preprocess::{
    BoundingBox, ColorFormat, LetterboxPreprocessor, LetterboxTransform, PadPolicy, Padding,
    PreparedImage, Preprocess, SourceImage,
};
