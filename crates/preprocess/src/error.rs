use thiserror::Error;

pub type Result<T> = std::result::Result<T, PreprocessError>;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("invalid input image: {0}")]
    InvalidInput(String),

    #[error("invalid preprocessor configuration: {0}")]
    Configuration(String),

    #[error("image buffer error: {0}")]
    Buffer(#[from] fast_image_resize::ImageBufferError),

    #[error("resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
