use preprocess::PreprocessError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error("malformed network output: {0}")]
    MalformedOutput(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("inference backend failed: {0:#}")]
    Backend(anyhow::Error),
}
