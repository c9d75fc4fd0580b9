use crate::{
    backend::InferenceBackend,
    config::DetectorConfig,
    error::{Error, Result},
    processing::post::{Detection, PostProcessor},
};
use common::span;
use ndarray::{Array, IxDyn};
use preprocess::{LetterboxPreprocessor, Preprocess, SourceImage};
use std::time::Instant;

/// Preprocess, forward pass, postprocess.
pub struct Detector<B, P = LetterboxPreprocessor> {
    preprocessor: P,
    backend: B,
    postprocessor: PostProcessor,
}

impl<B: InferenceBackend> Detector<B> {
    pub fn from_config(config: &DetectorConfig, backend: B) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.build_preprocessor()?,
            backend,
            config.build_postprocessor()?,
        ))
    }
}

impl<B: InferenceBackend, P: Preprocess> Detector<B, P> {
    pub fn new(preprocessor: P, backend: B, postprocessor: PostProcessor) -> Self {
        Self {
            preprocessor,
            backend,
            postprocessor,
        }
    }

    pub fn preprocessor(&self) -> &P {
        &self.preprocessor
    }

    pub fn postprocessor(&self) -> &PostProcessor {
        &self.postprocessor
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn detect(&mut self, image: &SourceImage) -> Result<Vec<Detection>> {
        let _s = span!("detect");
        let start = Instant::now();

        let prepared = self.preprocessor.preprocess(image)?;
        let output = self
            .backend
            .forward(&prepared.tensor)
            .map_err(Error::Backend)?;
        let detections = self
            .postprocessor
            .postprocess(&output.tensors, &prepared.transform)?;

        tracing::debug!(
            width = image.width,
            height = image.height,
            detections = detections.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Detection complete"
        );

        Ok(detections)
    }

    /// Run `rounds` forward passes on a zero tensor so lazy backend setup
    /// happens before the first real frame.
    pub fn warmup(&mut self, rounds: usize) -> Result<()> {
        let (width, height) = self.preprocessor.input_size();
        let input = Array::<f32, _>::zeros(IxDyn(&[1, 3, height as usize, width as usize]));

        for round in 0..rounds {
            self.backend.forward(&input).map_err(Error::Backend)?;
            tracing::trace!(round, "Warmup pass complete");
        }

        tracing::info!(rounds, width, height, "Backend warmed up");
        Ok(())
    }
}
