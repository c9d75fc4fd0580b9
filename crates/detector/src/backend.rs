use ndarray::ArrayD;

/// The network engine, seen from the detection core.
///
/// Implementations own model loading and device placement; the core only
/// hands over the `[1, 3, H, W]` input tensor and decodes what comes back
/// according to the configured [`OutputLayout`](crate::OutputLayout).
pub trait InferenceBackend {
    /// Run one forward pass.
    fn forward(&mut self, input: &ArrayD<f32>) -> anyhow::Result<InferenceOutput>;
}

/// Raw output tensors in the order the network emits them.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
    pub tensors: Vec<ArrayD<f32>>,
}

impl InferenceOutput {
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Self { tensors }
    }
}

impl<F> InferenceBackend for F
where
    F: FnMut(&ArrayD<f32>) -> anyhow::Result<InferenceOutput>,
{
    fn forward(&mut self, input: &ArrayD<f32>) -> anyhow::Result<InferenceOutput> {
        self(input)
    }
}
