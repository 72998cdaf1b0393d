use crate::image_pipeline::codec::NormalizedTensor;

/// Boundary with the learned denoiser.
///
/// `infer` blocks until the output is ready and must return a tensor of the same shape. The
/// engine may parallelize internally; it is shared by every save worker.
pub trait InferenceEngine: Send + Sync {
    fn infer(&self, input: &NormalizedTensor) -> anyhow::Result<NormalizedTensor>;

    fn name(&self) -> &str {
        "inference-engine"
    }
}

/// Returns its input unchanged.
pub struct PassthroughEngine;

impl InferenceEngine for PassthroughEngine {
    fn infer(&self, input: &NormalizedTensor) -> anyhow::Result<NormalizedTensor> {
        Ok(input.clone())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}
