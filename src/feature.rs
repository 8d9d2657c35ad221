//! Appearance-embedding extraction.
//!
//! One crop in, one L2-normalized feature vector out. The crop is resized to
//! the model's fixed input (no letterbox), channel-normalized with ImageNet
//! constants, and pushed through the backend in a single call.

use anyhow::{anyhow, Result};
use ndarray::{Array4, ArrayD};

use crate::frame::{FilterType, Frame};
use crate::infer::InferenceBackend;

/// Dense appearance vector, L2-normalized unless the raw output was all zero.
pub type Embedding = Vec<f32>;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
pub const DEFAULT_INPUT_WIDTH: u32 = 128;
pub const DEFAULT_INPUT_HEIGHT: u32 = 256;

/// Extractor settings, fixed at construction.
#[derive(Clone, Copy, Debug)]
pub struct ExtractorConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            input_width: DEFAULT_INPUT_WIDTH,
            input_height: DEFAULT_INPUT_HEIGHT,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// Embedding extractor over an inference backend.
pub struct FeatureExtractor {
    backend: Box<dyn InferenceBackend>,
    config: ExtractorConfig,
    input_name: String,
    output_name: String,
}

impl FeatureExtractor {
    pub fn new(backend: Box<dyn InferenceBackend>, config: ExtractorConfig) -> Result<Self> {
        let input_name = backend
            .inputs()
            .first()
            .map(|meta| meta.name.clone())
            .ok_or_else(|| anyhow!("extractor backend declares no inputs"))?;
        let output_name = backend
            .outputs()
            .first()
            .map(|meta| meta.name.clone())
            .ok_or_else(|| anyhow!("extractor backend declares no outputs"))?;
        Ok(Self {
            backend,
            config,
            input_name,
            output_name,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract one embedding from a crop.
    ///
    /// A zero-area crop is an input error. A backend that does not return
    /// exactly one tensor is a contract violation.
    pub fn extract(&mut self, crop: &Frame) -> Result<Embedding> {
        if crop.is_empty() {
            return Err(anyhow!("cannot extract features from an empty crop"));
        }

        let resized = crop.resize(
            self.config.input_width,
            self.config.input_height,
            FilterType::Triangle,
        )?;
        let tensor = self.input_tensor(&resized);

        let outputs = self
            .backend
            .run(&[&self.output_name], &[(&self.input_name, tensor)])?;
        if outputs.len() != 1 {
            return Err(anyhow!(
                "extractor backend returned {} tensors, expected exactly 1",
                outputs.len()
            ));
        }

        // Squeeze the batch dimension; whatever shape remains is flattened
        // into the embedding vector.
        let mut embedding: Embedding = outputs[0].iter().copied().collect();
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        Ok(embedding)
    }

    fn input_tensor(&self, resized: &Frame) -> ArrayD<f32> {
        let mean = self.config.mean;
        let std = self.config.std;
        Array4::from_shape_fn(
            (
                1,
                3,
                self.config.input_height as usize,
                self.config.input_width as usize,
            ),
            |(_, channel, y, x)| {
                (resized.pixel_f32(x as u32, y as u32)[channel] - mean[channel]) / std[channel]
            },
        )
        .into_dyn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::StubBackend;
    use ndarray::IxDyn;

    fn small_config() -> ExtractorConfig {
        ExtractorConfig {
            input_width: 4,
            input_height: 8,
            ..ExtractorConfig::default()
        }
    }

    fn extractor_with(response: Vec<ArrayD<f32>>) -> FeatureExtractor {
        let backend = StubBackend::new("images", "features").with_response(response);
        FeatureExtractor::new(Box::new(backend), small_config()).unwrap()
    }

    #[test]
    fn output_is_unit_length() {
        let raw = ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let mut extractor = extractor_with(vec![raw]);
        let crop = Frame::filled(6, 10, 100).unwrap();

        let embedding = extractor.extract(&crop).unwrap();
        assert_eq!(embedding.len(), 4);
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((embedding[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_output_stays_zero_without_nan() {
        let raw = ArrayD::zeros(IxDyn(&[1, 4]));
        let mut extractor = extractor_with(vec![raw]);
        let crop = Frame::filled(6, 10, 100).unwrap();

        let embedding = extractor.extract(&crop).unwrap();
        assert!(embedding.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn empty_crop_is_an_input_error() {
        let raw = ArrayD::zeros(IxDyn(&[1, 4]));
        let mut extractor = extractor_with(vec![raw]);
        let crop = Frame::filled(0, 10, 0).unwrap();
        assert!(extractor.extract(&crop).is_err());
    }

    #[test]
    fn wrong_tensor_count_is_a_contract_violation() {
        let raw = vec![ArrayD::zeros(IxDyn(&[1, 4])), ArrayD::zeros(IxDyn(&[1, 4]))];
        let mut extractor = extractor_with(raw);
        let crop = Frame::filled(6, 10, 100).unwrap();
        assert!(extractor.extract(&crop).is_err());
    }
}
