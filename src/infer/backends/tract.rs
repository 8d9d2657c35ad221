//! Tract-based backend for ONNX inference.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::{ArrayD, IxDyn};
use tract_onnx::prelude::*;

use crate::infer::{Device, InferenceBackend, TensorMeta};

/// ONNX inference via tract.
///
/// The model is loaded from a local file with a pinned `[1, 3, H, W]` input
/// fact and optimized once at construction. Tract runs on CPU only; asking
/// for an accelerator is a construction error, never a silent fallback.
pub struct TractBackend {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
    inputs: Vec<TensorMeta>,
    outputs: Vec<TensorMeta>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_width: u32,
        input_height: u32,
        device: Device,
    ) -> Result<Self> {
        if let Device::Cuda { device_index } = device {
            return Err(anyhow!(
                "accelerator inference requested (cuda:{}) but the tract backend runs on CPU only",
                device_index
            ));
        }

        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?;

        // Cache graph input/output names before optimization rewrites nodes.
        let mut inputs = outlet_metadata(&model, model.input_outlets()?)?;
        if let Some(meta) = inputs.first_mut() {
            meta.shape = vec![
                Some(1),
                Some(3),
                Some(input_height as usize),
                Some(input_width as usize),
            ];
        }
        let outputs = outlet_metadata(&model, model.output_outlets()?)?;

        let model = model
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            inputs,
            outputs,
        })
    }
}

fn outlet_metadata(model: &InferenceModel, outlets: &[OutletId]) -> Result<Vec<TensorMeta>> {
    outlets
        .iter()
        .map(|outlet| {
            Ok(TensorMeta {
                name: model.node(outlet.node).name.clone(),
                shape: Vec::new(),
            })
        })
        .collect()
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn inputs(&self) -> &[TensorMeta] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorMeta] {
        &self.outputs
    }

    fn run(
        &mut self,
        output_names: &[&str],
        inputs: &[(&str, ArrayD<f32>)],
    ) -> Result<Vec<ArrayD<f32>>> {
        for requested in output_names {
            if !self.outputs.iter().any(|meta| meta.name == *requested) {
                return Err(anyhow!("model has no output named '{}'", requested));
            }
        }

        // Tract wants inputs in graph order; match by cached name.
        let mut tensors: TVec<TValue> = tvec!();
        for meta in &self.inputs {
            let (_, array) = inputs
                .iter()
                .find(|(name, _)| *name == meta.name)
                .ok_or_else(|| anyhow!("missing input tensor '{}'", meta.name))?;
            let data = array
                .as_slice()
                .ok_or_else(|| anyhow!("input tensor '{}' is not contiguous", meta.name))?;
            let tensor = Tensor::from_shape(array.shape(), data)
                .context("failed to build tract input tensor")?;
            tensors.push(tensor.into());
        }

        let results = self.model.run(tensors).context("ONNX inference failed")?;

        results
            .into_iter()
            .map(|tensor| {
                let shape = tensor.shape().to_vec();
                let data = tensor
                    .as_slice::<f32>()
                    .context("model output tensor was not f32")?
                    .to_vec();
                ArrayD::from_shape_vec(IxDyn(&shape), data)
                    .context("model output shape mismatch")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuda_request_fails_at_construction() {
        let err = TractBackend::new(
            "model/does_not_matter.onnx",
            640,
            640,
            Device::Cuda { device_index: 0 },
        )
        .unwrap_err();
        assert!(err.to_string().contains("CPU only"));
    }

    #[test]
    fn missing_model_file_fails_at_construction() {
        let err =
            TractBackend::new("model/definitely_missing.onnx", 640, 640, Device::Cpu).unwrap_err();
        assert!(err.to_string().contains("failed to load ONNX model"));
    }
}
