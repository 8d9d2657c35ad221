//! Inference backend boundary.
//!
//! The neural networks behind detection and feature extraction are opaque to
//! this crate: a backend takes named f32 tensors and returns f32 tensors from
//! a precompiled graph. Everything model-specific (architecture, weights,
//! numeric precision) lives behind [`InferenceBackend`].

mod backends;

pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;

use anyhow::Result;
use ndarray::ArrayD;

/// Compute device, chosen once at construction.
///
/// Backends that cannot provide a requested accelerator must fail at
/// construction instead of silently falling back to CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda { device_index: u32 },
}

/// Metadata for one graph input or output, cached at load time.
#[derive(Clone, Debug)]
pub struct TensorMeta {
    pub name: String,
    /// Declared dimensions; `None` marks a dynamic dimension. Empty when the
    /// graph does not declare a shape.
    pub shape: Vec<Option<usize>>,
}

/// Opaque run-model-on-tensor service.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Graph input metadata, in graph order.
    fn inputs(&self) -> &[TensorMeta];

    /// Graph output metadata, in graph order.
    fn outputs(&self) -> &[TensorMeta];

    /// Run the graph. `inputs` maps input names to tensors; the returned
    /// tensors correspond to `output_names` in order. Calls are synchronous
    /// and blocking.
    fn run(
        &mut self,
        output_names: &[&str],
        inputs: &[(&str, ArrayD<f32>)],
    ) -> Result<Vec<ArrayD<f32>>>;
}
