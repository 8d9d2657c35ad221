//! Stub backend for testing. Replays canned output tensors.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use ndarray::ArrayD;

use crate::infer::{InferenceBackend, TensorMeta};

/// Canned-response backend.
///
/// Responses are consumed in FIFO order, one per `run` call. Running with an
/// unknown input name or an empty queue is an error, so tests exercising the
/// fail-fast contract behave like a real backend would.
pub struct StubBackend {
    inputs: Vec<TensorMeta>,
    outputs: Vec<TensorMeta>,
    responses: VecDeque<Vec<ArrayD<f32>>>,
    calls: u64,
}

impl StubBackend {
    pub fn new(input_name: &str, output_name: &str) -> Self {
        Self {
            inputs: vec![TensorMeta {
                name: input_name.to_string(),
                shape: Vec::new(),
            }],
            outputs: vec![TensorMeta {
                name: output_name.to_string(),
                shape: Vec::new(),
            }],
            responses: VecDeque::new(),
            calls: 0,
        }
    }

    /// Queue the tensors returned by the next `run` call.
    pub fn push_response(&mut self, tensors: Vec<ArrayD<f32>>) {
        self.responses.push_back(tensors);
    }

    /// Builder form of [`push_response`](Self::push_response).
    pub fn with_response(mut self, tensors: Vec<ArrayD<f32>>) -> Self {
        self.push_response(tensors);
        self
    }

    /// Number of `run` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn inputs(&self) -> &[TensorMeta] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorMeta] {
        &self.outputs
    }

    fn run(
        &mut self,
        _output_names: &[&str],
        inputs: &[(&str, ArrayD<f32>)],
    ) -> Result<Vec<ArrayD<f32>>> {
        for (name, _) in inputs {
            if !self.inputs.iter().any(|meta| meta.name == *name) {
                return Err(anyhow!("stub backend has no input named '{}'", name));
            }
        }
        self.calls += 1;
        self.responses
            .pop_front()
            .ok_or_else(|| anyhow!("stub backend has no canned response left"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn replays_responses_in_order() {
        let mut backend = StubBackend::new("images", "output0")
            .with_response(vec![ArrayD::zeros(IxDyn(&[1, 2]))])
            .with_response(vec![ArrayD::ones(IxDyn(&[1, 2]))]);

        let input = ArrayD::zeros(IxDyn(&[1]));
        let first = backend.run(&["output0"], &[("images", input.clone())]).unwrap();
        assert_eq!(first[0][[0, 0]], 0.0);
        let second = backend.run(&["output0"], &[("images", input.clone())]).unwrap();
        assert_eq!(second[0][[0, 0]], 1.0);
        assert_eq!(backend.calls(), 2);

        // Queue exhausted.
        assert!(backend.run(&["output0"], &[("images", input)]).is_err());
    }

    #[test]
    fn rejects_unknown_input_name() {
        let mut backend =
            StubBackend::new("images", "output0").with_response(vec![ArrayD::zeros(IxDyn(&[1]))]);
        let input = ArrayD::zeros(IxDyn(&[1]));
        assert!(backend.run(&["output0"], &[("wrong", input)]).is_err());
    }
}
