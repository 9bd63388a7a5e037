//! In-memory inference session for testing and debugging
//!
//! `MockSession` answers `run` with a caller-supplied closure, so tests can
//! exercise every output layout the pipeline understands without a model file.

use crate::error::Result;
use crate::inference::{InferenceSession, TensorSpec};
use crate::tensor::{NamedTensors, Tensor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Responder = Box<dyn FnMut(&NamedTensors) -> Result<NamedTensors> + Send>;

/// Mock session for tests and dry runs
pub struct MockSession {
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    responder: Responder,
    calls: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("calls", &self.calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MockSession {
    pub fn new<F>(inputs: Vec<TensorSpec>, outputs: Vec<TensorSpec>, responder: F) -> Self
    where
        F: FnMut(&NamedTensors) -> Result<NamedTensors> + Send + 'static,
    {
        Self {
            inputs,
            outputs,
            responder: Box::new(responder),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Session with one `input` of `(1,3,h,w)` that always returns `tensor` as `output`
    #[must_use]
    pub fn returning(input_height: usize, input_width: usize, tensor: Tensor) -> Self {
        let output_spec = TensorSpec::fixed("output", tensor.shape());
        Self::new(
            vec![TensorSpec::fixed("input", &[1, 3, input_height, input_width])],
            vec![output_spec],
            move |_| Ok(std::iter::once(("output", tensor.clone())).collect()),
        )
    }

    /// U2-Net shaped session whose mask is the red channel of its input
    ///
    /// Useful for end-to-end checks: a red subject on a black background
    /// comes back as an opaque subject on a transparent background.
    #[must_use]
    pub fn red_channel(input_height: usize, input_width: usize) -> Self {
        Self::new(
            vec![TensorSpec::fixed("input", &[1, 3, input_height, input_width])],
            vec![TensorSpec::fixed("output", &[1, 1, input_height, input_width])],
            move |inputs| {
                let (_, input) = inputs.first().ok_or_else(|| {
                    crate::error::SmartCutError::inference("Mock session received no inputs")
                })?;
                let red = input
                    .view()
                    .slice_axis(ndarray::Axis(1), ndarray::Slice::from(0..1))
                    .to_owned();
                Ok(std::iter::once(("output", Tensor::new(red))).collect())
            },
        )
    }

    /// Shared counter of `run` calls, still readable after the session is boxed
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl InferenceSession for MockSession {
    fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        log::debug!("Mock inference with inputs {:?}", inputs.names());
        (self.responder)(&inputs)
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }
}
