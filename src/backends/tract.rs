//! Tract session for segmentation models
//!
//! Pure Rust inference with no native runtime. Tract needs concrete input
//! facts to optimize a graph, so dynamic spatial dims are pinned to the
//! configured default input size before optimization.

use crate::error::{Result, SmartCutError};
use crate::inference::{InferenceSession, TensorSpec};
use crate::tensor::{NamedTensors, Tensor as SmartTensor};
use instant::Instant;
use std::path::Path;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;
use tract_onnx::tract_hir::internal::DimLike;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backed inference session
#[derive(Debug)]
pub struct TractSession {
    model: TractModel,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
}

impl TractSession {
    /// Load, pin and optimize a model from disk
    ///
    /// `default_size` is (height, width), used for the input's spatial dims
    /// when the model leaves them symbolic.
    ///
    /// # Errors
    /// - `SessionInitFailure` when Tract cannot parse, type or optimize the model
    pub fn open(model_path: &Path, default_size: (u32, u32)) -> Result<Self> {
        let load_start = Instant::now();
        let load_err = |stage: &str, e: &dyn std::fmt::Display| {
            SmartCutError::session_init(format!(
                "Tract failed to {stage} '{}': {e}",
                model_path.display()
            ))
        };

        let mut model = onnx()
            .model_for_path(model_path)
            .map_err(|e| load_err("load", &e))?;

        let input_outlets = model
            .input_outlets()
            .map_err(|e| load_err("inspect inputs of", &e))?
            .to_vec();
        let output_outlets = model
            .output_outlets()
            .map_err(|e| load_err("inspect outputs of", &e))?
            .to_vec();

        let mut inputs = Vec::with_capacity(input_outlets.len());
        for (index, outlet) in input_outlets.into_iter().enumerate() {
            let spec = outlet_spec(&model, outlet).map_err(|e| load_err("read input fact of", &e))?;

            // U2-Net family inputs are NCHW f32; pin symbolic dims before optimizing
            let declared = &spec.shape;
            let pinned = [
                declared.first().copied().flatten().unwrap_or(1),
                declared.get(1).copied().flatten().unwrap_or(3),
                declared
                    .get(2)
                    .copied()
                    .flatten()
                    .unwrap_or(default_size.0 as usize),
                declared
                    .get(3)
                    .copied()
                    .flatten()
                    .unwrap_or(default_size.1 as usize),
            ];
            if declared.len() == 4 {
                model
                    .set_input_fact(index, f32::fact(pinned).into())
                    .map_err(|e| load_err("pin input shape of", &e))?;
            }
            inputs.push(spec);
        }

        let outputs = output_outlets
            .into_iter()
            .map(|outlet| outlet_spec(&model, outlet))
            .collect::<TractResult<Vec<_>>>()
            .map_err(|e| load_err("read output fact of", &e))?;

        let model = model
            .into_optimized()
            .map_err(|e| load_err("optimize", &e))?
            .into_runnable()
            .map_err(|e| load_err("prepare", &e))?;

        log::info!("Tract backend initialized");
        log::debug!("  - Model: {}", model_path.display());
        log::debug!("  - Inputs: {:?}", inputs);
        log::debug!("  - Outputs: {:?}", outputs);
        log::info!(
            "Model loaded in {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            model,
            inputs,
            outputs,
        })
    }
}

/// Name and declared shape of a graph outlet
///
/// ONNX graph inputs and outputs are addressed by tensor name, which tract
/// keeps as the outlet label. The producing node's name is only a fallback.
fn outlet_spec(model: &InferenceModel, outlet: OutletId) -> TractResult<TensorSpec> {
    let name = model
        .outlet_label(outlet)
        .map_or_else(|| model.node(outlet.node).name.clone(), str::to_owned);
    let shape = model
        .outlet_fact(outlet)?
        .shape
        .dims()
        .map(|dim| dim.concretize().and_then(|d| d.to_usize().ok()))
        .collect();
    Ok(TensorSpec::new(name, shape))
}

impl InferenceSession for TractSession {
    fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors> {
        let inference_start = Instant::now();

        // Tract feeds inputs positionally, in declared order
        let mut feeds: TVec<TValue> = TVec::new();
        for spec in &self.inputs {
            let tensor = inputs.get(&spec.name).ok_or_else(|| {
                SmartCutError::inference(format!("Missing input tensor '{}'", spec.name))
            })?;
            let data: Vec<f32> = tensor.as_array().iter().copied().collect();
            let feed = Tensor::from_shape(tensor.shape(), &data).map_err(|e| {
                SmartCutError::inference(format!("Failed to build input '{}': {e}", spec.name))
            })?;
            feeds.push(feed.into());
        }

        let outputs = self
            .model
            .run(feeds)
            .map_err(|e| SmartCutError::inference(format!("Tract inference failed: {e}")))?;

        let mut result = NamedTensors::new();
        for (spec, value) in self.outputs.iter().zip(outputs) {
            let view = value.to_array_view::<f32>().map_err(|e| {
                SmartCutError::inference(format!(
                    "Failed to convert output tensor '{}': {e}",
                    spec.name
                ))
            })?;
            let shape: Vec<usize> = view.shape().to_vec();
            let data: Vec<f32> = view.iter().copied().collect();
            result.insert(spec.name.clone(), SmartTensor::from_shape_vec(&shape, data)?);
        }

        log::debug!(
            "Tract inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(result)
    }

    fn backend_name(&self) -> &'static str {
        "tract"
    }
}
