//! ONNX Runtime session for segmentation models
//!
//! Wraps an `ort` session behind [`InferenceSession`]. The model file is
//! loaded once; declared input and output metadata are captured at open time
//! so name resolution never has to touch the runtime again.

use crate::error::{Result, SmartCutError};
use crate::inference::{InferenceSession, TensorSpec};
use crate::tensor::{NamedTensors, Tensor};
use instant::Instant;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputValue};
use ort::value::ValueType;
use std::borrow::Cow;
use std::path::Path;

/// ONNX Runtime backed inference session
#[derive(Debug)]
pub struct OnnxSession {
    session: Session,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
}

impl OnnxSession {
    /// Load a model from disk
    ///
    /// `intra_threads` of 0 uses all available cores.
    ///
    /// # Errors
    /// - `SessionInitFailure` when the runtime rejects the file or its options
    pub fn open(model_path: &Path, intra_threads: usize) -> Result<Self> {
        let load_start = Instant::now();

        let intra_threads = if intra_threads > 0 {
            intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        let session = Session::builder()
            .map_err(|e| {
                SmartCutError::session_init(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                SmartCutError::session_init(format!("Failed to set optimization level: {e}"))
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| SmartCutError::session_init(format!("Failed to set intra threads: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                SmartCutError::session_init(format!(
                    "Failed to load model '{}': {e}",
                    model_path.display()
                ))
            })?;

        let inputs: Vec<TensorSpec> = session
            .inputs
            .iter()
            .map(|input| spec_from(&input.name, &input.input_type))
            .collect();
        let outputs: Vec<TensorSpec> = session
            .outputs
            .iter()
            .map(|output| spec_from(&output.name, &output.output_type))
            .collect();

        log::debug!("ONNX Runtime session created");
        log::debug!("  - Model: {}", model_path.display());
        log::debug!("  - Threading: {intra_threads} intra-op threads");
        log::debug!("  - Optimization level: Level3");
        for spec in &inputs {
            log::debug!("  - Input '{}': {:?}", spec.name, spec.shape);
        }
        for spec in &outputs {
            log::debug!("  - Output '{}': {:?}", spec.name, spec.shape);
        }
        log::info!(
            "Model loaded in {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            session,
            inputs,
            outputs,
        })
    }
}

fn spec_from(name: &str, value_type: &ValueType) -> TensorSpec {
    let shape = match value_type {
        ValueType::Tensor { shape, .. } => shape
            .iter()
            .map(|&dim| usize::try_from(dim).ok().filter(|&d| d > 0))
            .collect(),
        _ => Vec::new(),
    };
    TensorSpec::new(name, shape)
}

impl InferenceSession for OnnxSession {
    fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors> {
        let conversion_start = Instant::now();
        let mut feeds: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = Vec::with_capacity(inputs.len());
        for (name, tensor) in inputs {
            log::debug!("Input '{}' shape: {:?}", name, tensor.shape());
            let value = ort::value::Tensor::from_array(tensor.into_array()).map_err(|e| {
                SmartCutError::inference(format!("Failed to convert input tensor '{name}': {e}"))
            })?;
            feeds.push((Cow::Owned(name), value.into()));
        }
        let conversion_time = conversion_start.elapsed();

        let core_start = Instant::now();
        let outputs = self
            .session
            .run(feeds)
            .map_err(|e| SmartCutError::inference(format!("ONNX inference failed: {e}")))?;
        let core_time = core_start.elapsed();

        let mut result = NamedTensors::new();
        let names: Vec<String> = outputs.keys().map(ToString::to_string).collect();
        for name in names {
            let value = outputs.get(name.as_str()).ok_or_else(|| {
                SmartCutError::inference(format!("Output tensor '{name}' disappeared"))
            })?;
            let array = value.try_extract_array::<f32>().map_err(|e| {
                SmartCutError::inference(format!("Failed to extract output tensor '{name}': {e}"))
            })?;
            result.insert(name, Tensor::new(array.to_owned()));
        }

        log::debug!(
            "ONNX inference: conversion {:.2}ms, core {:.2}ms, {} output(s)",
            conversion_time.as_secs_f64() * 1000.0,
            core_time.as_secs_f64() * 1000.0,
            result.len()
        );

        Ok(result)
    }

    fn backend_name(&self) -> &'static str {
        "onnx"
    }
}
