//! Inference engine boundary
//!
//! The pipeline never talks to a runtime directly. An [`InferenceSession`]
//! describes its inputs and outputs once and then runs forward passes on
//! named tensors. A [`SessionFactory`] opens sessions from a configuration.

use crate::config::{BackendType, RemovalConfig};
use crate::error::{Result, SmartCutError};
use crate::tensor::NamedTensors;
use crate::utils::validation::ModelValidator;

/// Declared name and shape of a model input or output
///
/// `None` marks a dynamic (symbolic or negative) dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<Option<usize>>,
}

impl TensorSpec {
    pub fn new<S: Into<String>>(name: S, shape: Vec<Option<usize>>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Spec with all dimensions static
    pub fn fixed<S: Into<String>>(name: S, shape: &[usize]) -> Self {
        Self::new(name, shape.iter().copied().map(Some).collect())
    }

    /// Static (height, width) of an NCHW image input, if both are declared
    #[must_use]
    pub fn spatial_dims(&self) -> Option<(usize, usize)> {
        match self.shape.as_slice() {
            [_, _, Some(h), Some(w)] if *h > 0 && *w > 0 => Some((*h, *w)),
            _ => None,
        }
    }
}

/// An opened model, ready to run
///
/// Implementations are not required to be safe for concurrent `run` calls;
/// the processor serializes access behind a mutex.
pub trait InferenceSession: Send {
    /// Declared model inputs, in model order
    fn inputs(&self) -> &[TensorSpec];

    /// Declared model outputs, in model order
    fn outputs(&self) -> &[TensorSpec];

    /// Run one forward pass
    ///
    /// # Errors
    /// - Engine runtime failure
    /// - Input tensors that the model rejects
    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors>;

    /// Short engine identifier for diagnostics
    fn backend_name(&self) -> &'static str;
}

/// Resolved input/output names and spatial input resolution of a session
///
/// Computed once when the session is opened and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIoSpec {
    pub input_name: String,
    pub output_name: String,
    pub input_height: u32,
    pub input_width: u32,
}

impl ModelIoSpec {
    /// Resolve names and input resolution from a session's declared metadata
    ///
    /// The input is the first whose name case-insensitively equals one of
    /// `config.preferred_input_names`, else the first input; outputs use
    /// `config.preferred_output_names` the same way. Dynamic spatial input
    /// dims fall back to `config.default_input_size`.
    ///
    /// # Errors
    /// - Session declares no inputs or no outputs
    pub fn resolve(session: &dyn InferenceSession, config: &RemovalConfig) -> Result<Self> {
        let input = pick_by_name(session.inputs(), &config.preferred_input_names)
            .ok_or_else(|| SmartCutError::session_init("Model declares no inputs"))?;
        let output = pick_by_name(session.outputs(), &config.preferred_output_names)
            .ok_or_else(|| SmartCutError::session_init("Model declares no outputs"))?;

        let (default_h, default_w) = config.default_input_size;
        let (input_height, input_width) = match input.spatial_dims() {
            Some((h, w)) => (
                u32::try_from(h).map_err(|_| {
                    SmartCutError::session_init(format!("Declared input height {} too large", h))
                })?,
                u32::try_from(w).map_err(|_| {
                    SmartCutError::session_init(format!("Declared input width {} too large", w))
                })?,
            ),
            None => {
                log::debug!(
                    "Input '{}' has dynamic spatial dims {:?}, using {}x{}",
                    input.name,
                    input.shape,
                    default_h,
                    default_w
                );
                (default_h, default_w)
            },
        };

        Ok(Self {
            input_name: input.name.clone(),
            output_name: output.name.clone(),
            input_height,
            input_width,
        })
    }

    /// (height, width)
    #[must_use]
    pub fn input_size(&self) -> (u32, u32) {
        (self.input_height, self.input_width)
    }
}

fn pick_by_name<'a>(specs: &'a [TensorSpec], preferred: &[String]) -> Option<&'a TensorSpec> {
    specs
        .iter()
        .find(|spec| {
            preferred
                .iter()
                .any(|name| spec.name.eq_ignore_ascii_case(name))
        })
        .or_else(|| specs.first())
}

/// Factory trait for opening inference sessions
pub trait SessionFactory: Send + Sync {
    /// Open a session for `config.model_path` using `config.backend`
    ///
    /// # Errors
    /// - `ModelMissing` / `ModelCorrupt` from model-file diagnostics
    /// - `SessionInitFailure` when the engine rejects the model or is not compiled in
    fn open(&self, config: &RemovalConfig) -> Result<Box<dyn InferenceSession>>;

    /// Backends this factory can open
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Opens sessions with the engines compiled into this build
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionFactory;

impl SessionFactory for DefaultSessionFactory {
    fn open(&self, config: &RemovalConfig) -> Result<Box<dyn InferenceSession>> {
        ModelValidator::validate_model_file(&config.model_path)?;

        match config.backend {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxSession::open(
                &config.model_path,
                config.intra_threads,
            )?)),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractSession::open(
                &config.model_path,
                config.default_input_size,
            )?)),
            #[allow(unreachable_patterns)]
            other => {
                let available: Vec<String> = self
                    .available_backends()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                Err(SmartCutError::session_init(format!(
                    "Backend '{}' is not compiled into this build (available: {})",
                    other,
                    if available.is_empty() {
                        "none".to_string()
                    } else {
                        available.join(", ")
                    }
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}
