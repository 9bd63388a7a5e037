//! Validation utilities for model files and request buffers

pub mod model;
pub mod tensor;

pub use model::ModelValidator;
pub use tensor::TensorValidator;
