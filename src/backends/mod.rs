//! Inference session implementations
//!
//! - ONNX Runtime session (native runtime, feature `onnx`)
//! - Tract session (pure Rust, feature `tract`)
//! - Mock session (in-memory, always available)

pub mod mock;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

pub use self::mock::MockSession;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxSession;

#[cfg(feature = "tract")]
pub use self::tract::TractSession;
