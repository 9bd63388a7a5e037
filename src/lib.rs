#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # SmartCut
//!
//! Foreground cutout from photographs. A salient-object segmentation model
//! (U2-Net family, ONNX format) predicts a single-channel confidence map; the
//! map is stretched to the full 0–255 range, upscaled to the source resolution
//! and written into the alpha channel of the untouched source pixels.
//!
//! ## Pipeline
//!
//! 1. [`utils::ImagePreprocessor`] resizes to the model input and builds a
//!    planar `(1, 3, H, W)` tensor in `[0, 1]`
//! 2. an [`inference::InferenceSession`] runs the model
//! 3. [`postprocessing::MaskExtractor`] reads one H×W map out of whatever
//!    output layout the model exporter produced
//! 4. [`postprocessing::MaskNormalizer`] min-max stretches it into an 8-bit mask
//! 5. [`postprocessing::Compositor`] upscales the mask and applies it as alpha
//!
//! [`BackgroundRemovalProcessor`] owns the session and runs requests one at a
//! time through these stages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smartcut::{BackgroundRemovalProcessor, RemovalConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = RemovalConfig::builder()
//!     .model_path("models/u2net.onnx")
//!     .build()?;
//! let processor = BackgroundRemovalProcessor::new(config);
//!
//! // Writes portrait_nobg.png next to the source
//! let output = processor.remove_background_to_file("portrait.jpg")?;
//! println!("{}", output.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend
//! - `tract`: pure Rust backend
//! - `cli` (default): command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod postprocessing;
pub mod processor;
pub mod services;
pub mod tensor;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::path::Path;

// Public API exports
pub use backends::MockSession;
#[cfg(feature = "onnx")]
pub use backends::OnnxSession;
#[cfg(feature = "tract")]
pub use backends::TractSession;
pub use config::{BackendType, RemovalConfig, RemovalConfigBuilder, ResizeFilter};
pub use error::{ErrorKind, Result, SmartCutError};
pub use inference::{
    DefaultSessionFactory, InferenceSession, ModelIoSpec, SessionFactory, TensorSpec,
};
pub use postprocessing::{Compositor, MaskExtractor, MaskNormalizer, NormalizationOptions};
pub use processor::{BackgroundRemovalProcessor, Readiness};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingState,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use tensor::{NamedTensors, Tensor, TensorLayout};
pub use types::{
    AlphaMask, ConfidenceMap, CutoutResult, MaskStatistics, ProcessingMetadata, ProcessingTimings,
};
pub use utils::{ImagePreprocessor, ModelValidator, TensorValidator};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background of an image file with a one-off processor
///
/// Opens the model, processes the file and drops the session again. Use a
/// [`BackgroundRemovalProcessor`] directly when handling more than one image.
///
/// # Errors
/// - `ModelMissing` / `ModelCorrupt` / `SessionInitFailure` when the model cannot be opened
/// - Everything [`BackgroundRemovalProcessor::process_file`] returns
pub fn remove_background_from_file<P: AsRef<Path>>(
    input_path: P,
    config: &RemovalConfig,
) -> Result<CutoutResult> {
    BackgroundRemovalProcessor::new(config.clone()).process_file(input_path)
}

/// Remove the background of an encoded image held in memory
///
/// # Examples
/// ```rust,no_run
/// use smartcut::{remove_background_from_bytes, RemovalConfig};
///
/// # fn example(upload: &[u8]) -> anyhow::Result<Vec<u8>> {
/// let result = remove_background_from_bytes(upload, &RemovalConfig::default())?;
/// Ok(result.to_png_bytes()?)
/// # }
/// ```
///
/// # Errors
/// - `ModelMissing` / `ModelCorrupt` / `SessionInitFailure` when the model cannot be opened
/// - Everything [`BackgroundRemovalProcessor::process_bytes`] returns
pub fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
) -> Result<CutoutResult> {
    BackgroundRemovalProcessor::new(config.clone()).process_bytes(image_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_surfaces_through_free_functions() {
        let dir = tempfile::tempdir().unwrap();
        let config = RemovalConfig::builder()
            .model_path(dir.path().join("u2net.onnx"))
            .build()
            .unwrap();

        let err = remove_background_from_bytes(b"anything", &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelMissing);

        let err = remove_background_from_file(dir.path().join("photo.jpg"), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelMissing);
    }
}
