//! Error types for background removal operations

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, SmartCutError>;

/// Classification of a failure, independent of its payload
///
/// Callers use this to pick a status message or exit code without matching
/// on the full error, and the orchestrator records it in its `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ModelMissing,
    ModelCorrupt,
    SessionInitFailure,
    UnsupportedTensorShape,
    InvalidInput,
    ResourceExhausted,
    Inference,
    InvalidConfig,
    Io,
    Image,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Whether the failure is tied to engine initialization rather than a single request
    #[must_use]
    pub fn is_initialization(self) -> bool {
        matches!(
            self,
            Self::ModelMissing | Self::ModelCorrupt | Self::SessionInitFailure
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ModelMissing => "model missing",
            Self::ModelCorrupt => "model corrupt",
            Self::SessionInitFailure => "session initialization failure",
            Self::UnsupportedTensorShape => "unsupported tensor shape",
            Self::InvalidInput => "invalid input",
            Self::ResourceExhausted => "resource exhausted",
            Self::Inference => "inference failure",
            Self::InvalidConfig => "invalid configuration",
            Self::Io => "I/O failure",
            Self::Image => "image codec failure",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// Error taxonomy for the cutout pipeline
#[derive(Error, Debug)]
pub enum SmartCutError {
    /// Model artifact absent at the expected path
    #[error("Model not found at '{}'", path.display())]
    ModelMissing { path: PathBuf },

    /// Model artifact present but not real weights (placeholder, pointer file)
    #[error("Model file '{}' is not a usable model: {reason}", path.display())]
    ModelCorrupt { path: PathBuf, reason: String },

    /// Inference engine rejected the model file
    #[error("Failed to initialize inference session: {0}")]
    SessionInitFailure(String),

    /// Model output could not be interpreted as a single confidence map
    #[error("Unsupported mask tensor shape {shape:?} (expected {expected_height}x{expected_width} spatial)")]
    UnsupportedTensorShape {
        shape: Vec<usize>,
        expected_height: usize,
        expected_width: usize,
    },

    /// Zero-area or otherwise malformed source image
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Buffer allocation would exceed limits or failed
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Runtime failure reported by the inference engine
    #[error("Inference error: {0}")]
    Inference(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Request was cancelled between pipeline stages
    #[error("Processing cancelled")]
    Cancelled,

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SmartCutError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelMissing { .. } => ErrorKind::ModelMissing,
            Self::ModelCorrupt { .. } => ErrorKind::ModelCorrupt,
            Self::SessionInitFailure(_) => ErrorKind::SessionInitFailure,
            Self::UnsupportedTensorShape { .. } => ErrorKind::UnsupportedTensorShape,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Inference(_) => ErrorKind::Inference,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Io(_) => ErrorKind::Io,
            Self::Image(_) => ErrorKind::Image,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// An equivalent error with the same kind and message
    ///
    /// Used to hand out a captured initialization error on every request.
    /// Wrapped I/O and codec errors are rebuilt from their message.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        match self {
            Self::ModelMissing { path } => Self::ModelMissing { path: path.clone() },
            Self::ModelCorrupt { path, reason } => Self::ModelCorrupt {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::SessionInitFailure(msg) => Self::SessionInitFailure(msg.clone()),
            Self::UnsupportedTensorShape {
                shape,
                expected_height,
                expected_width,
            } => Self::UnsupportedTensorShape {
                shape: shape.clone(),
                expected_height: *expected_height,
                expected_width: *expected_width,
            },
            Self::InvalidInput(msg) => Self::InvalidInput(msg.clone()),
            Self::ResourceExhausted(msg) => Self::ResourceExhausted(msg.clone()),
            Self::Inference(msg) => Self::Inference(msg.clone()),
            Self::InvalidConfig(msg) => Self::InvalidConfig(msg.clone()),
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), e.to_string())),
            Self::Image(e) => Self::Image(image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                e.to_string(),
            ))),
            Self::Cancelled => Self::Cancelled,
            Self::Internal(msg) => Self::Internal(msg.clone()),
        }
    }

    /// Create a missing model error
    pub fn model_missing<P: AsRef<Path>>(path: P) -> Self {
        Self::ModelMissing {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a corrupt model error
    pub fn model_corrupt<P: AsRef<Path>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::ModelCorrupt {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a session initialization error
    pub fn session_init<S: Into<String>>(msg: S) -> Self {
        Self::SessionInitFailure(msg.into())
    }

    /// Create an unsupported tensor shape error
    #[must_use]
    pub fn unsupported_shape(shape: &[usize], expected_height: usize, expected_width: usize) -> Self {
        Self::UnsupportedTensorShape {
            shape: shape.to_vec(),
            expected_height,
            expected_width,
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new resource exhaustion error
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Create inference error with stage context
    #[must_use]
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Inference(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SmartCutError::model_missing("/models/u2net.onnx").kind(),
            ErrorKind::ModelMissing
        );
        assert_eq!(
            SmartCutError::unsupported_shape(&[1, 2, 3], 64, 64).kind(),
            ErrorKind::UnsupportedTensorShape
        );
        assert_eq!(SmartCutError::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(ErrorKind::ModelCorrupt.is_initialization());
        assert!(!ErrorKind::InvalidInput.is_initialization());
    }

    #[test]
    fn test_error_display() {
        let err = SmartCutError::invalid_config("Invalid model path");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model path");

        let err = SmartCutError::unsupported_shape(&[1, 2, 3], 64, 64);
        let message = err.to_string();
        assert!(message.contains("[1, 2, 3]"));
        assert!(message.contains("64x64"));
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = SmartCutError::file_io_error("write cutout", Path::new("/tmp/out.png"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write cutout"));
        assert!(error_string.contains("/tmp/out.png"));

        let err = SmartCutError::config_value_error("degenerate epsilon", -1.0, "> 0");
        assert!(err.to_string().contains("degenerate epsilon"));

        let err = SmartCutError::processing_stage_error("inference", "engine crashed", Some("320x320"));
        let error_string = err.to_string();
        assert!(error_string.contains("inference"));
        assert!(error_string.contains("320x320"));
    }

    #[test]
    fn test_duplicate_keeps_kind_and_message() {
        let errors = [
            SmartCutError::model_corrupt("/m/u2net.onnx", "too small"),
            SmartCutError::session_init("bad opset"),
            SmartCutError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "denied",
            )),
        ];
        for err in &errors {
            let copy = err.duplicate();
            assert_eq!(copy.kind(), err.kind());
            assert_eq!(copy.to_string(), err.to_string());
        }
    }

    #[test]
    fn test_model_corrupt_mentions_reason() {
        let err = SmartCutError::model_corrupt("/m/u2net.onnx", "Git LFS pointer");
        assert!(err.to_string().contains("Git LFS pointer"));
        assert_eq!(err.kind(), ErrorKind::ModelCorrupt);
    }
}
