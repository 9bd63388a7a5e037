//! Configuration types for background removal operations

use crate::error::{Result, SmartCutError};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model-family default spatial resolution used when the engine reports dynamic input dims
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (320, 320);

/// Default file name of the bundled segmentation model
pub const DEFAULT_MODEL_FILE: &str = "u2net.onnx";

/// Inference engine used to execute the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        Self::Onnx
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl std::str::FromStr for BackendType {
    type Err = SmartCutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" | "ort" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(SmartCutError::invalid_config(format!(
                "Unknown backend '{}'. Supported: onnx, tract",
                other
            ))),
        }
    }
}

/// Interpolation policy shared by input downscaling and mask upscaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    /// Bicubic (Catmull-Rom spline)
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl Default for ResizeFilter {
    fn default() -> Self {
        Self::CatmullRom
    }
}

impl ResizeFilter {
    #[must_use]
    pub fn filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl std::str::FromStr for ResizeFilter {
    type Err = SmartCutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "triangle" | "bilinear" => Ok(Self::Triangle),
            "catmull-rom" | "catmullrom" | "bicubic" => Ok(Self::CatmullRom),
            "gaussian" => Ok(Self::Gaussian),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            other => Err(SmartCutError::invalid_config(format!(
                "Unknown resize filter '{}'",
                other
            ))),
        }
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Path to the ONNX segmentation model
    pub model_path: PathBuf,

    /// Inference engine
    pub backend: BackendType,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Resampler used for both the input resize and the mask upscale
    pub resize_filter: ResizeFilter,

    /// Apply a logistic sigmoid to raw outputs before min-max normalization
    pub apply_sigmoid: bool,

    /// Below this `max - min` range the map is treated as degenerate
    pub degenerate_epsilon: f32,

    /// Spatial input resolution (height, width) used when the model declares dynamic dims
    pub default_input_size: (u32, u32),

    /// Suffix appended to the source stem when saving a cutout
    pub output_suffix: String,

    /// Largest accepted source image area in pixels
    pub max_pixels: u64,

    /// Input tensor names tried (case-insensitively) before falling back to the first input
    pub preferred_input_names: Vec<String>,

    /// Output tensor names tried (case-insensitively) before falling back to the first output
    pub preferred_output_names: Vec<String>,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_path: Self::default_model_path(),
            backend: BackendType::default(),
            intra_threads: 0,
            resize_filter: ResizeFilter::default(),
            apply_sigmoid: false,
            degenerate_epsilon: 1e-8,
            default_input_size: DEFAULT_INPUT_SIZE,
            output_suffix: "_nobg".to_string(),
            max_pixels: 16_384 * 16_384,
            preferred_input_names: ["input", "images", "input_0"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            preferred_output_names: ["output", "sigmoid", "mask", "pred", "1704"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use smartcut::{RemovalConfig, ResizeFilter};
    ///
    /// let config = RemovalConfig::builder()
    ///     .model_path("models/u2net.onnx")
    ///     .resize_filter(ResizeFilter::Lanczos3)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.resize_filter, ResizeFilter::Lanczos3);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// `<executable dir>/models/u2net.onnx`, or `models/u2net.onnx` when the
    /// executable location cannot be determined
    #[must_use]
    pub fn default_model_path() -> PathBuf {
        let base = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        base.join("models").join(DEFAULT_MODEL_FILE)
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - Content is not valid JSON for this structure
    /// - Loaded values fail validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SmartCutError::file_io_error("read configuration", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SmartCutError::invalid_config(format!(
                "Failed to parse configuration '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Non-finite or non-positive degenerate epsilon
    /// - Zero default input size
    /// - Zero pixel budget
    /// - Empty output suffix
    pub fn validate(&self) -> Result<()> {
        if !self.degenerate_epsilon.is_finite() || self.degenerate_epsilon <= 0.0 {
            return Err(SmartCutError::config_value_error(
                "degenerate epsilon",
                self.degenerate_epsilon,
                "finite and > 0",
            ));
        }

        let (height, width) = self.default_input_size;
        if height == 0 || width == 0 {
            return Err(SmartCutError::config_value_error(
                "default input size",
                format!("{}x{}", height, width),
                ">= 1x1",
            ));
        }

        if self.max_pixels == 0 {
            return Err(SmartCutError::config_value_error(
                "max pixels",
                self.max_pixels,
                ">= 1",
            ));
        }

        if self.output_suffix.is_empty() {
            return Err(SmartCutError::invalid_config(
                "Output suffix must not be empty, the cutout would overwrite its source",
            ));
        }

        Ok(())
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = path.into();
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.config.resize_filter = filter;
        self
    }

    #[must_use]
    pub fn apply_sigmoid(mut self, apply: bool) -> Self {
        self.config.apply_sigmoid = apply;
        self
    }

    #[must_use]
    pub fn degenerate_epsilon(mut self, epsilon: f32) -> Self {
        self.config.degenerate_epsilon = epsilon;
        self
    }

    /// Set fallback input resolution as (height, width)
    #[must_use]
    pub fn default_input_size(mut self, height: u32, width: u32) -> Self {
        self.config.default_input_size = (height, width);
        self
    }

    #[must_use]
    pub fn output_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn max_pixels(mut self, max_pixels: u64) -> Self {
        self.config.max_pixels = max_pixels;
        self
    }

    #[must_use]
    pub fn preferred_output_names(mut self, names: Vec<String>) -> Self {
        self.config.preferred_output_names = names;
        self
    }

    #[must_use]
    pub fn preferred_input_names(mut self, names: Vec<String>) -> Self {
        self.config.preferred_input_names = names;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`RemovalConfig::validate`].
    pub fn build(self) -> Result<RemovalConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RemovalConfig::default();
        assert_eq!(config.default_input_size, (320, 320));
        assert_eq!(config.resize_filter, ResizeFilter::CatmullRom);
        assert_eq!(config.output_suffix, "_nobg");
        assert!(!config.apply_sigmoid);
        assert!(config.model_path.ends_with("models/u2net.onnx"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RemovalConfig::builder()
            .model_path("/opt/models/u2netp.onnx")
            .backend(BackendType::Tract)
            .apply_sigmoid(true)
            .default_input_size(512, 256)
            .build()
            .unwrap();

        assert_eq!(config.model_path, PathBuf::from("/opt/models/u2netp.onnx"));
        assert_eq!(config.backend, BackendType::Tract);
        assert!(config.apply_sigmoid);
        assert_eq!(config.default_input_size, (512, 256));
    }

    #[test]
    fn test_config_validation() {
        assert!(RemovalConfig::builder().degenerate_epsilon(0.0).build().is_err());
        assert!(RemovalConfig::builder()
            .degenerate_epsilon(f32::NAN)
            .build()
            .is_err());
        assert!(RemovalConfig::builder().default_input_size(0, 320).build().is_err());
        assert!(RemovalConfig::builder().output_suffix("").build().is_err());
        assert!(RemovalConfig::builder().max_pixels(0).build().is_err());
    }

    #[test]
    fn test_backend_and_filter_parsing() {
        assert_eq!("ONNX".parse::<BackendType>().unwrap(), BackendType::Onnx);
        assert_eq!("tract".parse::<BackendType>().unwrap(), BackendType::Tract);
        assert!("tensorrt".parse::<BackendType>().is_err());

        assert_eq!(
            "bicubic".parse::<ResizeFilter>().unwrap(),
            ResizeFilter::CatmullRom
        );
        assert_eq!(
            ResizeFilter::Lanczos3.filter_type(),
            FilterType::Lanczos3
        );
        assert!("sinc".parse::<ResizeFilter>().is_err());
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "model_path": "/srv/u2net.onnx", "apply_sigmoid": true, "resize_filter": "lanczos3" }}"#
        )
        .unwrap();

        let config = RemovalConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/srv/u2net.onnx"));
        assert!(config.apply_sigmoid);
        assert_eq!(config.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(config.output_suffix, "_nobg");
    }

    #[test]
    fn test_from_json_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "degenerate_epsilon": -1.0 }}"#).unwrap();
        assert!(RemovalConfig::from_json_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(RemovalConfig::from_json_file(file.path()).is_err());
    }
}
