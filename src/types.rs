//! Core types for background removal operations

use crate::error::{Result, SmartCutError};
use crate::services::ImageIOService;
use chrono::{DateTime, Utc};
use image::{imageops::FilterType, GrayImage, RgbaImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Single-channel H×W float map produced by the model, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceMap {
    data: Array2<f32>,
}

impl ConfidenceMap {
    #[must_use]
    pub fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Build a map from row-major values
    ///
    /// # Errors
    /// - `values.len()` is not `height * width`
    pub fn from_vec(height: usize, width: usize, values: Vec<f32>) -> Result<Self> {
        let data = Array2::from_shape_vec((height, width), values).map_err(|e| {
            SmartCutError::internal(format!(
                "Confidence values do not fit {}x{}: {}",
                height, width, e
            ))
        })?;
        Ok(Self { data })
    }

    /// (height, width)
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn get(&self, y: usize, x: usize) -> Option<f32> {
        self.data.get((y, x)).copied()
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    #[must_use]
    pub fn into_array(self) -> Array2<f32> {
        self.data
    }

    /// Minimum and maximum over all elements, `None` for an empty map
    #[must_use]
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut values = self.data.iter().copied();
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// 8-bit single-channel opacity mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaMask {
    /// Alpha values, row-major (0 = transparent, 255 = opaque)
    pub data: Vec<u8>,

    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl AlphaMask {
    #[must_use]
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Self {
        Self { data, dimensions }
    }

    /// Create mask from a grayscale image
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        Self::new(image.as_raw().clone(), image.dimensions())
    }

    /// Convert mask to a grayscale image
    ///
    /// # Errors
    /// - Data length does not match the stored dimensions
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, self.data.clone()).ok_or_else(|| {
            SmartCutError::internal(format!(
                "Mask data ({} bytes) does not fit {}x{}",
                self.data.len(),
                width,
                height
            ))
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        let (width, height) = self.dimensions;
        if x >= width || y >= height {
            return None;
        }
        let index = (y as usize) * (width as usize) + x as usize;
        self.data.get(index).copied()
    }

    /// Resize the mask with the given filter, returning a clone when already at size
    ///
    /// # Errors
    /// - Stored data is inconsistent with the mask dimensions
    pub fn resize(&self, new_width: u32, new_height: u32, filter: FilterType) -> Result<Self> {
        if self.dimensions == (new_width, new_height) {
            return Ok(self.clone());
        }
        let current = self.to_image()?;
        let resized = image::imageops::resize(&current, new_width, new_height, filter);
        Ok(Self::from_image(&resized))
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&a| a > 127).count();
        let background_pixels = total_pixels - foreground_pixels;
        let ratio = |n: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                n as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }

    /// Save mask as grayscale PNG
    ///
    /// # Errors
    /// - Mask data is inconsistent
    /// - Encoding or file write fails
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Statistics about an alpha mask (foreground means alpha > 127)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Per-stage timing of one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Time spent waiting for the shared session
    pub lock_wait_ms: u64,

    /// Resize and tensor conversion
    pub preprocessing_ms: u64,

    /// Engine forward pass
    pub inference_ms: u64,

    /// Extraction, normalization, mask upscale and compositing
    pub postprocessing_ms: u64,

    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Wait: {}ms | Preprocess: {}ms | Inference: {}ms | Postprocess: {}ms",
            self.total_ms,
            self.lock_wait_ms,
            self.preprocessing_ms,
            self.inference_ms,
            self.postprocessing_ms
        )
    }
}

/// Metadata about the processing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub timings: ProcessingTimings,

    /// Model input resolution actually used (height, width)
    pub model_input_size: (u32, u32),

    /// Output tensor the mask was read from
    pub output_name: String,

    /// Shape of that output tensor
    pub output_shape: Vec<usize>,

    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(model_input_size: (u32, u32)) -> Self {
        Self {
            timings: ProcessingTimings::new(),
            model_input_size,
            output_name: String::new(),
            output_shape: Vec::new(),
            processed_at: Utc::now(),
        }
    }
}

/// Result of a background removal operation
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// Original pixels with the mask as alpha
    pub image: RgbaImage,

    /// Alpha mask at the original resolution
    pub mask: AlphaMask,

    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),

    pub metadata: ProcessingMetadata,
}

impl CutoutResult {
    #[must_use]
    pub fn new(
        image: RgbaImage,
        mask: AlphaMask,
        original_dimensions: (u32, u32),
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            mask,
            original_dimensions,
            metadata,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Save the cutout as RGBA PNG
    ///
    /// # Errors
    /// - Parent directory cannot be created
    /// - Encoding or file write fails
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ImageIOService::save_rgba_png(&self.image, path)
    }

    /// Encode the cutout as RGBA PNG bytes
    ///
    /// # Errors
    /// - PNG encoding fails
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        ImageIOService::encode_rgba_png(&self.image)
    }

    /// Save as `<stem><suffix>.png` in the directory of `input`, returning the written path
    ///
    /// # Errors
    /// - Encoding or file write fails
    pub fn save_beside<P: AsRef<Path>>(&self, input: P, suffix: &str) -> Result<PathBuf> {
        let output = ImageIOService::output_path_for(input, suffix);
        self.save_png(&output)?;
        log::info!(
            "Saved cutout {}x{} to {}",
            self.image.width(),
            self.image.height(),
            output.display()
        );
        Ok(output)
    }
}
