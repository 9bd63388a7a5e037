//! Image preprocessing for segmentation models
//!
//! Converts an arbitrary-resolution image into the `(1, 3, H, W)` float tensor
//! a U2-Net style model consumes. The image is stretched to the target size
//! (no crop, no letterbox), the alpha channel is dropped and each RGB byte is
//! divided by 255.

use crate::error::{Result, SmartCutError};
use crate::tensor::Tensor;
use crate::utils::validation::TensorValidator;
use image::{imageops::FilterType, DynamicImage, RgbImage};
use ndarray::Array4;
use tracing::debug_span;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Prepare `image` as a channel-first tensor of shape `(1, 3, height, width)`
    ///
    /// # Arguments
    /// * `image` - Source image, any color type
    /// * `target` - Model input resolution as (height, width)
    /// * `filter` - Resampler used for the stretch
    ///
    /// # Errors
    /// - `InvalidInput` for a zero target dimension or zero-area image
    /// - `ResourceExhausted` when the tensor buffer cannot be allocated
    pub fn prepare(image: &DynamicImage, target: (u32, u32), filter: FilterType) -> Result<Tensor> {
        let (target_height, target_width) = target;
        if target_height == 0 || target_width == 0 {
            return Err(SmartCutError::invalid_input(format!(
                "Target size must be non-zero, got {}x{}",
                target_height, target_width
            )));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(SmartCutError::invalid_input(format!(
                "Image has zero area: {}x{}",
                image.width(),
                image.height()
            )));
        }

        let _span = debug_span!(
            "prepare",
            source_width = image.width(),
            source_height = image.height(),
            target_width,
            target_height
        )
        .entered();

        let rgb = image.to_rgb8();
        let resized = if rgb.dimensions() == (target_width, target_height) {
            rgb
        } else {
            image::imageops::resize(&rgb, target_width, target_height, filter)
        };

        Ok(Tensor::from(Self::image_to_chw(&resized)?))
    }

    /// Planar RGB in [0, 1], shape `(1, 3, H, W)`
    ///
    /// # Errors
    /// - `ResourceExhausted` when the buffer cannot be allocated
    pub fn image_to_chw(image: &RgbImage) -> Result<Array4<f32>> {
        let (width, height) = image.dimensions();
        let shape = (1, 3, height as usize, width as usize);
        let len = TensorValidator::checked_element_count(&[1, 3, shape.2, shape.3])?;

        let mut data: Vec<f32> = TensorValidator::try_allocate(len)?;
        data.extend(image.pixels().map(|p| f32::from(p.0[0]) / 255.0));
        data.extend(image.pixels().map(|p| f32::from(p.0[1]) / 255.0));
        data.extend(image.pixels().map(|p| f32::from(p.0[2]) / 255.0));

        Array4::from_shape_vec(shape, data).map_err(|e| {
            SmartCutError::internal(format!("Failed to shape input tensor: {}", e))
        })
    }
}
