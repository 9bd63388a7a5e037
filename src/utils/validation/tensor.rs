//! Tensor and buffer validation utilities
//!
//! Guards run before any per-request buffer is allocated, so an oversized or
//! empty image fails fast without touching the shared session.

use crate::error::{Result, SmartCutError};

/// Validator for image dimensions and buffer allocation
pub struct TensorValidator;

impl TensorValidator {
    /// Reject zero-area images and images above the pixel budget
    ///
    /// # Errors
    /// - `InvalidInput` when either dimension is zero
    /// - `ResourceExhausted` when `width * height` exceeds `max_pixels`
    pub fn validate_image_dimensions(width: u32, height: u32, max_pixels: u64) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(SmartCutError::invalid_input(format!(
                "Image has zero area: {}x{}",
                width, height
            )));
        }

        let pixels = u64::from(width) * u64::from(height);
        if pixels > max_pixels {
            return Err(SmartCutError::resource_exhausted(format!(
                "Image {}x{} has {} pixels, limit is {}",
                width, height, pixels, max_pixels
            )));
        }

        Ok(())
    }

    /// Element count of a shape, failing on overflow
    ///
    /// # Errors
    /// - `ResourceExhausted` when the product overflows `usize`
    pub fn checked_element_count(shape: &[usize]) -> Result<usize> {
        shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| {
                SmartCutError::resource_exhausted(format!(
                    "Element count of shape {:?} overflows",
                    shape
                ))
            })
    }

    /// Allocate an empty buffer with room for exactly `len` elements
    ///
    /// # Errors
    /// - `ResourceExhausted` when the allocator refuses the request
    pub fn try_allocate<T>(len: usize) -> Result<Vec<T>> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).map_err(|e| {
            SmartCutError::resource_exhausted(format!(
                "Failed to allocate buffer of {} elements: {}",
                len, e
            ))
        })?;
        Ok(buffer)
    }

    /// Validate mask data length against dimensions
    ///
    /// # Errors
    /// - `Internal` when the lengths disagree
    pub fn validate_mask_dimensions(mask_data_len: usize, width: u32, height: u32) -> Result<()> {
        let expected_len = (width as usize).checked_mul(height as usize);
        if expected_len != Some(mask_data_len) {
            return Err(SmartCutError::internal(format!(
                "Mask data length {} doesn't match dimensions {}x{}",
                mask_data_len, width, height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_validate_image_dimensions() {
        assert!(TensorValidator::validate_image_dimensions(640, 480, 1_000_000).is_ok());

        let err = TensorValidator::validate_image_dimensions(0, 480, 1_000_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = TensorValidator::validate_image_dimensions(2000, 2000, 1_000_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_checked_element_count() {
        assert_eq!(
            TensorValidator::checked_element_count(&[1, 3, 320, 320]).unwrap(),
            307_200
        );
        let err = TensorValidator::checked_element_count(&[usize::MAX, 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_try_allocate() {
        let buffer: Vec<f32> = TensorValidator::try_allocate(1024).unwrap();
        assert!(buffer.capacity() >= 1024);
        assert!(buffer.is_empty());

        let err = TensorValidator::try_allocate::<f32>(usize::MAX / 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_validate_mask_dimensions() {
        assert!(TensorValidator::validate_mask_dimensions(12, 4, 3).is_ok());
        assert!(TensorValidator::validate_mask_dimensions(11, 4, 3).is_err());
    }
}
