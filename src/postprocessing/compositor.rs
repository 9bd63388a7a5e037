//! Alpha compositing of a normalized mask onto the original pixels

use crate::error::{Result, SmartCutError};
use crate::types::AlphaMask;
use crate::utils::validation::TensorValidator;
use image::{imageops::FilterType, RgbaImage};

/// Applies an alpha mask to an image
pub struct Compositor;

impl Compositor {
    /// Upscale `mask` to the size of `original` and write it into the alpha channel
    ///
    /// RGB values are never touched. The mask is resized with `filter`, which
    /// should be the same resampler used to downscale the input. Returns the
    /// cutout together with the mask at the original resolution.
    ///
    /// # Errors
    /// - `InvalidInput` for a zero-area original
    /// - `Internal` when the mask data is inconsistent with its dimensions
    pub fn composite(
        mut original: RgbaImage,
        mask: &AlphaMask,
        filter: FilterType,
    ) -> Result<(RgbaImage, AlphaMask)> {
        let (width, height) = original.dimensions();
        if width == 0 || height == 0 {
            return Err(SmartCutError::invalid_input(format!(
                "Cannot composite onto a zero-area image ({}x{})",
                width, height
            )));
        }

        let resized = mask.resize(width, height, filter)?;
        TensorValidator::validate_mask_dimensions(resized.data.len(), width, height)?;

        for (pixel, &alpha) in original.pixels_mut().zip(resized.data.iter()) {
            pixel.0[3] = alpha;
        }

        Ok((original, resized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_rgb_is_preserved() {
        let mut original = RgbaImage::new(3, 2);
        for (x, y, pixel) in original.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 40) as u8, (y * 90) as u8, 17, 255]);
        }
        let mask = AlphaMask::new(vec![0, 64, 128, 192, 255, 3], (3, 2));

        let (cutout, resized) =
            Compositor::composite(original.clone(), &mask, FilterType::CatmullRom).unwrap();

        assert_eq!(resized, mask);
        for ((before, after), &alpha) in original.pixels().zip(cutout.pixels()).zip(&mask.data) {
            assert_eq!(before.0[..3], after.0[..3]);
            assert_eq!(after.0[3], alpha);
        }
    }

    #[test]
    fn test_mask_is_upscaled_to_original() {
        let original = RgbaImage::from_pixel(40, 30, Rgba([200, 100, 50, 255]));
        let mask = AlphaMask::new(vec![255; 16], (4, 4));

        let (cutout, resized) =
            Compositor::composite(original, &mask, FilterType::CatmullRom).unwrap();

        assert_eq!(cutout.dimensions(), (40, 30));
        assert_eq!(resized.dimensions, (40, 30));
        assert!(cutout.pixels().all(|p| p.0 == [200, 100, 50, 255]));
    }

    #[test]
    fn test_transparent_mask_keeps_color() {
        let original = RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255]));
        let mask = AlphaMask::new(vec![0; 4], (2, 2));

        let (cutout, _) = Compositor::composite(original, &mask, FilterType::Nearest).unwrap();
        assert!(cutout.pixels().all(|p| p.0 == [9, 8, 7, 0]));
    }

    #[test]
    fn test_zero_area_rejected() {
        let mask = AlphaMask::new(vec![0; 4], (2, 2));
        let err = Compositor::composite(RgbaImage::new(0, 5), &mask, FilterType::Nearest)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }
}
