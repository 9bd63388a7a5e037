//! Min-max normalization of confidence maps into 8-bit alpha

use crate::config::RemovalConfig;
use crate::error::Result;
use crate::types::{AlphaMask, ConfidenceMap};
use crate::utils::validation::TensorValidator;

/// Normalization policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationOptions {
    /// Apply a logistic sigmoid to each value before min-max rescaling
    pub apply_sigmoid: bool,
    /// Ranges narrower than this are treated as degenerate and mapped through [0, 1]
    pub degenerate_epsilon: f32,
}

impl Default for NormalizationOptions {
    fn default() -> Self {
        Self {
            apply_sigmoid: false,
            degenerate_epsilon: 1e-8,
        }
    }
}

impl From<&RemovalConfig> for NormalizationOptions {
    fn from(config: &RemovalConfig) -> Self {
        Self {
            apply_sigmoid: config.apply_sigmoid,
            degenerate_epsilon: config.degenerate_epsilon,
        }
    }
}

/// Rescales a confidence map to the full 0..=255 range
pub struct MaskNormalizer;

impl MaskNormalizer {
    /// Normalize `map` into an alpha mask at the map's own resolution
    ///
    /// Each value becomes `(v - min) / (max - min)`, clamped to [0, 1], times
    /// 255 and truncated. When `max - min` is below the epsilon the range
    /// [0, 1] is used instead, so a constant map turns into a uniform mask.
    ///
    /// # Errors
    /// - `ResourceExhausted` when the mask buffer cannot be allocated
    pub fn normalize(map: &ConfidenceMap, options: NormalizationOptions) -> Result<AlphaMask> {
        let (height, width) = map.dimensions();
        let transform = |v: f32| if options.apply_sigmoid { sigmoid(v) } else { v };

        let (mut min, mut max) = map
            .as_array()
            .iter()
            .map(|&v| transform(v))
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        let span = max - min;
        if span.is_nan() || span.abs() < options.degenerate_epsilon {
            log::debug!(
                "Degenerate confidence map (min {}, max {}), normalizing over [0, 1]",
                min,
                max
            );
            min = 0.0;
            max = 1.0;
        }
        let range = max - min;

        let mut data: Vec<u8> = TensorValidator::try_allocate(map.as_array().len())?;
        data.extend(map.as_array().iter().map(|&v| {
            let scaled = ((transform(v) - min) / range).clamp(0.0, 1.0) * 255.0;
            // NaN inputs land on 0 through the saturating cast
            scaled as u8
        }));

        Ok(AlphaMask::new(data, (width as u32, height as u32)))
    }
}

fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(h: usize, w: usize, values: &[f32]) -> ConfidenceMap {
        ConfidenceMap::from_vec(h, w, values.to_vec()).unwrap()
    }

    #[test]
    fn test_stretches_to_full_range() {
        let mask =
            MaskNormalizer::normalize(&map(1, 4, &[0.2, 0.4, 0.6, 0.8]), Default::default()).unwrap();
        assert_eq!(mask.dimensions, (4, 1));
        assert_eq!(mask.data.first(), Some(&0));
        assert_eq!(mask.data.last(), Some(&255));
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        // 0.999 * 255 = 254.745, truncation gives 254
        let mask = MaskNormalizer::normalize(&map(1, 3, &[0.0, 0.999, 1.0]), Default::default())
            .unwrap();
        assert_eq!(mask.data, vec![0, 254, 255]);
    }

    #[test]
    fn test_scale_invariance() {
        let base = [0.0, 0.25, 0.5, 1.0];
        let shifted: Vec<f32> = base.iter().map(|v| v * 2.0 + 3.0).collect();

        let a = MaskNormalizer::normalize(&map(2, 2, &base), Default::default()).unwrap();
        let b = MaskNormalizer::normalize(&map(2, 2, &shifted), Default::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.data, vec![0, 63, 127, 255]);
    }

    #[test]
    fn test_degenerate_map_is_uniform_and_finite() {
        let mask =
            MaskNormalizer::normalize(&map(3, 3, &[0.5; 9]), Default::default()).unwrap();
        assert!(mask.data.iter().all(|&a| a == mask.data[0]));
        assert_eq!(mask.data[0], 127);

        let mask = MaskNormalizer::normalize(&map(2, 2, &[7.0; 4]), Default::default()).unwrap();
        assert!(mask.data.iter().all(|&a| a == 255));
    }

    #[test]
    fn test_sigmoid_option() {
        let options = NormalizationOptions {
            apply_sigmoid: true,
            ..Default::default()
        };
        let mask = MaskNormalizer::normalize(&map(1, 3, &[-10.0, 0.0, 10.0]), options).unwrap();
        assert_eq!(mask.data.first(), Some(&0));
        assert_eq!(mask.data.last(), Some(&255));
        let middle = mask.data[1];
        assert!((126..=128).contains(&middle));
    }

    #[test]
    fn test_non_finite_values_do_not_panic() {
        let mask = MaskNormalizer::normalize(
            &map(1, 3, &[f32::NAN, 0.0, 1.0]),
            Default::default(),
        )
        .unwrap();
        assert_eq!(mask.data.len(), 3);
        assert_eq!(mask.data[2], 255);
    }
}
