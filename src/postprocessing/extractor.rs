//! Confidence map extraction from raw model outputs
//!
//! Export tools disagree on how a single-channel prediction is shaped. The
//! extractor classifies the chosen output into a [`TensorLayout`] and copies
//! the matching elements verbatim into an H×W [`ConfidenceMap`].

use crate::error::{Result, SmartCutError};
use crate::tensor::{NamedTensors, Tensor, TensorLayout};
use crate::types::ConfidenceMap;
use ndarray::{s, Array2, Ix3, Ix4};

/// Turns engine outputs into a single confidence map
pub struct MaskExtractor;

impl MaskExtractor {
    /// Pick `output_name` from `outputs` (or the first output when absent) and
    /// extract its `expected_height` × `expected_width` confidence map
    ///
    /// # Errors
    /// - `Inference` when the engine returned no outputs
    /// - `UnsupportedTensorShape` when the chosen output has no recognized layout
    pub fn extract(
        outputs: &NamedTensors,
        output_name: &str,
        expected_height: usize,
        expected_width: usize,
    ) -> Result<ConfidenceMap> {
        let (name, tensor) = outputs.get_or_first(output_name).ok_or_else(|| {
            SmartCutError::inference("Inference produced no output tensors")
        })?;
        if name != output_name {
            log::debug!(
                "Output '{}' not in results {:?}, using '{}'",
                output_name,
                outputs.names(),
                name
            );
        }
        Self::extract_tensor(tensor, expected_height, expected_width)
    }

    /// Extract the confidence map from one tensor
    ///
    /// # Errors
    /// - `UnsupportedTensorShape` when the shape has no recognized layout
    pub fn extract_tensor(
        tensor: &Tensor,
        expected_height: usize,
        expected_width: usize,
    ) -> Result<ConfidenceMap> {
        let (h, w) = (expected_height, expected_width);
        let layout = tensor.layout(h, w);
        let unsupported = || SmartCutError::unsupported_shape(tensor.shape(), h, w);

        log::debug!(
            "Mask tensor shape {:?} classified as {} for {}x{}",
            tensor.shape(),
            layout,
            h,
            w
        );

        let view = tensor.view();
        let map: Array2<f32> = match layout {
            TensorLayout::ChannelFirst { channel } => {
                let view = view.into_dimensionality::<Ix4>().map_err(|_| unsupported())?;
                view.slice(s![0, channel, .., ..]).to_owned()
            },
            TensorLayout::ChannelLast => {
                let view = view.into_dimensionality::<Ix4>().map_err(|_| unsupported())?;
                view.slice(s![0, .., .., 0]).to_owned()
            },
            TensorLayout::ChannelOmitted => {
                let view = view.into_dimensionality::<Ix3>().map_err(|_| unsupported())?;
                view.slice(s![0, .., ..]).to_owned()
            },
            TensorLayout::Flattened => {
                let values: Vec<f32> = view.iter().copied().collect();
                Array2::from_shape_vec((h, w), values).map_err(|_| unsupported())?
            },
            TensorLayout::Unsupported => return Err(unsupported()),
        };

        Ok(ConfidenceMap::new(map))
    }
}
