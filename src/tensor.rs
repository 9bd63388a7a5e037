//! Dynamic-rank float tensors exchanged with the inference engine
//!
//! Model exports disagree on how a single-channel prediction is laid out, so
//! output tensors are kept at dynamic rank and classified into a
//! [`TensorLayout`] only once the expected spatial size is known.

use crate::error::{Result, SmartCutError};
use ndarray::{Array4, ArrayD, ArrayViewD, IxDyn};

/// N-dimensional array of `f32` values with an explicit shape
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    #[must_use]
    pub fn new(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    /// Build a tensor from a shape and row-major data
    ///
    /// # Errors
    /// - `data.len()` does not equal the product of `shape`
    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), data).map_err(|e| {
            SmartCutError::internal(format!("Tensor data does not fit shape {:?}: {}", shape, e))
        })?;
        Ok(Self { data })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.data.ndim()
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    #[must_use]
    pub fn as_array(&self) -> &ArrayD<f32> {
        &self.data
    }

    #[must_use]
    pub fn into_array(self) -> ArrayD<f32> {
        self.data
    }

    /// Classify this tensor against an expected spatial resolution
    #[must_use]
    pub fn layout(&self, expected_height: usize, expected_width: usize) -> TensorLayout {
        TensorLayout::classify(self.shape(), expected_height, expected_width)
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::new(data)
    }
}

impl From<Array4<f32>> for Tensor {
    fn from(data: Array4<f32>) -> Self {
        Self::new(data.into_dyn())
    }
}

/// Ordered name→tensor mapping, preserving the engine's output order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedTensors {
    entries: Vec<(String, Tensor)>,
}

impl NamedTensors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor, replacing any existing entry with the same name in place
    pub fn insert<S: Into<String>>(&mut self, name: S, tensor: Tensor) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = tensor;
        } else {
            self.entries.push((name, tensor));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    #[must_use]
    pub fn first(&self) -> Option<(&str, &Tensor)> {
        self.entries.first().map(|(n, t)| (n.as_str(), t))
    }

    /// The named tensor if present, else the first one
    #[must_use]
    pub fn get_or_first(&self, name: &str) -> Option<(&str, &Tensor)> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(n, t)| (n.as_str(), t))
            .or_else(|| self.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for NamedTensors {
    type Item = (String, Tensor);
    type IntoIter = std::vec::IntoIter<(String, Tensor)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<S: Into<String>> FromIterator<(S, Tensor)> for NamedTensors {
    fn from_iter<I: IntoIterator<Item = (S, Tensor)>>(iter: I) -> Self {
        let mut tensors = Self::new();
        for (name, tensor) in iter {
            tensors.insert(name, tensor);
        }
        tensors
    }
}

/// How a model output holds its single-channel H×W prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// (1, C, H, W): read channel `channel` (0 for single-channel, C-1 for side-output stacks)
    ChannelFirst { channel: usize },
    /// (1, H, W, 1)
    ChannelLast,
    /// (N, H, W): read batch 0
    ChannelOmitted,
    /// Any shape with exactly H·W elements, read row-major
    Flattened,
    Unsupported,
}

impl TensorLayout {
    /// Classify `shape` against the expected spatial resolution
    ///
    /// Rank-4 shapes are checked with position 1 as the channel axis first:
    /// `(1,1,H,W)`, then `(1,H,W,1)`, then `(1,C,H,W)` with `C > 1`. A square
    /// shape such as `(1,1,1,1)` therefore resolves as channel-first.
    #[must_use]
    pub fn classify(shape: &[usize], expected_height: usize, expected_width: usize) -> Self {
        let (h, w) = (expected_height, expected_width);
        let spatial = h.checked_mul(w);

        let layout = match *shape {
            [1, 1, sh, sw] if sh == h && sw == w => Self::ChannelFirst { channel: 0 },
            [1, sh, sw, 1] if sh == h && sw == w => Self::ChannelLast,
            [1, c, sh, sw] if c > 1 && sh == h && sw == w => Self::ChannelFirst { channel: c - 1 },
            [n, sh, sw] if n >= 1 && sh == h && sw == w => Self::ChannelOmitted,
            _ => Self::Unsupported,
        };

        match layout {
            Self::Unsupported if (2..=4).contains(&shape.len()) => {
                let total = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
                if total.is_some() && total == spatial {
                    Self::Flattened
                } else {
                    Self::Unsupported
                }
            },
            other => other,
        }
    }
}

impl std::fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelFirst { channel } => write!(f, "channel-first (channel {})", channel),
            Self::ChannelLast => write!(f, "channel-last"),
            Self::ChannelOmitted => write!(f, "channel-omitted"),
            Self::Flattened => write!(f, "flattened"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_recognized_layouts() {
        assert_eq!(
            TensorLayout::classify(&[1, 1, 320, 320], 320, 320),
            TensorLayout::ChannelFirst { channel: 0 }
        );
        assert_eq!(
            TensorLayout::classify(&[1, 240, 320, 1], 240, 320),
            TensorLayout::ChannelLast
        );
        assert_eq!(
            TensorLayout::classify(&[1, 7, 64, 64], 64, 64),
            TensorLayout::ChannelFirst { channel: 6 }
        );
        assert_eq!(
            TensorLayout::classify(&[1, 64, 48], 64, 48),
            TensorLayout::ChannelOmitted
        );
        assert_eq!(TensorLayout::classify(&[64, 48], 64, 48), TensorLayout::Flattened);
        assert_eq!(
            TensorLayout::classify(&[1, 3072], 64, 48),
            TensorLayout::Flattened
        );
    }

    #[test]
    fn test_classify_rejects_unknown_shapes() {
        assert_eq!(TensorLayout::classify(&[1, 2, 3], 64, 64), TensorLayout::Unsupported);
        assert_eq!(TensorLayout::classify(&[4096], 64, 64), TensorLayout::Unsupported);
        assert_eq!(
            TensorLayout::classify(&[1, 1, 1, 64, 64], 64, 64),
            TensorLayout::Unsupported
        );
        assert_eq!(
            TensorLayout::classify(&[2, 1, 64, 64], 64, 64),
            TensorLayout::Unsupported
        );
    }

    #[test]
    fn test_classify_square_prefers_channel_position_one() {
        // (1,1,1,1) matches both channel-first and channel-last for a 1x1 model
        assert_eq!(
            TensorLayout::classify(&[1, 1, 1, 1], 1, 1),
            TensorLayout::ChannelFirst { channel: 0 }
        );
        // (1,64,64,64): position 1 is the channel axis, not a spatial one
        assert_eq!(
            TensorLayout::classify(&[1, 64, 64, 64], 64, 64),
            TensorLayout::ChannelFirst { channel: 63 }
        );
    }

    #[test]
    fn test_named_tensors_lookup() {
        let a = Tensor::from_shape_vec(&[1], vec![1.0]).unwrap();
        let b = Tensor::from_shape_vec(&[1], vec![2.0]).unwrap();
        let mut tensors: NamedTensors = vec![("d0", a), ("d6", b)].into_iter().collect();

        assert_eq!(tensors.names(), vec!["d0", "d6"]);
        assert_eq!(tensors.get_or_first("d6").map(|(n, _)| n), Some("d6"));
        assert_eq!(tensors.get_or_first("missing").map(|(n, _)| n), Some("d0"));

        tensors.insert("d0", Tensor::from_shape_vec(&[1], vec![5.0]).unwrap());
        assert_eq!(tensors.len(), 2);
        assert_eq!(tensors.get("d0").unwrap().view()[[0]], 5.0);
    }

    #[test]
    fn test_from_shape_vec_mismatch() {
        assert!(Tensor::from_shape_vec(&[2, 2], vec![0.0; 3]).is_err());
    }
}
