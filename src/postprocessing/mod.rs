//! Post-inference stages: extraction, normalization and compositing

pub mod compositor;
pub mod extractor;
pub mod normalizer;

pub use compositor::Compositor;
pub use extractor::MaskExtractor;
pub use normalizer::{MaskNormalizer, NormalizationOptions};
