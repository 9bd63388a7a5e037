//! Model file diagnostics
//!
//! Distinguishes a missing model from a file that exists but cannot hold real
//! weights, such as a Git LFS pointer checked out without `git lfs pull`.

use crate::error::{Result, SmartCutError};
use std::io::Read;
use std::path::Path;

/// Files smaller than this cannot be a usable segmentation model
pub const MIN_MODEL_BYTES: u64 = 1024;

/// First line of a Git LFS pointer file
pub const LFS_POINTER_HEADER: &[u8] = b"version https://git-lfs.github.com/spec/v1";

/// Validator for model artifacts on disk
pub struct ModelValidator;

impl ModelValidator {
    /// Check that `path` names a plausible model file
    ///
    /// # Errors
    /// - `ModelMissing` when nothing exists at `path`
    /// - `ModelCorrupt` for directories, undersized files and LFS pointers
    /// - `Io` when the file exists but cannot be read
    pub fn validate_model_file(path: &Path) -> Result<()> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SmartCutError::model_missing(path));
            },
            Err(e) => return Err(SmartCutError::file_io_error("inspect model", path, &e)),
        };

        if !metadata.is_file() {
            return Err(SmartCutError::model_corrupt(path, "path is not a regular file"));
        }

        let mut head = Vec::with_capacity(LFS_POINTER_HEADER.len());
        std::fs::File::open(path)
            .and_then(|file| {
                file.take(LFS_POINTER_HEADER.len() as u64)
                    .read_to_end(&mut head)
            })
            .map_err(|e| SmartCutError::file_io_error("read model", path, &e))?;

        if head.starts_with(LFS_POINTER_HEADER) {
            return Err(SmartCutError::model_corrupt(
                path,
                "file is a Git LFS pointer, fetch the real weights with `git lfs pull`",
            ));
        }

        if metadata.len() < MIN_MODEL_BYTES {
            return Err(SmartCutError::model_corrupt(
                path,
                format!(
                    "file is only {} bytes, expected real model weights",
                    metadata.len()
                ),
            ));
        }

        log::debug!(
            "Model file {} looks valid ({} bytes)",
            path.display(),
            metadata.len()
        );
        Ok(())
    }
}
