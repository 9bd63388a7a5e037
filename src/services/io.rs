//! Image I/O operations service
//!
//! Decoding of source photos and PNG encoding of cutouts. Everything that
//! touches the filesystem or a codec lives here so the pipeline stages stay
//! pure.

use crate::error::{Result, SmartCutError};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Format detection uses the extension first and falls back to content
    /// sniffing when the extension is missing or lies.
    ///
    /// # Errors
    /// - `Io` when the file is missing or unreadable
    /// - `Image` when neither detection method can decode the file
    ///
    /// # Examples
    /// ```rust,no_run
    /// use smartcut::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("portrait.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(SmartCutError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref).map_err(|io_err| {
                    SmartCutError::file_io_error("read image data", path_ref, &io_err)
                })?;
                Ok(image::load_from_memory(&data)?)
            },
        }
    }

    /// Decode an image from memory
    ///
    /// # Errors
    /// - `InvalidInput` for an empty buffer
    /// - `Image` when the format is unknown or the data is corrupt
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(SmartCutError::invalid_input("Image data is empty"));
        }
        Ok(image::load_from_memory(bytes)?)
    }

    /// `<dir>/<stem><suffix>.png` for a source image path
    ///
    /// ```rust
    /// use smartcut::services::ImageIOService;
    /// use std::path::Path;
    ///
    /// let out = ImageIOService::output_path_for("/photos/cat.jpeg", "_nobg");
    /// assert_eq!(out, Path::new("/photos/cat_nobg.png"));
    /// ```
    pub fn output_path_for<P: AsRef<Path>>(input: P, suffix: &str) -> PathBuf {
        let input = input.as_ref();
        let stem = input
            .file_stem()
            .map_or_else(|| "image".into(), |s| s.to_string_lossy());
        input.with_file_name(format!("{}{}.png", stem, suffix))
    }

    /// Write an RGBA image as PNG, creating the parent directory if needed
    ///
    /// # Errors
    /// - Directory creation, encoding or write failure
    pub fn save_rgba_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SmartCutError::file_io_error("create output directory", parent, &e)
            })?;
        }

        image.save_with_format(path_ref, ImageFormat::Png)?;
        Ok(())
    }

    /// Encode an RGBA image as PNG bytes; the alpha channel is always kept
    ///
    /// # Errors
    /// - PNG encoding failure
    pub fn encode_rgba_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        image.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }
}
