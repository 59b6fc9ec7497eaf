//! Image conversion
//!
//! The sync treats the image codec as a black box behind [`ImageConverter`]:
//! bytes in, JPEG bytes out, or a [`ConversionError`]. The engine only uses
//! the filename extension to decide *whether* to convert; the converter
//! itself detects the real format from the byte stream.
//!
//! # Submodules
//!
//! - `codec` - JPEG converter built on the `image` crate
//! - `heif` - HEIF container sniffing and the optional libheif decoder

pub mod codec;
pub mod heif;

pub use codec::JpegConverter;

use crate::core::error::{Result, SyncError};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension written for converted images
pub const NORMALIZED_EXTENSION: &str = "jpeg";

/// Extensions (lowercase) of the library's high-efficiency image format
const PROPRIETARY_EXTENSIONS: &[&str] = &["heic", "heif"];

/// Errors raised by an [`ImageConverter`]
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The byte stream does not look like any known image format
    #[error("Unrecognized image format")]
    UnsupportedFormat,

    /// The format was recognized but no decoder is compiled in
    #[error("No decoder available for {0} images (build with the `heif` feature)")]
    CodecUnavailable(String),

    /// The decoder rejected the input
    #[error("Failed to decode {format} image: {message}")]
    Decode { format: String, message: String },

    /// The JPEG encoder failed
    #[error("Failed to encode JPEG: {0}")]
    Encode(String),
}

/// What the converter found out about the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Detected input format, e.g. `png` or `heif`
    pub format: String,
    pub width: u32,
    pub height: u32,
}

/// Output of a successful conversion
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    /// Encoded JPEG bytes
    pub bytes: Vec<u8>,
    pub metadata: ImageMetadata,
}

/// Decodes an image byte stream and re-encodes it as JPEG.
///
/// Implementations must be shareable across the worker pool used for
/// parallel writes.
pub trait ImageConverter: Send + Sync {
    fn convert(&self, input: &[u8]) -> std::result::Result<ConvertedImage, ConversionError>;
}

/// Check whether a filename carries the proprietary image extension.
///
/// The comparison ignores case, since the Photos app stores both
/// `IMG_0001.HEIC` and `IMG_0001.heic`.
pub fn is_proprietary(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            PROPRIETARY_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Destination filename for a library asset.
///
/// `IMG_0001.heic` becomes `IMG_0001.jpeg`; anything else is kept as is.
pub fn normalized_filename(filename: &str) -> String {
    if is_proprietary(filename) {
        Path::new(filename)
            .with_extension(NORMALIZED_EXTENSION)
            .to_string_lossy()
            .into_owned()
    } else {
        filename.to_string()
    }
}

/// Convert a single file into `output_dir`, outside of any library.
///
/// The output always gets the normalized extension because the result is a
/// JPEG whatever the input was. Returns the path written.
pub fn convert_file(
    converter: &dyn ImageConverter,
    input: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let data = fs::read(input).map_err(|e| SyncError::io(input, e))?;

    let converted = converter
        .convert(&data)
        .map_err(|source| SyncError::Conversion {
            path: input.to_path_buf(),
            source,
        })?;

    info!(
        "Identified {} image ({}x{})",
        converted.metadata.format, converted.metadata.width, converted.metadata.height
    );

    fs::create_dir_all(output_dir).map_err(|e| SyncError::io(output_dir, e))?;

    let filename = input
        .file_name()
        .map(|name| Path::new(name).with_extension(NORMALIZED_EXTENSION))
        .unwrap_or_else(|| PathBuf::from(format!("converted.{}", NORMALIZED_EXTENSION)));
    let output_path = output_dir.join(filename);

    fs::write(&output_path, &converted.bytes).map_err(|e| SyncError::io(&output_path, e))?;

    Ok(output_path)
}
