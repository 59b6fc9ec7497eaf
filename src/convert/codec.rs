//! JPEG converter built on the `image` crate

use super::heif;
use super::{ConversionError, ConvertedImage, ImageConverter, ImageMetadata};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use log::trace;

/// Quality used when none is configured
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Converts any decodable image to baseline JPEG.
///
/// Alpha channels are dropped since JPEG cannot carry them.
#[derive(Debug, Clone)]
pub struct JpegConverter {
    quality: u8,
}

impl JpegConverter {
    /// Create a converter; `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegConverter {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageConverter for JpegConverter {
    fn convert(&self, input: &[u8]) -> Result<ConvertedImage, ConversionError> {
        let (decoded, format) = decode(input)?;
        let (width, height) = (decoded.width(), decoded.height());
        trace!("Decoded {} image ({}x{})", format, width, height);

        let rgb = decoded.to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality)
            .encode_image(&rgb)
            .map_err(|e| ConversionError::Encode(e.to_string()))?;

        Ok(ConvertedImage {
            bytes,
            metadata: ImageMetadata {
                format,
                width,
                height,
            },
        })
    }
}

/// Decode from the byte stream alone, never trusting a filename.
fn decode(input: &[u8]) -> Result<(DynamicImage, String), ConversionError> {
    if heif::is_heif(input) {
        return heif::decode(input).map(|image| (image, "heif".to_string()));
    }

    let format = image::guess_format(input).map_err(|_| ConversionError::UnsupportedFormat)?;
    let name = format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or("unknown")
        .to_string();

    let image = image::load_from_memory_with_format(input, format).map_err(|e| {
        ConversionError::Decode {
            format: name.clone(),
            message: e.to_string(),
        }
    })?;

    Ok((image, name))
}
