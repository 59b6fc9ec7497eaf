//! HEIF container support
//!
//! Sniffing is always available so that a HEIC asset in a build without
//! libheif fails with a clear [`ConversionError::CodecUnavailable`] instead
//! of a generic "unrecognized format".

use super::ConversionError;
use image::DynamicImage;

/// ISO-BMFF brands that identify HEIF still images
const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1"];

/// Check the `ftyp` box for a HEIF brand (major or compatible).
pub fn is_heif(data: &[u8]) -> bool {
    if data.len() < 16 || &data[4..8] != b"ftyp" {
        return false;
    }

    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let end = box_size.clamp(16, data.len());

    // major brand at 8..12, minor version at 12..16, compatible brands after
    let major = &data[8..12];
    let compatible = data[16..end].chunks_exact(4);

    std::iter::once(major)
        .chain(compatible)
        .any(|brand| HEIF_BRANDS.iter().any(|known| known.as_slice() == brand))
}

#[cfg(feature = "heif")]
pub fn decode(data: &[u8]) -> Result<DynamicImage, ConversionError> {
    use image::RgbImage;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let decode_error = |e: libheif_rs::HeifError| ConversionError::Decode {
        format: "heif".to_string(),
        message: e.to_string(),
    };

    let lib_heif = LibHeif::new();
    let context = HeifContext::read_from_bytes(data).map_err(decode_error)?;
    let handle = context.primary_image_handle().map_err(decode_error)?;
    let image = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(decode_error)?;

    let planes = image.planes();
    let plane = planes.interleaved.ok_or_else(|| ConversionError::Decode {
        format: "heif".to_string(),
        message: "decoder returned no interleaved RGB plane".to_string(),
    })?;

    let (width, height) = (plane.width, plane.height);
    let row_len = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    RgbImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| ConversionError::Decode {
            format: "heif".to_string(),
            message: "pixel buffer does not match image dimensions".to_string(),
        })
}

#[cfg(not(feature = "heif"))]
pub fn decode(_data: &[u8]) -> Result<DynamicImage, ConversionError> {
    Err(ConversionError::CodecUnavailable("HEIF".to_string()))
}
