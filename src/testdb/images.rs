//! Small decodable images for tests

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Deterministic gradient so different sizes give different bytes
fn gradient(width: u32, height: u32) -> DynamicImage {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x.wrapping_mul(7) % 256) as u8,
            (y.wrapping_mul(11) % 256) as u8,
            128,
        ])
    });
    DynamicImage::ImageRgb8(image)
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

/// PNG-encoded gradient of the given size
pub fn png_bytes(width: u32, height: u32) -> Result<Vec<u8>> {
    encode(&gradient(width, height), ImageFormat::Png)
}

/// JPEG-encoded gradient of the given size
pub fn jpeg_bytes(width: u32, height: u32) -> Result<Vec<u8>> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// HEIC-encoded gradient of the given size
///
/// Returns `None` when the linked libheif was built without an HEVC encoder
/// plugin; decoding is always available.
#[cfg(feature = "heif")]
pub fn heic_bytes(width: u32, height: u32) -> Result<Option<Vec<u8>>> {
    use anyhow::anyhow;
    use libheif_rs::{
        Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
        RgbChroma,
    };

    let lib_heif = LibHeif::new();
    let mut encoder = match lib_heif.encoder_for_format(CompressionFormat::Hevc) {
        Ok(encoder) => encoder,
        Err(_) => return Ok(None),
    };
    encoder.set_quality(EncoderQuality::Lossy(90))?;

    let source = gradient(width, height).to_rgb8();
    let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb))?;
    image.create_plane(Channel::Interleaved, width, height, 8)?;

    let planes = image.planes_mut();
    let mut plane = planes
        .interleaved
        .ok_or_else(|| anyhow!("libheif allocated no interleaved plane"))?;
    let row_len = width as usize * 3;
    for (y, row) in source.as_raw().chunks(row_len).enumerate() {
        let start = y * plane.stride;
        plane.data[start..start + row_len].copy_from_slice(row);
    }

    let mut context = HeifContext::new()?;
    context.encode_image(&image, &mut encoder, None)?;
    Ok(Some(context.write_to_bytes()?))
}
