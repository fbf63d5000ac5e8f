//! PNG encoding and output naming

use image::ImageFormat;

use crate::error::{Error, Result};
use crate::raster::PixelBuffer;

/// Encode a raster as PNG, cropped to its logical size.
///
/// Grayscale stays single-channel; BGRA is written as RGBA.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    let img = buffer.to_image()?;

    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_data);
    img.write_with_encoder(encoder)
        .map_err(|e| Error::PngEncodeFailed {
            message: e.to_string(),
        })?;

    Ok(png_data)
}

/// File extension for an already-encoded preview image, `png` when unknown.
pub fn preview_extension(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::Bmp) => "bmp",
        Ok(ImageFormat::Gif) => "gif",
        Ok(ImageFormat::WebP) => "webp",
        _ => "png",
    }
}

/// Make a layer name safe to embed in a file name.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim().to_string()
}

/// `canvas_0001.png`
pub fn preview_file_name(canvas_id: i64, extension: &str) -> String {
    format!("canvas_{canvas_id:04}.{extension}")
}

/// `canvas_0001`
pub fn canvas_dir_name(canvas_id: i64) -> String {
    format!("canvas_{canvas_id:04}")
}

/// `layer_0002_[Ink].png`
pub fn layer_file_name(layer_id: i64, name: &str) -> String {
    format!("layer_{layer_id:04}_[{}].png", sanitize_name(name))
}
