//! Tile reconstruction
//!
//! External pixel data is stored as 256x256 tiles in row-major tile order. Two
//! encodings exist, told apart only by payload length:
//!
//! - grayscale: one byte per pixel, 65536 bytes per tile
//! - composite: per tile, a 65536-byte alpha plane followed by a 262144-byte
//!   BGR0 color plane (327680 bytes)
//!
//! [`TileLayout::infer`] picks the encoding and dimensions, and [`reconstruct`]
//! assembles the padded raster.

mod layout;
mod tiles;

pub use layout::TileLayout;
pub use tiles::reconstruct;

use image::{DynamicImage, GrayImage, RgbaImage};

use crate::error::{Error, Result};

/// Tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// Pixels per tile.
pub const TILE_PIXELS: usize = 65536;

/// Bytes per composite tile: alpha plane plus BGR0 plane.
pub const COMPOSITE_TILE_BYTES: usize = TILE_PIXELS * 5;

/// Pixel encoding of a reconstructed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel.
    Grayscale8,
    /// Four bytes per pixel, blue first, alpha last.
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Grayscale8 => 1,
            PixelFormat::Bgra8 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Grayscale8 => "Grayscale8",
            PixelFormat::Bgra8 => "BGRA8",
        }
    }
}

/// A reconstructed, tile-padded raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Logical width, for cropping.
    pub width: u32,
    /// Logical height, for cropping.
    pub height: u32,
    pub padded_width: u32,
    pub padded_height: u32,
    pub format: PixelFormat,
    /// `padded_height` rows of `stride()` bytes.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Bytes per padded row.
    pub fn stride(&self) -> usize {
        self.padded_width as usize * self.format.bytes_per_pixel()
    }

    /// Pixel bytes restricted to the logical width and height.
    pub fn cropped(&self) -> Vec<u8> {
        let stride = self.stride();
        let row_len = self.width.min(self.padded_width) as usize * self.format.bytes_per_pixel();
        let rows = self.height.min(self.padded_height) as usize;

        let mut out = Vec::with_capacity(row_len * rows);
        for row in self.data.chunks(stride).take(rows) {
            out.extend_from_slice(&row[..row_len.min(row.len())]);
        }
        out
    }

    /// Whether no pixel is visible: zero alpha everywhere, or all-zero grayscale.
    pub fn is_blank(&self) -> bool {
        match self.format {
            PixelFormat::Grayscale8 => self.data.iter().all(|&v| v == 0),
            PixelFormat::Bgra8 => self.data.chunks_exact(4).all(|px| px[3] == 0),
        }
    }

    /// Cropped image with channels in RGBA order.
    pub fn to_image(&self) -> Result<DynamicImage> {
        let width = self.width.min(self.padded_width);
        let height = self.height.min(self.padded_height);
        let mut pixels = self.cropped();

        match self.format {
            PixelFormat::Grayscale8 => GrayImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageLuma8)
                .ok_or(Error::ImageBufferFailed),
            PixelFormat::Bgra8 => {
                for px in pixels.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
                RgbaImage::from_raw(width, height, pixels)
                    .map(DynamicImage::ImageRgba8)
                    .ok_or(Error::ImageBufferFailed)
            }
        }
    }
}
