//! Tile-to-raster assembly

use super::{COMPOSITE_TILE_BYTES, PixelBuffer, PixelFormat, TILE_PIXELS, TILE_SIZE, TileLayout};
use crate::diagnostics::{Diagnostic, DiagnosticSink};

const TILE_EDGE: usize = TILE_SIZE as usize;

/// Assemble tile-ordered `data` into a padded raster.
///
/// Tiles fill the grid row by row, `tiles_per_row` tiles per row. A composite
/// pixel whose destination falls outside the buffer is skipped and reported.
pub fn reconstruct(data: &[u8], layout: &TileLayout, sink: &dyn DiagnosticSink) -> PixelBuffer {
    let pixels = match layout.format {
        PixelFormat::Grayscale8 => place_grayscale(data, layout, sink),
        PixelFormat::Bgra8 => place_composite(data, layout, sink),
    };

    PixelBuffer {
        width: layout.width,
        height: layout.height,
        padded_width: layout.padded_width,
        padded_height: layout.padded_height,
        format: layout.format,
        data: pixels,
    }
}

fn tile_origin(tile_index: usize, layout: &TileLayout) -> (usize, usize) {
    let per_row = (layout.tiles_per_row as usize).max(1);
    let tile_x = tile_index % per_row;
    let tile_y = tile_index / per_row;
    (tile_x * TILE_EDGE, tile_y * TILE_EDGE)
}

fn place_grayscale(data: &[u8], layout: &TileLayout, sink: &dyn DiagnosticSink) -> Vec<u8> {
    let width = layout.padded_width as usize;
    let mut out = vec![0u8; width * layout.padded_height as usize];

    for (tile_index, tile) in data.chunks_exact(TILE_PIXELS).enumerate() {
        let (x0, y0) = tile_origin(tile_index, layout);

        for (row, src) in tile.chunks_exact(TILE_EDGE).enumerate() {
            let dst = (y0 + row) * width + x0;
            match out.get_mut(dst..dst + TILE_EDGE) {
                Some(target) => target.copy_from_slice(src),
                None => sink.report(Diagnostic::OutOfBoundsWrite {
                    index: dst,
                    len: out.len(),
                }),
            }
        }
    }

    out
}

fn place_composite(data: &[u8], layout: &TileLayout, sink: &dyn DiagnosticSink) -> Vec<u8> {
    let width = layout.padded_width as usize;
    let mut out = vec![0u8; width * layout.padded_height as usize * 4];

    for (tile_index, tile) in data.chunks_exact(COMPOSITE_TILE_BYTES).enumerate() {
        let (x0, y0) = tile_origin(tile_index, layout);
        let (alpha, color) = tile.split_at(TILE_PIXELS);

        for (i, (&a, bgr0)) in alpha.iter().zip(color.chunks_exact(4)).enumerate() {
            let row = i / TILE_EDGE;
            let col = i % TILE_EDGE;
            let dst = ((y0 + row) * width + x0 + col) * 4;

            match out.get_mut(dst..dst + 4) {
                Some(px) => {
                    // Fourth color channel is unused.
                    px[..3].copy_from_slice(&bgr0[..3]);
                    px[3] = a;
                }
                None => sink.report(Diagnostic::OutOfBoundsWrite {
                    index: dst,
                    len: out.len(),
                }),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    fn composite_tile(alpha: u8, bgr0: [u8; 4]) -> Vec<u8> {
        let mut tile = vec![alpha; TILE_PIXELS];
        for _ in 0..TILE_PIXELS {
            tile.extend_from_slice(&bgr0);
        }
        tile
    }

    #[test]
    fn test_grayscale_tiles_placed_row_major() {
        let mut data = Vec::new();
        for t in 0..4u8 {
            data.extend(std::iter::repeat_n(t + 1, TILE_PIXELS));
        }
        let sink = CollectingSink::new();
        let layout = TileLayout::infer(data.len(), 512, 512, &sink).unwrap();
        let buffer = reconstruct(&data, &layout, &sink);

        let at = |x: usize, y: usize| buffer.data[y * 512 + x];
        assert_eq!(at(0, 0), 1);
        assert_eq!(at(511, 0), 2);
        assert_eq!(at(255, 256), 3);
        assert_eq!(at(256, 511), 4);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_composite_channel_placement() {
        let mut data = composite_tile(0xA0, [1, 2, 3, 4]);
        data.extend(composite_tile(0xA1, [5, 6, 7, 8]));

        let sink = CollectingSink::new();
        let layout = TileLayout::infer(data.len(), 512, 256, &sink).unwrap();
        let buffer = reconstruct(&data, &layout, &sink);

        assert_eq!(buffer.format, PixelFormat::Bgra8);
        assert_eq!(buffer.data.len(), 512 * 256 * 4);
        for px in buffer.data.chunks_exact(4).step_by(97) {
            assert!(px == [1, 2, 3, 0xA0] || px == [5, 6, 7, 0xA1], "{px:?}");
        }
        let pixel = |x: usize, y: usize| &buffer.data[(y * 512 + x) * 4..(y * 512 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), &[1, 2, 3, 0xA0]);
        assert_eq!(pixel(255, 255), &[1, 2, 3, 0xA0]);
        assert_eq!(pixel(256, 0), &[5, 6, 7, 0xA1]);
        assert_eq!(pixel(511, 200), &[5, 6, 7, 0xA1]);
        assert!(!buffer.data.contains(&4));
        assert!(!buffer.data.contains(&8));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_composite_pixels_land_in_place() {
        let channel = |x: usize, y: usize| -> [u8; 4] {
            [
                ((x * 5 + y) % 251) as u8,
                ((x + y * 7) % 253) as u8,
                ((x * 11 + y * 2) % 255) as u8,
                ((x + y * 3) % 256) as u8,
            ]
        };

        // Two tiles side by side: alpha plane first, then BGR plus an unused byte.
        let mut data = Vec::new();
        for tile_x in 0..2 {
            let coords = || {
                (0..TILE_PIXELS).map(move |i| (tile_x * TILE_EDGE + i % TILE_EDGE, i / TILE_EDGE))
            };
            data.extend(coords().map(|(x, y)| channel(x, y)[3]));
            for (x, y) in coords() {
                let [b, g, r, _] = channel(x, y);
                data.extend_from_slice(&[b, g, r, 0xEE]);
            }
        }

        let sink = CollectingSink::new();
        let layout = TileLayout::infer(data.len(), 512, 256, &sink).unwrap();
        let buffer = reconstruct(&data, &layout, &sink);

        for (i, px) in buffer.data.chunks_exact(4).enumerate() {
            let (x, y) = (i % 512, i / 512);
            assert_eq!(px, channel(x, y), "pixel ({x}, {y})");
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn test_out_of_bounds_is_skipped() {
        // One composite tile against a grid too small to hold it.
        let data = composite_tile(0xFF, [9, 9, 9, 9]);
        let layout = TileLayout {
            width: 256,
            height: 128,
            padded_width: 256,
            padded_height: 128,
            tiles_per_row: 1,
            tiles_per_column: 1,
            format: PixelFormat::Bgra8,
            guessed: false,
        };

        let sink = CollectingSink::new();
        let buffer = reconstruct(&data, &layout, &sink);
        assert_eq!(buffer.data.len(), 256 * 128 * 4);
        assert!(buffer.data.chunks_exact(4).all(|px| px == [9, 9, 9, 0xFF]));
        assert_eq!(sink.len(), 256 * 128);
    }
}
