//! Tile layout inference from payload length

use super::{COMPOSITE_TILE_BYTES, PixelFormat, TILE_SIZE};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{Error, Result};

/// Dimensions and encoding chosen for a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    pub width: u32,
    pub height: u32,
    pub padded_width: u32,
    pub padded_height: u32,
    pub tiles_per_row: u32,
    pub tiles_per_column: u32,
    pub format: PixelFormat,
    /// Whether the declared dimensions were replaced by a search result.
    pub guessed: bool,
}

impl TileLayout {
    /// Layout for the declared dimensions, without checking any payload.
    ///
    /// Returns `None` when the padded size does not fit in a `u32`.
    pub fn declared(width: u32, height: u32, format: PixelFormat) -> Option<Self> {
        let tiles_per_row = width.div_ceil(TILE_SIZE);
        let tiles_per_column = height.div_ceil(TILE_SIZE);
        Some(Self {
            width,
            height,
            padded_width: tiles_per_row.checked_mul(TILE_SIZE)?,
            padded_height: tiles_per_column.checked_mul(TILE_SIZE)?,
            tiles_per_row,
            tiles_per_column,
            format,
            guessed: false,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_per_row as usize * self.tiles_per_column as usize
    }

    /// Payload length this layout expects.
    pub fn expected_len(&self) -> u64 {
        u64::from(self.padded_width)
            * u64::from(self.padded_height)
            * match self.format {
                PixelFormat::Grayscale8 => 1,
                PixelFormat::Bgra8 => 5,
            }
    }

    /// Pick the encoding and dimensions for a payload of `len` bytes.
    ///
    /// An exact grayscale or composite match for the declared dimensions wins.
    /// Otherwise tile grids from the declared grid up to (but excluding) three
    /// times it are tried, rows outer and columns inner, for the first composite
    /// grid of exactly `len` bytes. The declared padding on each axis is kept.
    pub fn infer(len: usize, width: u32, height: u32, sink: &dyn DiagnosticSink) -> Result<Self> {
        let ambiguous = || Error::PixelLayoutAmbiguous {
            length: len,
            width,
            height,
        };

        let gray = Self::declared(width, height, PixelFormat::Grayscale8).ok_or_else(ambiguous)?;
        if gray.expected_len() == len as u64 {
            return Ok(gray);
        }

        let composite = Self {
            format: PixelFormat::Bgra8,
            ..gray
        };
        if composite.expected_len() == len as u64 {
            return Ok(composite);
        }

        if len % COMPOSITE_TILE_BYTES != 0 {
            return Err(ambiguous());
        }

        let pad_x = composite.padded_width - width;
        let pad_y = composite.padded_height - height;
        let tiles = (len / COMPOSITE_TILE_BYTES) as u64;
        let tpr = u64::from(composite.tiles_per_row);
        let tpc = u64::from(composite.tiles_per_column);

        // For a given row count only one column count can multiply out to `tiles`.
        for y in tpc..(tpc * 3).min(tiles + 1) {
            if tiles % y != 0 {
                continue;
            }
            let x = tiles / y;
            if x < tpr || x >= tpr * 3 {
                continue;
            }

            let Some((padded_width, padded_height)) = padded(x).zip(padded(y)) else {
                continue;
            };
            let layout = Self {
                width: padded_width - pad_x,
                height: padded_height - pad_y,
                padded_width,
                padded_height,
                tiles_per_row: x as u32,
                tiles_per_column: y as u32,
                format: PixelFormat::Bgra8,
                guessed: true,
            };
            sink.report(Diagnostic::LayoutGuessed {
                declared: (width, height),
                inferred: (layout.width, layout.height),
            });
            return Ok(layout);
        }

        Err(ambiguous())
    }
}

/// Pixel extent of `tiles` tiles, if it fits in a `u32`.
fn padded(tiles: u64) -> Option<u32> {
    u32::try_from(tiles.checked_mul(u64::from(TILE_SIZE))?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exact_grayscale() {
        let sink = CollectingSink::new();
        let layout = TileLayout::infer(512 * 512, 500, 300, &sink).unwrap();

        assert_eq!(layout.format, PixelFormat::Grayscale8);
        assert_eq!((layout.padded_width, layout.padded_height), (512, 512));
        assert_eq!((layout.width, layout.height), (500, 300));
        assert_eq!(layout.tile_count(), 4);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_exact_composite() {
        let layout = TileLayout::infer(512 * 256 * 5, 512, 256, &CollectingSink::new()).unwrap();
        assert_eq!(layout.format, PixelFormat::Bgra8);
        assert!(!layout.guessed);
    }

    #[test]
    fn test_heuristic_finds_larger_grid() {
        let sink = CollectingSink::new();
        let layout = TileLayout::infer(1966080, 512, 256, &sink).unwrap();

        assert_eq!(layout.format, PixelFormat::Bgra8);
        assert_eq!((layout.width, layout.height), (768, 512));
        assert_eq!((layout.padded_width, layout.padded_height), (768, 512));
        assert_eq!(layout.tiles_per_row, 3);
        assert!(layout.guessed);
        assert_eq!(
            sink.entries(),
            vec![Diagnostic::LayoutGuessed {
                declared: (512, 256),
                inferred: (768, 512),
            }]
        );
    }

    #[test]
    fn test_heuristic_keeps_padding_delta() {
        // Declared 500x200 pads to 512x256; payload is a 3x2 composite grid.
        let layout =
            TileLayout::infer(768 * 512 * 5, 500, 200, &CollectingSink::new()).unwrap();
        assert_eq!((layout.width, layout.height), (756, 456));
    }

    #[test]
    fn test_no_match_is_ambiguous() {
        let err = TileLayout::infer(12345, 512, 256, &CollectingSink::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::PixelLayoutAmbiguous {
                length: 12345,
                width: 512,
                height: 256
            }
        ));
    }

    #[test]
    fn test_oversized_dimensions_are_ambiguous() {
        let sink = CollectingSink::new();
        let err = TileLayout::infer(0, u32::MAX, 1, &sink).unwrap_err();
        assert!(matches!(err, Error::PixelLayoutAmbiguous { length: 0, .. }));

        // The declared grid fits in u32 pixels but one more column does not.
        let len = COMPOSITE_TILE_BYTES * 16_777_216;
        let err = TileLayout::infer(len, u32::MAX - 300, 1, &sink).unwrap_err();
        assert!(matches!(err, Error::PixelLayoutAmbiguous { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_large_payload_search_is_bounded() {
        // A huge tile count with a tiny declared grid has no match within 3x.
        let len = COMPOSITE_TILE_BYTES * 1_000_003;
        let err = TileLayout::infer(len, 256, 256, &CollectingSink::new()).unwrap_err();
        assert!(matches!(err, Error::PixelLayoutAmbiguous { .. }));
    }
}
