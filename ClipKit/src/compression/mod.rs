//! Compression utilities

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{Error, Result};

/// Decompresses a single tile payload.
pub trait Decompressor: Send + Sync {
    /// Decompress `data`. `size_hint` is the declared uncompressed size and is
    /// only used to size the output buffer.
    fn decompress(&self, data: &[u8], size_hint: usize) -> Result<Vec<u8>>;
}

/// Zlib (RFC 1950) decompressor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibDecompressor;

impl Decompressor for ZlibDecompressor {
    fn decompress(&self, data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
        decompress_zlib(data, size_hint)
    }
}

/// Decompress Zlib data
///
/// # Errors
/// Returns an error if the stream is not valid Zlib.
pub fn decompress_zlib(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(size_hint);

    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::ZlibDecompressionFailed {
            message: e.to_string(),
        })?;

    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn test_zlib() {
        let original = vec![7u8; 4096];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let out = ZlibDecompressor.decompress(&compressed, original.len()).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn test_zlib_garbage() {
        let err = decompress_zlib(&[1, 2, 3, 4], 16).unwrap_err();
        assert!(matches!(err, Error::ZlibDecompressionFailed { .. }));
    }
}
