//! External pixel data chunks
//!
//! Each `CHNKExta` chunk holds the pixels of one offscreen, split into named
//! sub-blocks:
//!
//! ```text
//! [i64 BE id length][id, at most 40 bytes][i64 BE total size]
//! [block][block]...            until the chunk end
//! ```
//!
//! Tiles arrive as `BlockDataBeginChunk` blocks. Each one is zlib-decompressed
//! and appended to the output in stream order; empty tiles contribute zeros.

mod block;

pub use block::{
    BlockHeader, BlockKind, BlockReader, TileHeader, MAX_NAME_LEN, NAME_ONLY_MARKER, TOO_BIG_NAME,
    encode_utf16_be,
};

use std::io::{Read, Seek, SeekFrom};

use crate::compression::Decompressor;
use crate::container::ChunkEntry;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::Result;

/// Longest identifier read from a chunk header.
pub const MAX_ID_LEN: i64 = 40;

/// Default ceiling on a decoded payload. Declared sizes above it are treated
/// as corrupt rather than allocated.
pub const MAX_DECLARED_SIZE: u64 = 1 << 32;

/// Decoded pixel payload of one external-data chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalData {
    pub id: String,
    /// Total size from the chunk header.
    pub declared_size: u64,
    /// Tile-ordered bytes; at least `declared_size` long.
    pub bytes: Vec<u8>,
    /// Number of `BlockDataBeginChunk` blocks seen.
    pub tile_count: usize,
}

/// Read only the identifier of an external-data chunk.
///
/// The read never leaves the chunk: a payload too short for the length field
/// is a [`crate::Error::MalformedBlock`], and the id is cut at the chunk end.
pub fn read_external_id<R: Read + Seek>(reader: &mut R, chunk: &ChunkEntry) -> Result<String> {
    reader.seek(SeekFrom::Start(chunk.data_offset()))?;
    let mut block = BlockReader::new(reader, chunk.data_offset());
    read_id(&mut block, chunk.end)
}

fn read_id<R: Read + Seek>(block: &mut BlockReader<'_, R>, chunk_end: u64) -> Result<String> {
    let remaining = chunk_end.saturating_sub(block.position()?);
    if remaining < 8 {
        return Err(block.malformed(format!("{remaining} bytes left for the id length")));
    }
    let len = block.i64_be()?.clamp(0, MAX_ID_LEN) as u64;

    let raw = block.bytes(len.min(remaining - 8) as usize)?;
    Ok(String::from_utf8_lossy(&raw)
        .trim_end_matches('\0')
        .to_string())
}

/// Decode every sub-block of an external-data chunk.
///
/// Non-fatal conditions (size mismatches, short compressed records, tiles out
/// of order) are reported to `sink`. Structural damage to a block is returned
/// as [`crate::Error::MalformedBlock`], as is a declared size or a running
/// total above `max_size`.
pub fn decode_external_chunk<R: Read + Seek>(
    reader: &mut R,
    chunk: &ChunkEntry,
    max_size: u64,
    decompressor: &dyn Decompressor,
    sink: &dyn DiagnosticSink,
) -> Result<ExternalData> {
    reader.seek(SeekFrom::Start(chunk.data_offset()))?;

    let mut head = BlockReader::new(reader, chunk.data_offset());
    let id = read_id(&mut head, chunk.end)?;
    let declared = head.i64_be()?;
    let declared_size = u64::try_from(declared)
        .ok()
        .filter(|&size| size <= max_size)
        .ok_or_else(|| head.malformed(format!("implausible total size {declared}")))?;
    tracing::debug!("external data '{id}': {declared_size} bytes declared");

    // Grows with the decoded tiles; the declared size is not trusted up front.
    let mut out: Vec<u8> = Vec::new();
    let mut tile_count = 0usize;

    let mut pos = reader.stream_position()?;
    while pos < chunk.end {
        let mut block = BlockReader::new(reader, pos);
        let header = block.header()?;
        tracing::debug!(
            "  block at 0x{:08X} '{}', {} bytes",
            header.start,
            header.kind.name(),
            header.data_len
        );

        let block_end = match header.kind {
            BlockKind::BeginChunk => {
                let end = decode_tile(
                    &mut block,
                    &header,
                    chunk.end,
                    max_size,
                    tile_count,
                    &mut out,
                    decompressor,
                    sink,
                )?;
                tile_count += 1;
                end
            }
            BlockKind::Status | BlockKind::CheckSum => {
                let words = block.info_words()?;
                tracing::debug!("    {} {:?}", header.kind.name(), words);
                header.data_start + 24 + u64::from(header.data_len)
            }
            BlockKind::Other(_) => header.data_start + u64::from(header.data_len),
        };

        reader.seek(SeekFrom::Start(block_end))?;
        pos = block_end;
    }

    if out.len() as u64 != declared_size {
        sink.report(Diagnostic::PayloadSizeMismatch {
            id: id.clone(),
            declared: declared_size,
            actual: out.len(),
        });
        if (out.len() as u64) < declared_size {
            out.resize(declared_size as usize, 0);
        }
    }

    Ok(ExternalData {
        id,
        declared_size,
        bytes: out,
        tile_count,
    })
}

/// Decode one `BlockDataBeginChunk` body and return the block end offset.
fn decode_tile<R: Read + Seek>(
    block: &mut BlockReader<'_, R>,
    header: &BlockHeader,
    chunk_end: u64,
    max_size: u64,
    position: usize,
    out: &mut Vec<u8>,
    decompressor: &dyn Decompressor,
    sink: &dyn DiagnosticSink,
) -> Result<u64> {
    let tile = block.tile_header()?;
    if tile.index as i64 != position as i64 {
        sink.report(Diagnostic::TileOrderMismatch {
            declared: tile.index,
            position,
        });
    }
    let uncompressed = usize::try_from(tile.uncompressed_size)
        .map_err(|_| block.malformed(format!("negative tile size {}", tile.uncompressed_size)))?;
    if (out.len() + uncompressed) as u64 > max_size {
        return Err(block.malformed(format!(
            "tile {} grows the payload past {max_size} bytes",
            tile.index
        )));
    }

    if tile.not_empty <= 0 {
        tracing::debug!("    tile {} empty", tile.index);
        out.resize(out.len() + uncompressed, 0);
        return Ok(header.data_start + 20);
    }

    let record_len = block.i32_be()?;
    // The only little-endian field in the format.
    let compressed_len = block.u32_le()?;
    if record_len < 0 {
        return Err(block.malformed(format!("negative record length {record_len}")));
    }
    if i64::from(compressed_len) < i64::from(record_len) - 4 {
        sink.report(Diagnostic::CompressedLengthShort {
            tile_index: tile.index,
            compressed: compressed_len,
            record: record_len,
        });
    }

    let data_pos = block.position()?;
    if data_pos + u64::from(compressed_len) > chunk_end {
        return Err(block.malformed(format!(
            "compressed length {compressed_len} runs past chunk end"
        )));
    }

    let compressed = block.bytes(compressed_len as usize)?;
    let pixels = decompressor.decompress(&compressed, uncompressed)?;
    if pixels.len() != uncompressed {
        sink.report(Diagnostic::TileSizeMismatch {
            tile_index: tile.index,
            declared: uncompressed,
            actual: pixels.len(),
        });
    }
    tracing::debug!(
        "    tile {}: {}/{} bytes -> {}",
        tile.index,
        record_len,
        compressed_len,
        pixels.len()
    );
    out.extend_from_slice(&pixels);

    Ok(header.data_start + 24 + record_len as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::ZlibDecompressor;
    use crate::container::{CHUNK_HEADER_LEN, TAG_EXTERNAL};
    use crate::diagnostics::CollectingSink;
    use crate::error::Error;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::{Cursor, Write};

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn named(name: &str, data_len: u32) -> Vec<u8> {
        let mut out = data_len.to_be_bytes().to_vec();
        out.extend_from_slice(&(name.encode_utf16().count() as u32).to_be_bytes());
        out.extend_from_slice(&encode_utf16_be(name));
        out
    }

    fn tile(index: i32, pixels: &[u8]) -> Vec<u8> {
        let compressed = zlib(pixels);
        let mut body = Vec::new();
        for v in [index, pixels.len() as i32, 256, 256, 1] {
            body.extend_from_slice(&v.to_be_bytes());
        }
        body.extend_from_slice(&(compressed.len() as i32 + 4).to_be_bytes());
        body.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        body.extend_from_slice(&compressed);

        let name = "BlockDataBeginChunk";
        let mut out = (name.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&encode_utf16_be(name));
        out.extend_from_slice(&body);
        out
    }

    fn empty_tile(index: i32, size: i32) -> Vec<u8> {
        let name = "BlockDataBeginChunk";
        let mut out = (name.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&encode_utf16_be(name));
        for v in [index, size, 256, 256, 0] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out
    }

    fn status() -> Vec<u8> {
        let mut out = named("BlockStatus", 0);
        out.extend(std::iter::repeat_n(0u8, 24));
        out
    }

    /// Wrap blocks in a chunk record starting at offset 0.
    fn chunk(id: &str, total: i64, blocks: &[Vec<u8>]) -> (Vec<u8>, ChunkEntry) {
        let mut payload = (id.len() as i64).to_be_bytes().to_vec();
        payload.extend_from_slice(id.as_bytes());
        payload.extend_from_slice(&total.to_be_bytes());
        for b in blocks {
            payload.extend_from_slice(b);
        }

        let mut data = TAG_EXTERNAL.to_vec();
        data.extend_from_slice(&(payload.len() as i64).to_be_bytes());
        data.extend_from_slice(&payload);
        let entry = ChunkEntry {
            tag: TAG_EXTERNAL,
            start: 0,
            end: data.len() as u64,
            size: payload.len() as u64,
        };
        (data, entry)
    }

    #[test]
    fn test_tiles_append_in_order() {
        let a = vec![1u8; 1000];
        let b = vec![2u8; 500];
        let (data, entry) = chunk(
            "extrnlid0001",
            1500,
            &[status(), tile(0, &a), empty_tile(1, 300), tile(2, &b)],
        );

        let sink = CollectingSink::new();
        let decoded = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            MAX_DECLARED_SIZE,
            &ZlibDecompressor,
            &sink,
        )
        .unwrap();

        assert_eq!(decoded.id, "extrnlid0001");
        assert_eq!(decoded.tile_count, 3);
        assert_eq!(decoded.bytes.len(), 1800);
        assert!(decoded.bytes[..1000].iter().all(|&v| v == 1));
        assert!(decoded.bytes[1000..1300].iter().all(|&v| v == 0));
        assert!(decoded.bytes[1300..].iter().all(|&v| v == 2));
        assert!(sink.entries().iter().any(|d| matches!(d, Diagnostic::PayloadSizeMismatch { .. })));
    }

    #[test]
    fn test_unknown_block_is_skipped() {
        let mut unknown = named("SomethingElse", 7);
        unknown.extend_from_slice(&[0xEE; 7]);
        let pixels = vec![9u8; 64];
        let (data, entry) = chunk("id", 64, &[unknown, tile(0, &pixels)]);

        let sink = CollectingSink::new();
        let decoded = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            MAX_DECLARED_SIZE,
            &ZlibDecompressor,
            &sink,
        )
        .unwrap();
        assert_eq!(decoded.bytes, pixels);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_short_payload_is_zero_extended() {
        let (data, entry) = chunk("id", 100, &[tile(0, &[5u8; 10])]);
        let decoded = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            MAX_DECLARED_SIZE,
            &ZlibDecompressor,
            &CollectingSink::new(),
        )
        .unwrap();
        assert_eq!(decoded.bytes.len(), 100);
        assert_eq!(&decoded.bytes[..10], &[5u8; 10]);
        assert!(decoded.bytes[10..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_tile_order_mismatch_reported() {
        let (data, entry) = chunk("id", 20, &[tile(1, &[1u8; 10]), tile(0, &[2u8; 10])]);
        let sink = CollectingSink::new();
        let decoded = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            MAX_DECLARED_SIZE,
            &ZlibDecompressor,
            &sink,
        )
        .unwrap();

        // Emission order wins over the declared index.
        assert_eq!(decoded.bytes[0], 1);
        assert_eq!(decoded.bytes[10], 2);
        assert_eq!(
            sink.entries(),
            vec![
                Diagnostic::TileOrderMismatch { declared: 1, position: 0 },
                Diagnostic::TileOrderMismatch { declared: 0, position: 1 },
            ]
        );
    }

    #[test]
    fn test_compressed_length_past_chunk_end() {
        let mut bad = tile(0, &[1u8; 32]);
        // Inflate the little-endian compressed length well past the chunk.
        let len_at = 4 + 38 + 20 + 4;
        bad[len_at..len_at + 4].copy_from_slice(&10_000u32.to_le_bytes());
        let (data, entry) = chunk("id", 32, &[bad]);

        let err = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            MAX_DECLARED_SIZE,
            &ZlibDecompressor,
            &CollectingSink::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedBlock { .. }));
        assert!(err.is_layer_local());
    }

    #[test]
    fn test_id_is_clamped() {
        let long_id = "x".repeat(60);
        let mut payload = 60i64.to_be_bytes().to_vec();
        payload.extend_from_slice(long_id.as_bytes());
        let mut data = TAG_EXTERNAL.to_vec();
        data.extend_from_slice(&(payload.len() as i64).to_be_bytes());
        data.extend_from_slice(&payload);
        let entry = ChunkEntry {
            tag: TAG_EXTERNAL,
            start: 0,
            end: data.len() as u64,
            size: payload.len() as u64,
        };

        let id = read_external_id(&mut Cursor::new(data), &entry).unwrap();
        assert_eq!(id.len(), 40);
        assert_eq!(entry.data_offset(), CHUNK_HEADER_LEN);
    }

    fn bare_chunk(payload: &[u8], trailing: &[u8]) -> (Vec<u8>, ChunkEntry) {
        let mut data = TAG_EXTERNAL.to_vec();
        data.extend_from_slice(&(payload.len() as i64).to_be_bytes());
        data.extend_from_slice(payload);
        let entry = ChunkEntry {
            tag: TAG_EXTERNAL,
            start: 0,
            end: data.len() as u64,
            size: payload.len() as u64,
        };
        data.extend_from_slice(trailing);
        (data, entry)
    }

    #[test]
    fn test_empty_chunk_has_no_id() {
        let (data, entry) = bare_chunk(&[], &[]);
        let err = read_external_id(&mut Cursor::new(data), &entry).unwrap_err();
        assert!(matches!(err, Error::MalformedBlock { offset: 16, .. }));
    }

    #[test]
    fn test_id_stops_at_chunk_end() {
        // The id claims 12 bytes but the chunk holds 4; the next chunk follows.
        let mut payload = 12i64.to_be_bytes().to_vec();
        payload.extend_from_slice(b"abcd");
        let (data, entry) = bare_chunk(&payload, b"CHNKFoot");

        let id = read_external_id(&mut Cursor::new(data), &entry).unwrap();
        assert_eq!(id, "abcd");
    }

    #[test]
    fn test_declared_size_over_limit() {
        let (data, entry) = chunk("id", 1 << 20, &[tile(0, &[1u8; 16])]);
        let err = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            1024,
            &ZlibDecompressor,
            &CollectingSink::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedBlock { .. }));
    }

    #[test]
    fn test_empty_tiles_cannot_exceed_limit() {
        let (data, entry) = chunk("id", 64, &[empty_tile(0, 64), empty_tile(1, i32::MAX)]);
        let err = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            1 << 16,
            &ZlibDecompressor,
            &CollectingSink::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedBlock { .. }));
    }

    #[test]
    fn test_small_chunk_with_large_declared_size() {
        let (data, entry) = chunk("id", 1 << 20, &[tile(0, &[3u8; 16])]);
        let sink = CollectingSink::new();
        let decoded = decode_external_chunk(
            &mut Cursor::new(data),
            &entry,
            MAX_DECLARED_SIZE,
            &ZlibDecompressor,
            &sink,
        )
        .unwrap();
        assert_eq!(decoded.bytes.len(), 1 << 20);
        assert_eq!(&decoded.bytes[..16], &[3u8; 16]);
        assert_eq!(
            sink.entries(),
            vec![Diagnostic::PayloadSizeMismatch {
                id: "id".to_string(),
                declared: 1 << 20,
                actual: 16,
            }]
        );
    }
}
