//! Chunk index builder

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use super::{CHUNK_HEADER_LEN, HEADER_LEN, MAGIC};
use crate::error::{Error, Result};

/// A single top-level chunk record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEntry {
    /// 8-byte ASCII tag identifying the chunk type.
    pub tag: [u8; 8],
    /// Absolute offset of the record (tag field).
    pub start: u64,
    /// Absolute offset one past the last payload byte.
    pub end: u64,
    /// Declared payload size.
    pub size: u64,
}

impl ChunkEntry {
    /// Absolute offset where the payload begins.
    pub fn data_offset(&self) -> u64 {
        self.start + CHUNK_HEADER_LEN
    }

    /// Tag as a string (for display).
    pub fn tag_str(&self) -> &str {
        std::str::from_utf8(&self.tag).unwrap_or("????????")
    }
}

/// Ordered index of every top-level chunk in a container.
#[derive(Debug, Clone, Default)]
pub struct ChunkIndex {
    chunks: Vec<ChunkEntry>,
}

impl ChunkIndex {
    /// Scan the container and record every chunk boundary.
    ///
    /// Leaves the reader positioned at the end of the stream.
    ///
    /// # Errors
    /// Returns an error if the magic is wrong, a record is cut off by the end of
    /// the stream, or a record declares a negative length.
    pub fn build<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 8];
        read_or_truncated(reader, &mut magic, 0, "container magic")?;
        if magic != MAGIC {
            return Err(Error::InvalidContainerMagic(magic));
        }
        if stream_len < HEADER_LEN {
            return Err(Error::TruncatedChunk {
                offset: 8,
                message: "reserved header field".to_string(),
            });
        }
        reader.seek(SeekFrom::Start(HEADER_LEN))?;

        let mut chunks = Vec::new();
        let mut pos = HEADER_LEN;
        while pos < stream_len {
            if stream_len - pos < CHUNK_HEADER_LEN {
                return Err(Error::TruncatedChunk {
                    offset: pos,
                    message: format!("{} bytes left for a 16-byte header", stream_len - pos),
                });
            }

            let mut tag = [0u8; 8];
            reader.read_exact(&mut tag)?;
            let length = reader.read_i64::<BigEndian>()?;
            if length < 0 {
                return Err(Error::NegativeChunkLength {
                    offset: pos,
                    length,
                });
            }

            let size = length as u64;
            let end = pos
                .checked_add(CHUNK_HEADER_LEN)
                .and_then(|p| p.checked_add(size))
                .filter(|&end| end <= stream_len)
                .ok_or_else(|| Error::TruncatedChunk {
                    offset: pos,
                    message: format!(
                        "payload of {size} bytes runs past end of stream ({stream_len})"
                    ),
                })?;

            let entry = ChunkEntry {
                tag,
                start: pos,
                end,
                size,
            };
            tracing::debug!(
                "chunk {} at {}..{} ({} bytes)",
                entry.tag_str(),
                entry.start,
                entry.end,
                entry.size
            );
            chunks.push(entry);

            reader.seek(SeekFrom::Start(end))?;
            pos = end;
        }

        Ok(Self { chunks })
    }

    /// All chunks in file order.
    pub fn chunks(&self) -> &[ChunkEntry] {
        &self.chunks
    }

    /// Iterate over the chunks in file order.
    pub fn iter(&self) -> impl Iterator<Item = &ChunkEntry> {
        self.chunks.iter()
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Find a chunk by its tag. Returns the first match.
    pub fn find(&self, tag: &[u8; 8]) -> Option<&ChunkEntry> {
        self.chunks.iter().find(|c| &c.tag == tag)
    }

    /// Every chunk with the given tag, in file order.
    pub fn find_all<'a>(&'a self, tag: &'a [u8; 8]) -> impl Iterator<Item = &'a ChunkEntry> {
        self.chunks.iter().filter(move |c| &c.tag == tag)
    }

    /// Read a chunk's payload into memory.
    pub fn read_payload<R: Read + Seek>(reader: &mut R, entry: &ChunkEntry) -> Result<Vec<u8>> {
        reader.seek(SeekFrom::Start(entry.data_offset()))?;
        let mut payload = vec![0u8; entry.size as usize];
        read_or_truncated(reader, &mut payload, entry.data_offset(), "chunk payload")?;
        Ok(payload)
    }
}

fn read_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    offset: u64,
    what: &str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedChunk {
            offset,
            message: what.to_string(),
        },
        _ => Error::Io(e),
    })
}
