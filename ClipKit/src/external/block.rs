//! Named sub-blocks inside an external-data chunk

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Second header word that marks a name-only header: UTF-16BE "Bl".
pub const NAME_ONLY_MARKER: u32 = 0x0042006C;

/// Names of this many UTF-16 units or more are skipped undecoded.
pub const MAX_NAME_LEN: u32 = 256;

/// Placeholder name for blocks whose name was too long to decode.
pub const TOO_BIG_NAME: &str = "<toobig>";

/// Sub-block types the decoder acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// `BlockDataBeginChunk`: one compressed (or empty) tile.
    BeginChunk,
    /// `BlockStatus`: informational.
    Status,
    /// `BlockCheckSum`: informational.
    CheckSum,
    /// Anything else, skipped by its declared length.
    Other(String),
}

impl BlockKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "BlockDataBeginChunk" => BlockKind::BeginChunk,
            "BlockStatus" => BlockKind::Status,
            "BlockCheckSum" => BlockKind::CheckSum,
            other => BlockKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BlockKind::BeginChunk => "BlockDataBeginChunk",
            BlockKind::Status => "BlockStatus",
            BlockKind::CheckSum => "BlockCheckSum",
            BlockKind::Other(name) => name,
        }
    }
}

/// Decoded sub-block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Absolute offset of the header.
    pub start: u64,
    pub kind: BlockKind,
    /// Declared data length; 0 for name-only headers.
    pub data_len: u32,
    /// Absolute offset just past the name.
    pub data_start: u64,
}

/// Fixed fields opening a `BlockDataBeginChunk` body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {
    pub index: i32,
    pub uncompressed_size: i32,
    pub width: i32,
    pub height: i32,
    pub not_empty: i32,
}

/// Reads block fields, turning a premature end of data into [`Error::MalformedBlock`].
pub struct BlockReader<'a, R: Read + Seek> {
    reader: &'a mut R,
    block_start: u64,
}

impl<'a, R: Read + Seek> BlockReader<'a, R> {
    pub fn new(reader: &'a mut R, block_start: u64) -> Self {
        Self {
            reader,
            block_start,
        }
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.reader.stream_position()?)
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<BigEndian>();
        self.check(value)
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        let value = self.reader.read_u32::<LittleEndian>();
        self.check(value)
    }

    pub fn i32_be(&mut self) -> Result<i32> {
        let value = self.reader.read_i32::<BigEndian>();
        self.check(value)
    }

    pub fn i64_be(&mut self) -> Result<i64> {
        let value = self.reader.read_i64::<BigEndian>();
        self.check(value)
    }

    pub fn bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let read = self.reader.read_exact(&mut buf);
        self.check(read)?;
        Ok(buf)
    }

    /// Read a block header at the current position.
    ///
    /// Two big-endian words A and B. When B is [`NAME_ONLY_MARKER`], A is the name
    /// length and the name starts right after A (B is the first name character).
    /// Otherwise A is the data length and B the name length.
    pub fn header(&mut self) -> Result<BlockHeader> {
        let a = self.u32_be()?;
        let b = self.u32_be()?;

        let (data_len, name_len) = if b == NAME_ONLY_MARKER {
            self.seek(self.block_start + 4)?;
            (0, a)
        } else {
            (a, b)
        };

        let name = if name_len < MAX_NAME_LEN {
            let raw = self.bytes(name_len as usize * 2)?;
            decode_utf16_be(&raw)
        } else {
            self.skip(u64::from(name_len) * 2)?;
            TOO_BIG_NAME.to_string()
        };

        Ok(BlockHeader {
            start: self.block_start,
            kind: BlockKind::from_name(&name),
            data_len,
            data_start: self.position()?,
        })
    }

    pub fn tile_header(&mut self) -> Result<TileHeader> {
        Ok(TileHeader {
            index: self.i32_be()?,
            uncompressed_size: self.i32_be()?,
            width: self.i32_be()?,
            height: self.i32_be()?,
            not_empty: self.i32_be()?,
        })
    }

    /// The six informational words of a status or checksum block.
    pub fn info_words(&mut self) -> Result<[i32; 6]> {
        let mut words = [0i32; 6];
        for word in &mut words {
            *word = self.i32_be()?;
        }
        Ok(words)
    }

    pub fn malformed(&self, message: impl Into<String>) -> Error {
        Error::MalformedBlock {
            offset: self.block_start,
            message: message.into(),
        }
    }

    fn check<T>(&self, result: io::Result<T>) -> Result<T> {
        result.map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => self.malformed("unexpected end of data"),
            _ => Error::Io(e),
        })
    }
}

fn decode_utf16_be(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// UTF-16BE encoding of a block name (used when building blocks).
pub fn encode_utf16_be(name: &str) -> Vec<u8> {
    name.encode_utf16().flat_map(u16::to_be_bytes).collect()
}
