//! Top-level chunk container
//!
//! A project file starts with an 8-byte `CSFCHUNK` magic and a 16-byte reserved
//! field, followed by back-to-back chunk records:
//!
//! ```text
//! [8-byte tag][i64 BE payload length][payload]
//! ```
//!
//! This layer only knows chunk boundaries; it never looks inside a payload.

mod chunk;

pub use chunk::{ChunkEntry, ChunkIndex};

/// Container magic.
pub const MAGIC: [u8; 8] = *b"CSFCHUNK";

/// Magic plus the reserved field; the first chunk starts here.
pub const HEADER_LEN: u64 = 24;

/// Tag plus length field of a chunk record.
pub const CHUNK_HEADER_LEN: u64 = 16;

/// File header chunk.
pub const TAG_HEAD: [u8; 8] = *b"CHNKHead";

/// External pixel data chunk.
pub const TAG_EXTERNAL: [u8; 8] = *b"CHNKExta";

/// Embedded `SQLite` metadata database chunk.
pub const TAG_SQLITE: [u8; 8] = *b"CHNKSQLi";

/// Footer chunk.
pub const TAG_FOOT: [u8; 8] = *b"CHNKFoot";
