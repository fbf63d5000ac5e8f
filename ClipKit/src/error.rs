//! Error types for `ClipKit`

use std::path::PathBuf;

use thiserror::Error;

use crate::resolver::Link;

/// The error type for `ClipKit` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Container Format Errors ====================
    /// The file is not a chunked project container (missing CSFCHUNK magic).
    #[error("invalid container magic: expected CSFCHUNK, found {0:?}")]
    InvalidContainerMagic([u8; 8]),

    /// The stream ended in the middle of a chunk record.
    #[error("truncated chunk at offset {offset}: {message}")]
    TruncatedChunk {
        /// Offset of the record that could not be read in full.
        offset: u64,
        /// What was being read.
        message: String,
    },

    /// A chunk declared a negative payload length.
    #[error("chunk at offset {offset} declares negative length {length}")]
    NegativeChunkLength {
        /// Offset of the chunk record.
        offset: u64,
        /// The declared length.
        length: i64,
    },

    /// The container has no embedded metadata database chunk.
    #[error("missing metadata: container has no CHNKSQLi chunk")]
    MissingMetadataChunk,

    // ==================== Metadata Errors ====================
    /// `SQLite` error from the embedded metadata database.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A fixed metadata query failed.
    #[error("metadata query on {table} failed: {message}")]
    MetadataQuery {
        /// The queried table.
        table: &'static str,
        /// The underlying error message.
        message: String,
    },

    // ==================== Layer Resolution Errors ====================
    /// A link in the layer resolution chain is missing.
    #[error("incomplete layer data for canvas {canvas_id} layer {layer_id}: missing {missing}")]
    IncompleteLayerData {
        /// Canvas the layer belongs to.
        canvas_id: i64,
        /// The layer being resolved.
        layer_id: i64,
        /// The first link that could not be followed.
        missing: Link,
    },

    /// No external-data chunk carries the requested identifier.
    #[error("external data not found: {0}")]
    ExternalDataNotFound(String),

    // ==================== External Data Errors ====================
    /// A sub-block inside an external-data chunk could not be decoded.
    #[error("malformed block at offset {offset}: {message}")]
    MalformedBlock {
        /// Stream offset of the block.
        offset: u64,
        /// Description of what is invalid.
        message: String,
    },

    /// Zlib decompression failed.
    #[error("Zlib decompression failed: {message}")]
    ZlibDecompressionFailed {
        /// The error message.
        message: String,
    },

    // ==================== Raster Errors ====================
    /// No tile layout matches the decoded payload length.
    #[error("cannot determine pixel layout: {length} bytes for declared {width}x{height}")]
    PixelLayoutAmbiguous {
        /// Length of the decoded payload.
        length: usize,
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },

    /// Failed to create an image buffer from pixel data.
    #[error("failed to create image buffer")]
    ImageBufferFailed,

    /// Failed to encode PNG image.
    #[error("failed to encode PNG: {message}")]
    PngEncodeFailed {
        /// The encoding error message.
        message: String,
    },

    // ==================== Config Errors ====================
    /// Export configuration could not be parsed.
    #[error("invalid config {path}: {message}")]
    InvalidConfig {
        /// The config file path.
        path: PathBuf,
        /// The parse error message.
        message: String,
    },
}

impl Error {
    /// Whether this error is a container format error that aborts opening a file.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidContainerMagic(_)
                | Error::TruncatedChunk { .. }
                | Error::NegativeChunkLength { .. }
                | Error::MissingMetadataChunk
                | Error::Sqlite(_)
                | Error::MetadataQuery { .. }
        )
    }

    /// Whether this error only affects the layer being resolved.
    ///
    /// Batch export skips layers failing with these and keeps going.
    pub fn is_layer_local(&self) -> bool {
        matches!(
            self,
            Error::IncompleteLayerData { .. }
                | Error::ExternalDataNotFound(_)
                | Error::MalformedBlock { .. }
                | Error::ZlibDecompressionFailed { .. }
                | Error::PixelLayoutAmbiguous { .. }
                | Error::ImageBufferFailed
                | Error::PngEncodeFailed { .. }
        )
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::PngEncodeFailed {
            message: err.to_string(),
        }
    }
}

/// A specialized Result type for `ClipKit` operations.
pub type Result<T> = std::result::Result<T, Error>;
