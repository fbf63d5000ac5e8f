//! Non-fatal decode diagnostics
//!
//! Conditions that do not abort decoding (skipped rows, size mismatches,
//! out-of-bounds pixel writes) are reported to a [`DiagnosticSink`] instead of
//! being dropped. The default [`TracingSink`] forwards them to `tracing`.

use std::fmt;
use std::sync::Mutex;

/// How loudly a diagnostic should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Warning,
}

/// A recoverable condition encountered while reading a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A metadata row was missing a required field and was skipped.
    SkippedRow {
        table: &'static str,
        reason: String,
    },
    /// A metadata row repeated a primary id; the first row was kept.
    DuplicateId { table: &'static str, id: i64 },
    /// The scratch copy of the metadata database could not be removed.
    ScratchCleanupFailed { message: String },
    /// A tile decompressed to a different size than it declared.
    TileSizeMismatch {
        tile_index: i32,
        declared: usize,
        actual: usize,
    },
    /// A tile record carried fewer compressed bytes than its record length implies.
    CompressedLengthShort {
        tile_index: i32,
        compressed: u32,
        record: i32,
    },
    /// A tile declared an index different from its position in the stream.
    TileOrderMismatch { declared: i32, position: usize },
    /// The decoded payload differs in length from the declared total size.
    PayloadSizeMismatch {
        id: String,
        declared: u64,
        actual: usize,
    },
    /// Declared dimensions did not match the payload; a layout was guessed.
    LayoutGuessed {
        declared: (u32, u32),
        inferred: (u32, u32),
    },
    /// A composite pixel write landed outside the destination buffer.
    OutOfBoundsWrite { index: usize, len: usize },
    /// The mipmap chain revisits an id.
    MipmapCycle { info_id: i64 },
    /// An external-data chunk header could not be read; the chunk was left out
    /// of the id lookup.
    UnreadableExternalChunk { offset: u64, message: String },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::TileOrderMismatch { .. } | Diagnostic::PayloadSizeMismatch { .. } => {
                Severity::Debug
            }
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SkippedRow { table, reason } => {
                write!(f, "skipped {table} row: {reason}")
            }
            Diagnostic::DuplicateId { table, id } => {
                write!(f, "duplicate {table} id {id}, keeping first row")
            }
            Diagnostic::ScratchCleanupFailed { message } => {
                write!(f, "failed to remove scratch database: {message}")
            }
            Diagnostic::TileSizeMismatch {
                tile_index,
                declared,
                actual,
            } => write!(
                f,
                "tile {tile_index} decompressed to {actual} bytes, expected {declared}"
            ),
            Diagnostic::CompressedLengthShort {
                tile_index,
                compressed,
                record,
            } => write!(
                f,
                "tile {tile_index} compressed length {compressed} shorter than record length {record}"
            ),
            Diagnostic::TileOrderMismatch { declared, position } => {
                write!(f, "tile declares index {declared} at stream position {position}")
            }
            Diagnostic::PayloadSizeMismatch {
                id,
                declared,
                actual,
            } => write!(
                f,
                "external data {id} decoded {actual} bytes, declared {declared}"
            ),
            Diagnostic::LayoutGuessed { declared, inferred } => write!(
                f,
                "declared {}x{} does not match payload, using {}x{}",
                declared.0, declared.1, inferred.0, inferred.1
            ),
            Diagnostic::OutOfBoundsWrite { index, len } => {
                write!(f, "pixel write at {index} outside buffer of {len} bytes")
            }
            Diagnostic::MipmapCycle { info_id } => {
                write!(f, "mipmap chain revisits info {info_id}")
            }
            Diagnostic::UnreadableExternalChunk { offset, message } => {
                write!(f, "skipping external data chunk at 0x{offset:08X}: {message}")
            }
        }
    }
}

/// Receives every non-fatal condition.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

impl<F> DiagnosticSink for F
where
    F: Fn(Diagnostic) + Send + Sync,
{
    fn report(&self, diagnostic: Diagnostic) {
        self(diagnostic);
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic.severity() {
            Severity::Debug => tracing::debug!("{diagnostic}"),
            Severity::Warning => tracing::warn!("{diagnostic}"),
        }
    }
}

/// Collects diagnostics in memory, for callers that want to inspect them afterwards.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}
