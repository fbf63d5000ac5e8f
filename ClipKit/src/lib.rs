//! # ClipKit
//!
//! A pure-Rust reader for Clip Studio Paint project (`.clip`) files.
//!
//! ## What it reads
//!
//! - **Chunk container** - `CSFCHUNK` header and the chunk index
//! - **Metadata** - canvases, layers, mipmaps and offscreens from the embedded SQLite database
//! - **External data** - block-structured, ZLIB-compressed tile payloads
//! - **Rasters** - 256x256 tiles reassembled into grayscale or BGRA layers
//! - **Previews** - canvas preview images, passed through as stored
//!
//! ## Quick Start
//!
//! ### Decoding a layer
//!
//! ```no_run
//! use clipkit::ClipFile;
//!
//! let mut clip = ClipFile::open("illustration.clip")?;
//! for canvas_id in clip.canvas_ids() {
//!     let layer_ids: Vec<i64> = clip.tables().layers_in_canvas(canvas_id).map(|l| l.id).collect();
//!     for layer_id in layer_ids {
//!         match clip.layer_raster(canvas_id, layer_id) {
//!             Ok(raster) => println!("layer {layer_id}: {}x{}", raster.width, raster.height),
//!             Err(e) => println!("layer {layer_id} skipped: {e}"),
//!         }
//!     }
//! }
//! # Ok::<(), clipkit::Error>(())
//! ```
//!
//! ### Exporting to PNG
//!
//! ```no_run
//! use std::path::Path;
//! use clipkit::export::{ExportOptions, export_file};
//!
//! let result = export_file(
//!     Path::new("illustration.clip"),
//!     Path::new("out/"),
//!     &ExportOptions::default(),
//!     &|_| {},
//! )?;
//! println!("{} files written, {} layers failed", result.success_count(), result.fail_count());
//! # Ok::<(), clipkit::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `clipkit` command-line binary

pub mod error;
pub mod diagnostics;
pub mod container;
pub mod metadata;
pub mod compression;
pub mod external;
pub mod raster;
pub mod resolver;
pub mod document;
pub mod export;

// Re-exports for convenience
pub use document::{ClipFile, OpenOptions};
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::document::{ClipFile, OpenOptions};

    pub use crate::container::{ChunkEntry, ChunkIndex};
    pub use crate::diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, TracingSink};
    pub use crate::metadata::{
        CanvasPreview, EntityTables, Layer, LayerThumbnail, Mipmap, MipmapInfo, Offscreen,
    };
    pub use crate::raster::{PixelBuffer, PixelFormat, TileLayout};
    pub use crate::resolver::{LayerSource, Link};

    pub use crate::export::{
        BatchExportResult, ExportOptions, ExportResult, batch_export, export_clip, export_file,
        find_clip_files,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
