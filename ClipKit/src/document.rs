//! Open project container
//!
//! [`ClipFile`] ties the layers together: it builds the chunk index, loads the
//! metadata tables once, and decodes external data on demand. Decoded payloads
//! are cached by identifier for the life of the handle.
//!
//! A handle owns a single stream cursor, so its methods that read take
//! `&mut self`. Parallel callers open one handle per worker.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::compression::{Decompressor, ZlibDecompressor};
use crate::container::{ChunkEntry, ChunkIndex, TAG_EXTERNAL, TAG_SQLITE};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::error::{Error, Result};
use crate::external::{ExternalData, MAX_DECLARED_SIZE, decode_external_chunk, read_external_id};
use crate::metadata::{self, CanvasPreview, EntityTables, MetadataEngine, SqliteEngine};
use crate::raster::{PixelBuffer, TileLayout, reconstruct};
use crate::resolver::{LayerSource, resolve_layer};

/// Capabilities used by an open container.
#[derive(Clone)]
pub struct OpenOptions {
    engine: Arc<dyn MetadataEngine>,
    decompressor: Arc<dyn Decompressor>,
    sink: Arc<dyn DiagnosticSink>,
    max_external_size: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            engine: Arc::new(SqliteEngine),
            decompressor: Arc::new(ZlibDecompressor),
            sink: Arc::new(TracingSink),
            max_external_size: MAX_DECLARED_SIZE,
        }
    }
}

impl std::fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenOptions")
            .field("max_external_size", &self.max_external_size)
            .finish_non_exhaustive()
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different metadata engine.
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn MetadataEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Use a different tile decompressor.
    #[must_use]
    pub fn decompressor(mut self, decompressor: Arc<dyn Decompressor>) -> Self {
        self.decompressor = decompressor;
        self
    }

    /// Send diagnostics somewhere other than `tracing`.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Largest decoded external-data payload accepted, in bytes.
    ///
    /// Chunks declaring or decoding to more are rejected as malformed.
    #[must_use]
    pub fn max_external_size(mut self, bytes: u64) -> Self {
        self.max_external_size = bytes;
        self
    }

    /// Open a container file.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<ClipFile<File>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut clip = self.open_reader(file)?;
        clip.path = Some(path.to_path_buf());
        Ok(clip)
    }

    /// Open a container from any seekable stream.
    pub fn open_reader<R: Read + Seek>(&self, reader: R) -> Result<ClipFile<R>> {
        ClipFile::with_options(reader, self.clone())
    }
}

/// An open project container.
pub struct ClipFile<R: Read + Seek> {
    reader: BufReader<R>,
    path: Option<PathBuf>,
    index: ChunkIndex,
    tables: EntityTables,
    /// External-data id to its first `CHNKExta` chunk, built on first lookup.
    external_chunks: Option<HashMap<String, ChunkEntry>>,
    cache: HashMap<String, Arc<ExternalData>>,
    options: OpenOptions,
}

impl ClipFile<File> {
    /// Open a container file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        OpenOptions::default().open(path)
    }
}

impl<R: Read + Seek> ClipFile<R> {
    /// Read a container from a stream with default options.
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::with_options(reader, OpenOptions::default())
    }

    /// Build the chunk index and load the metadata tables.
    ///
    /// # Errors
    /// Fails on a malformed container, a missing `CHNKSQLi` chunk, or a failed
    /// metadata query.
    pub fn with_options(reader: R, options: OpenOptions) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let index = ChunkIndex::build(&mut reader)?;

        let sqlite = index.find(&TAG_SQLITE).ok_or(Error::MissingMetadataChunk)?;
        let tables = {
            let scratch = ChunkIndex::read_payload(&mut reader, sqlite)?;
            metadata::read_metadata(options.engine.as_ref(), &scratch, options.sink.as_ref())?
        };

        tracing::info!(
            "opened container: {} chunks, {} canvases",
            index.len(),
            tables.canvas_ids().len()
        );

        Ok(Self {
            reader,
            path: None,
            index,
            tables,
            external_chunks: None,
            cache: HashMap::new(),
            options,
        })
    }

    /// Path the container was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Chunk records of the container, in file order.
    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    /// Metadata tables loaded when the container was opened.
    pub fn tables(&self) -> &EntityTables {
        &self.tables
    }

    /// Options the handle was opened with. Cloning them opens a sibling handle
    /// with the same capabilities.
    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Where this handle reports diagnostics.
    pub fn sink(&self) -> &dyn DiagnosticSink {
        self.options.sink.as_ref()
    }

    /// Canvas ids with layers or a preview, ascending.
    pub fn canvas_ids(&self) -> Vec<i64> {
        self.tables.canvas_ids()
    }

    pub fn canvas_previews(&self) -> impl Iterator<Item = &CanvasPreview> {
        self.tables.previews().iter()
    }

    /// First preview recorded for a canvas.
    pub fn canvas_preview(&self, canvas_id: i64) -> Option<&CanvasPreview> {
        self.canvas_previews().find(|p| p.canvas_id == canvas_id)
    }

    /// Resolve a layer without decoding pixels.
    pub fn resolve(&self, canvas_id: i64, layer_id: i64) -> Result<LayerSource> {
        resolve_layer(&self.tables, canvas_id, layer_id)
    }

    /// Whether an external-data payload has already been decoded.
    pub fn is_cached(&self, id: &str) -> bool {
        self.cache.contains_key(id)
    }

    /// Decode (or fetch from cache) the external data with the given identifier.
    pub fn external_data(&mut self, id: &str) -> Result<Arc<ExternalData>> {
        if let Some(hit) = self.cache.get(id) {
            tracing::debug!("external data '{id}' cache hit");
            return Ok(Arc::clone(hit));
        }

        let chunk = *self
            .external_chunks()
            .get(id)
            .ok_or_else(|| Error::ExternalDataNotFound(id.to_string()))?;

        let decoded = decode_external_chunk(
            &mut self.reader,
            &chunk,
            self.options.max_external_size,
            self.options.decompressor.as_ref(),
            self.options.sink.as_ref(),
        )?;
        let decoded = Arc::new(decoded);
        self.cache.insert(id.to_string(), Arc::clone(&decoded));
        Ok(decoded)
    }

    /// Resolve a layer, decode its external data, and assemble the raster.
    ///
    /// All failures here are local to the layer.
    pub fn layer_raster(&mut self, canvas_id: i64, layer_id: i64) -> Result<PixelBuffer> {
        let source = self.resolve(canvas_id, layer_id)?;
        let data = self.external_data(&source.external_id)?;

        let sink = self.options.sink.as_ref();
        let layout = TileLayout::infer(data.bytes.len(), source.width, source.height, sink)?;
        tracing::debug!(
            "layer {layer_id} '{}': {}x{} -> {}x{} {}",
            source.name,
            layout.width,
            layout.height,
            layout.padded_width,
            layout.padded_height,
            layout.format.name()
        );
        Ok(reconstruct(&data.bytes, &layout, sink))
    }

    /// Id lookup over every readable `CHNKExta` chunk. Built once; a chunk
    /// whose header cannot be read is reported and left out.
    fn external_chunks(&mut self) -> &HashMap<String, ChunkEntry> {
        let Self {
            reader,
            index,
            options,
            external_chunks,
            ..
        } = self;

        external_chunks.get_or_insert_with(|| {
            let mut map = HashMap::new();
            for chunk in index.find_all(&TAG_EXTERNAL) {
                match read_external_id(&mut *reader, chunk) {
                    Ok(id) => {
                        map.entry(id).or_insert(*chunk);
                    }
                    Err(e) => options.sink.report(Diagnostic::UnreadableExternalChunk {
                        offset: chunk.start,
                        message: e.to_string(),
                    }),
                }
            }
            map
        })
    }
}
