//! Export of layer rasters and canvas previews to image files
//!
//! Output layout under the destination directory:
//!
//! ```text
//! canvas_0001.png                     verbatim canvas preview
//! canvas_0001/layer_0002_[Ink].png    one PNG per raster layer
//! ```
//!
//! A layer that fails to decode is recorded in the result and skipped; only a
//! failure to open the container aborts an export.

mod png;

pub use png::{
    canvas_dir_name, encode_png, layer_file_name, preview_extension, preview_file_name,
    sanitize_name,
};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::document::{ClipFile, OpenOptions};
use crate::error::{Error, Result};

fn default_true() -> bool {
    true
}

/// Export settings, loadable from a TOML file.
///
/// ```toml
/// include_previews = true
/// include_layers = true
/// canvas = 1
/// layers = [2, 5]
/// parallel = true
/// skip_empty = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_true")]
    pub include_previews: bool,
    #[serde(default = "default_true")]
    pub include_layers: bool,
    /// Only export this canvas.
    #[serde(default)]
    pub canvas: Option<i64>,
    /// Only export these layer ids; empty means all.
    #[serde(default)]
    pub layers: Vec<i64>,
    /// Decode layers on rayon workers, one container handle each.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Skip layers with no visible pixels.
    #[serde(default)]
    pub skip_empty: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_previews: true,
            include_layers: true,
            canvas: None,
            layers: Vec::new(),
            parallel: true,
            skip_empty: false,
        }
    }
}

impl ExportOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::InvalidConfig {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidConfig {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    fn wants_canvas(&self, canvas_id: i64) -> bool {
        self.canvas.is_none_or(|c| c == canvas_id)
    }

    fn wants_layer(&self, layer_id: i64) -> bool {
        self.layers.is_empty() || self.layers.contains(&layer_id)
    }
}

/// Progress of an export.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    pub current: usize,
    pub total: usize,
    /// What is being written, for display.
    pub item: String,
}

/// Progress callback type
pub type ProgressCallback<'a> = &'a (dyn Fn(&ExportProgress) + Sync);

/// A layer that could not be exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFailure {
    pub canvas_id: i64,
    pub layer_id: i64,
    pub message: String,
}

/// Summary of exporting one container.
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    /// Files written, previews first.
    pub written: Vec<PathBuf>,
    /// Layers without raster data (folders, empty layers), with the reason.
    pub skipped: Vec<(i64, i64, String)>,
    pub failures: Vec<LayerFailure>,
}

impl ExportResult {
    pub fn success_count(&self) -> usize {
        self.written.len()
    }

    pub fn fail_count(&self) -> usize {
        self.failures.len()
    }
}

enum LayerOutcome {
    Written(PathBuf),
    Skipped(i64, i64, String),
    Failed(LayerFailure),
}

/// Export a container with default open options.
pub fn export_file(
    path: &Path,
    dest: &Path,
    options: &ExportOptions,
    progress: ProgressCallback,
) -> Result<ExportResult> {
    export_file_with(path, dest, options, &OpenOptions::default(), progress)
}

/// Export previews and layer rasters of one container.
///
/// # Errors
/// Fails only if the container cannot be opened or `dest` cannot be created;
/// per-layer problems are collected in the result.
pub fn export_file_with(
    path: &Path,
    dest: &Path,
    options: &ExportOptions,
    open: &OpenOptions,
    progress: ProgressCallback,
) -> Result<ExportResult> {
    let mut clip = open.open(path)?;
    export_clip(&mut clip, dest, options, progress)
}

/// Export an already opened container.
///
/// Parallel export reopens the file once per worker batch with the handle's
/// own options, so it needs a handle opened from a path.
///
/// # Errors
/// Fails only if `dest` cannot be created or a preview cannot be written.
pub fn export_clip(
    clip: &mut ClipFile<File>,
    dest: &Path,
    options: &ExportOptions,
    progress: ProgressCallback,
) -> Result<ExportResult> {
    std::fs::create_dir_all(dest)?;

    let mut result = ExportResult::default();

    if options.include_previews {
        for preview in clip.canvas_previews().filter(|p| options.wants_canvas(p.canvas_id)) {
            let ext = preview_extension(&preview.image_data);
            let out = dest.join(preview_file_name(preview.canvas_id, ext));
            std::fs::write(&out, &preview.image_data)?;
            tracing::info!("wrote preview {}", out.display());
            result.written.push(out);
        }
    }

    if !options.include_layers {
        return Ok(result);
    }

    let jobs: Vec<(i64, i64)> = clip
        .canvas_ids()
        .into_iter()
        .filter(|&c| options.wants_canvas(c))
        .flat_map(|c| {
            clip.tables()
                .layers_in_canvas(c)
                .filter(|l| options.wants_layer(l.id))
                .map(|l| (c, l.id))
                .collect::<Vec<_>>()
        })
        .collect();

    let total = jobs.len();
    let processed = AtomicUsize::new(0);
    let report = |canvas_id: i64, layer_id: i64| {
        let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
        progress(&ExportProgress {
            current,
            total,
            item: format!("canvas {canvas_id} layer {layer_id}"),
        });
    };

    let source = clip.path().map(Path::to_path_buf);
    let outcomes: Vec<LayerOutcome> = match source {
        Some(path) if options.parallel && total > 1 => {
            // One contiguous batch per thread, each with its own handle.
            let open = clip.options().clone();
            let per_worker = total.div_ceil(rayon::current_num_threads()).max(1);
            jobs.par_chunks(per_worker)
                .flat_map_iter(|batch| {
                    let mut worker = open.open(&path);
                    batch
                        .iter()
                        .map(|&(canvas_id, layer_id)| {
                            report(canvas_id, layer_id);
                            match &mut worker {
                                Ok(handle) => {
                                    export_layer(handle, dest, canvas_id, layer_id, options)
                                }
                                Err(e) => LayerOutcome::Failed(LayerFailure {
                                    canvas_id,
                                    layer_id,
                                    message: format!("worker could not open container: {e}"),
                                }),
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        }
        _ => jobs
            .iter()
            .map(|&(canvas_id, layer_id)| {
                report(canvas_id, layer_id);
                export_layer(&mut *clip, dest, canvas_id, layer_id, options)
            })
            .collect(),
    };

    for outcome in outcomes {
        match outcome {
            LayerOutcome::Written(out) => result.written.push(out),
            LayerOutcome::Skipped(c, l, reason) => result.skipped.push((c, l, reason)),
            LayerOutcome::Failed(failure) => {
                tracing::warn!(
                    "layer {} of canvas {} failed: {}",
                    failure.layer_id,
                    failure.canvas_id,
                    failure.message
                );
                result.failures.push(failure);
            }
        }
    }

    Ok(result)
}

fn export_layer<R: std::io::Read + std::io::Seek>(
    clip: &mut ClipFile<R>,
    dest: &Path,
    canvas_id: i64,
    layer_id: i64,
    options: &ExportOptions,
) -> LayerOutcome {
    let failed = |e: &Error| {
        LayerOutcome::Failed(LayerFailure {
            canvas_id,
            layer_id,
            message: e.to_string(),
        })
    };

    let buffer = match clip.layer_raster(canvas_id, layer_id) {
        Ok(buffer) => buffer,
        Err(e @ Error::IncompleteLayerData { .. }) => {
            tracing::debug!("skipping layer {layer_id}: {e}");
            return LayerOutcome::Skipped(canvas_id, layer_id, e.to_string());
        }
        Err(e) => return failed(&e),
    };

    if options.skip_empty && buffer.is_blank() {
        return LayerOutcome::Skipped(canvas_id, layer_id, "no visible pixels".to_string());
    }

    let name = clip
        .tables()
        .layer(canvas_id, layer_id)
        .map(|l| l.name.clone())
        .unwrap_or_default();
    let dir = dest.join(canvas_dir_name(canvas_id));
    let out = dir.join(layer_file_name(layer_id, &name));

    let written = encode_png(&buffer).and_then(|png| {
        std::fs::create_dir_all(&dir)?;
        std::fs::write(&out, png)?;
        Ok(())
    });
    match written {
        Ok(()) => {
            tracing::info!("wrote layer {}", out.display());
            LayerOutcome::Written(out)
        }
        Err(e) => failed(&e),
    }
}

/// Summary of a batch export
#[derive(Debug, Clone)]
pub struct BatchExportResult {
    /// Number of containers exported without layer failures
    pub success_count: usize,
    /// Number of containers that failed to open or had failed layers
    pub fail_count: usize,
    /// Messages for each file processed
    pub results: Vec<String>,
}

/// Find all .clip files in a directory recursively
///
/// # Returns
/// A sorted list of paths to .clip files found in the directory tree.
pub fn find_clip_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("clip"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

/// Batch export containers in parallel
///
/// Each container is exported into a subdirectory of `dest_base` named after
/// the file (without extension), preserving its path relative to `source_base`.
pub fn batch_export<F>(
    files: &[PathBuf],
    source_base: &Path,
    dest_base: &Path,
    options: &ExportOptions,
    progress: F,
) -> BatchExportResult
where
    F: Fn(&ExportProgress) + Send + Sync,
{
    let success_counter = AtomicUsize::new(0);
    let fail_counter = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let total = files.len();
    let quiet = |_: &ExportProgress| {};

    let results: Vec<String> = files
        .par_iter()
        .map(|file| {
            let relative = file.strip_prefix(source_base).unwrap_or(file.as_path());
            let display_path = relative.to_string_lossy().to_string();

            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(&ExportProgress {
                current,
                total,
                item: display_path.clone(),
            });

            let stem = file.file_stem().unwrap_or_default().to_string_lossy().to_string();
            let file_dest = dest_base
                .join(relative.parent().unwrap_or(Path::new("")))
                .join(stem);

            match export_file(file, &file_dest, options, &quiet) {
                Ok(result) if result.fail_count() == 0 => {
                    success_counter.fetch_add(1, Ordering::SeqCst);
                    format!("Exported: {display_path} ({} files)", result.success_count())
                }
                Ok(result) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    format!(
                        "Partial {display_path}: {} files, {} layers failed",
                        result.success_count(),
                        result.fail_count()
                    )
                }
                Err(e) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    format!("Failed {display_path}: {e}")
                }
            }
        })
        .collect();

    BatchExportResult {
        success_count: success_counter.load(Ordering::SeqCst),
        fail_count: fail_counter.load(Ordering::SeqCst),
        results,
    }
}
