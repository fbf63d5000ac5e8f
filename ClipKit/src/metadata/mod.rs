//! Embedded metadata database
//!
//! The `CHNKSQLi` chunk carries a complete `SQLite` database describing canvases,
//! layers, and the links from each layer to its pixel data. This module runs the
//! fixed queries against it and maps rows into [`EntityTables`].
//!
//! Rows missing a required field are skipped and reported to the diagnostic sink;
//! a query that fails outright (for example a missing table) aborts the load.

mod engine;
mod sqlite;
mod tables;
mod types;
mod value;

pub use engine::{MetadataEngine, RowSource};
pub use sqlite::SqliteEngine;
pub use tables::{EntityTables, Table};
pub use types::{CanvasPreview, Entity, Layer, LayerThumbnail, Mipmap, MipmapInfo, Offscreen};
pub use value::{Row, Value};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::Result;

const PREVIEW_COLUMNS: &[&str] = &["MainId", "CanvasId", "ImageData", "ImageWidth", "ImageHeight"];
const LAYER_COLUMNS: &[&str] = &[
    "MainId",
    "CanvasId",
    "LayerName",
    "LayerUuid",
    "LayerRenderMipmap",
    "LayerRenderThumbnail",
];
const THUMBNAIL_COLUMNS: &[&str] = &[
    "MainId",
    "CanvasId",
    "LayerId",
    "ThumbnailCanvasWidth",
    "ThumbnailCanvasHeight",
    "ThumbnailOffscreen",
];
const OFFSCREEN_COLUMNS: &[&str] = &["MainId", "CanvasId", "LayerId", "BlockData"];
const MIPMAP_COLUMNS: &[&str] = &["MainId", "CanvasId", "LayerId", "MipmapCount", "BaseMipmapInfo"];
const MIPMAP_INFO_COLUMNS: &[&str] = &[
    "MainId",
    "CanvasId",
    "LayerId",
    "ThisScale",
    "Offscreen",
    "NextIndex",
];

/// Open a metadata database image, load every table, and release the scratch copy.
///
/// A failed cleanup is reported as [`Diagnostic::ScratchCleanupFailed`].
pub fn read_metadata(
    engine: &dyn MetadataEngine,
    bytes: &[u8],
    sink: &dyn DiagnosticSink,
) -> Result<EntityTables> {
    let source = engine.open(bytes)?;
    let tables = load_tables(source.as_ref(), sink)?;

    if let Err(e) = source.close() {
        sink.report(Diagnostic::ScratchCleanupFailed {
            message: e.to_string(),
        });
    }

    tracing::info!(
        "loaded metadata: {} layers, {} offscreens, {} previews",
        tables.layers().len(),
        tables.offscreens().len(),
        tables.previews().len()
    );
    Ok(tables)
}

/// Run the fixed queries and map every row.
pub fn load_tables(source: &dyn RowSource, sink: &dyn DiagnosticSink) -> Result<EntityTables> {
    let previews = load(source, "CanvasPreview", PREVIEW_COLUMNS, map_preview, sink)?;
    let layers = load(source, "Layer", LAYER_COLUMNS, map_layer, sink)?;
    let thumbnails = load(source, "LayerThumbnail", THUMBNAIL_COLUMNS, map_thumbnail, sink)?;
    let offscreens = load(source, "Offscreen", OFFSCREEN_COLUMNS, map_offscreen, sink)?;
    let mipmaps = load(source, "Mipmap", MIPMAP_COLUMNS, map_mipmap, sink)?;
    let mipmap_infos = load(source, "MipmapInfo", MIPMAP_INFO_COLUMNS, map_mipmap_info, sink)?;

    Ok(EntityTables::new(
        previews,
        layers,
        thumbnails,
        offscreens,
        mipmaps,
        mipmap_infos,
    ))
}

type RowResult<T> = std::result::Result<T, String>;

fn load<T: Entity>(
    source: &dyn RowSource,
    table: &'static str,
    columns: &[&'static str],
    map: fn(&Row) -> RowResult<T>,
    sink: &dyn DiagnosticSink,
) -> Result<Table<T>> {
    let rows = source.select(table, columns)?;
    let mut out = Table::new();

    for row in &rows {
        match map(row) {
            Ok(record) => out.insert_reporting(record, sink),
            Err(reason) => sink.report(Diagnostic::SkippedRow { table, reason }),
        }
    }

    tracing::debug!("{table}: {} of {} rows loaded", out.len(), rows.len());
    Ok(out)
}

fn required(row: &Row, index: usize, column: &str) -> RowResult<i64> {
    row.integer(index).ok_or_else(|| missing(row, index, column))
}

fn dimension(row: &Row, index: usize, column: &str) -> RowResult<u32> {
    let value = required(row, index, column)?;
    u32::try_from(value).map_err(|_| format!("{column} out of range: {value}"))
}

fn missing(row: &Row, index: usize, column: &str) -> String {
    match row.get(index) {
        Some(value) => format!("{column} is {}", value.kind()),
        None => format!("{column} absent"),
    }
}

fn map_preview(row: &Row) -> RowResult<CanvasPreview> {
    Ok(CanvasPreview {
        id: required(row, 0, "MainId")?,
        canvas_id: required(row, 1, "CanvasId")?,
        image_data: row
            .blob(2)
            .ok_or_else(|| missing(row, 2, "ImageData"))?
            .to_vec(),
        width: dimension(row, 3, "ImageWidth")?,
        height: dimension(row, 4, "ImageHeight")?,
    })
}

fn map_layer(row: &Row) -> RowResult<Layer> {
    Ok(Layer {
        id: required(row, 0, "MainId")?,
        canvas_id: required(row, 1, "CanvasId")?,
        name: row.text(2).unwrap_or_default(),
        uuid: row.text(3).filter(|s| !s.is_empty()),
        mipmap_id: row.integer(4),
        thumbnail_id: row.integer(5),
    })
}

fn map_thumbnail(row: &Row) -> RowResult<LayerThumbnail> {
    Ok(LayerThumbnail {
        id: required(row, 0, "MainId")?,
        canvas_id: required(row, 1, "CanvasId")?,
        layer_id: required(row, 2, "LayerId")?,
        width: dimension(row, 3, "ThumbnailCanvasWidth")?,
        height: dimension(row, 4, "ThumbnailCanvasHeight")?,
        offscreen_id: row.integer(5),
    })
}

fn map_offscreen(row: &Row) -> RowResult<Offscreen> {
    Ok(Offscreen {
        id: required(row, 0, "MainId")?,
        canvas_id: required(row, 1, "CanvasId")?,
        layer_id: required(row, 2, "LayerId")?,
        external_id: row.text(3).filter(|s| !s.is_empty()),
    })
}

fn map_mipmap(row: &Row) -> RowResult<Mipmap> {
    Ok(Mipmap {
        id: required(row, 0, "MainId")?,
        canvas_id: required(row, 1, "CanvasId")?,
        layer_id: required(row, 2, "LayerId")?,
        count: row.integer(3).unwrap_or(0),
        base_info_id: required(row, 4, "BaseMipmapInfo")?,
    })
}

fn map_mipmap_info(row: &Row) -> RowResult<MipmapInfo> {
    Ok(MipmapInfo {
        id: required(row, 0, "MainId")?,
        canvas_id: required(row, 1, "CanvasId")?,
        layer_id: required(row, 2, "LayerId")?,
        scale: row.real(3).unwrap_or(1.0),
        offscreen_id: required(row, 4, "Offscreen")?,
        next_id: row.integer(5).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// In-memory row source keyed by table name.
    #[derive(Default)]
    struct FakeSource {
        tables: HashMap<&'static str, Vec<Row>>,
    }

    impl FakeSource {
        fn with(mut self, table: &'static str, rows: Vec<Vec<Value>>) -> Self {
            self.tables
                .insert(table, rows.into_iter().map(Row::new).collect());
            self
        }
    }

    impl RowSource for FakeSource {
        fn select(&self, table: &'static str, _columns: &[&'static str]) -> Result<Vec<Row>> {
            self.tables
                .get(table)
                .cloned()
                .ok_or_else(|| Error::MetadataQuery {
                    table,
                    message: "no such table".to_string(),
                })
        }

        fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn all_tables() -> FakeSource {
        FakeSource::default()
            .with("CanvasPreview", vec![])
            .with("Layer", vec![])
            .with("LayerThumbnail", vec![])
            .with("Offscreen", vec![])
            .with("Mipmap", vec![])
            .with("MipmapInfo", vec![])
    }

    #[test]
    fn test_null_required_field_skips_row() {
        use Value::{Integer, Null, Text};

        let source = all_tables().with(
            "Layer",
            vec![
                vec![Integer(1), Integer(1), Text("Paper".into()), Null, Integer(4), Integer(5)],
                vec![Null, Integer(1), Text("Broken".into()), Null, Null, Null],
                vec![Integer(2), Integer(1), Null, Null, Null, Null],
            ],
        );
        let sink = CollectingSink::new();
        let tables = load_tables(&source, &sink).unwrap();

        assert_eq!(tables.layers().len(), 2);
        let paper = tables.layers().get(1).unwrap();
        assert_eq!(paper.name, "Paper");
        assert_eq!(paper.mipmap_id, Some(4));
        assert_eq!(tables.layers().get(2).unwrap().name, "");
        assert_eq!(
            sink.entries(),
            vec![Diagnostic::SkippedRow {
                table: "Layer",
                reason: "MainId is null".to_string(),
            }]
        );
    }

    #[test]
    fn test_negative_dimension_skips_row() {
        use Value::Integer;

        let source = all_tables().with(
            "LayerThumbnail",
            vec![vec![Integer(1), Integer(1), Integer(2), Integer(-1), Integer(64), Integer(3)]],
        );
        let sink = CollectingSink::new();
        let tables = load_tables(&source, &sink).unwrap();

        assert!(tables.thumbnails().is_empty());
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_offscreen_block_data_as_blob() {
        use Value::{Blob, Integer};

        let source = all_tables().with(
            "Offscreen",
            vec![
                vec![Integer(1), Integer(1), Integer(2), Blob(b"extrnlid42".to_vec())],
                vec![Integer(2), Integer(1), Integer(3), Blob(Vec::new())],
            ],
        );
        let tables = load_tables(&source, &CollectingSink::new()).unwrap();

        assert_eq!(
            tables.offscreens().get(1).unwrap().external_id.as_deref(),
            Some("extrnlid42")
        );
        assert_eq!(tables.offscreens().get(2).unwrap().external_id, None);
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let source = FakeSource::default().with("CanvasPreview", vec![]);
        let err = load_tables(&source, &CollectingSink::new()).unwrap_err();
        assert!(matches!(err, Error::MetadataQuery { table: "Layer", .. }));
        assert!(err.is_format_error());
    }
}
