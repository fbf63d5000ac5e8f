//! `SQLite`-backed metadata engine
//!
//! The embedded database is written to a scratch file and opened read-only.
//! Dropping the source removes the scratch file; [`RowSource::close`] does the
//! same but reports a failed removal.

use std::io::Write;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tempfile::NamedTempFile;

use super::engine::{MetadataEngine, RowSource};
use super::value::{Row, Value};
use crate::error::{Error, Result};

/// Default metadata engine using bundled `SQLite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteEngine;

impl MetadataEngine for SqliteEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn RowSource>> {
        let mut scratch = NamedTempFile::new()?;
        scratch.write_all(bytes)?;
        scratch.flush()?;

        let conn = Connection::open_with_flags(
            scratch.path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::debug!(
            "opened metadata database ({} bytes) at {}",
            bytes.len(),
            scratch.path().display()
        );

        Ok(Box::new(SqliteSource { conn, scratch }))
    }
}

struct SqliteSource {
    // Declared before `scratch` so the connection is dropped first.
    conn: Connection,
    scratch: NamedTempFile,
}

impl SqliteSource {
    fn query(&self, sql: &str, width: usize) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(match row.get_ref(i)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(v) => Value::Integer(v),
                    ValueRef::Real(v) => Value::Real(v),
                    ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => Value::Blob(b.to_vec()),
                });
            }
            Ok(Row::new(values))
        })?;
        rows.collect()
    }
}

impl RowSource for SqliteSource {
    fn select(&self, table: &'static str, columns: &[&'static str]) -> Result<Vec<Row>> {
        let column_list = columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {column_list} FROM \"{table}\"");

        self.query(&sql, columns.len())
            .map_err(|e| Error::MetadataQuery {
                table,
                message: e.to_string(),
            })
    }

    fn close(self: Box<Self>) -> Result<()> {
        let SqliteSource { conn, scratch } = *self;
        conn.close().map_err(|(_, e)| Error::Sqlite(e))?;
        scratch.close()?;
        Ok(())
    }
}
