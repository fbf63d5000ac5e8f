//! Relational query capability used by the metadata reader

use super::value::Row;
use crate::error::Result;

/// Opens an embedded metadata database from its raw bytes.
pub trait MetadataEngine: Send + Sync {
    /// Open a database image for querying.
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn RowSource>>;
}

/// An opened metadata database.
pub trait RowSource {
    /// Select the given columns from every row of `table`.
    ///
    /// Values in each returned [`Row`] follow the order of `columns`.
    fn select(&self, table: &'static str, columns: &[&'static str]) -> Result<Vec<Row>>;

    /// Release the database and any scratch artifacts backing it.
    fn close(self: Box<Self>) -> Result<()>;
}
