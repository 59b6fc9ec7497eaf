//! Asset path resolution

use super::schema::SchemaInfo;
use crate::core::error::{Result, SyncError};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Where an asset's original lives, relative to `originals/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLocation {
    /// Directory fragment (`ZDIRECTORY`), usually a single hex digit
    pub directory: String,
    /// Base name including extension (`ZFILENAME`)
    pub filename: String,
}

impl AssetLocation {
    /// Full path of the original inside `library`.
    pub fn source_path(&self, library: &Path) -> PathBuf {
        super::originals_path(library)
            .join(&self.directory)
            .join(&self.filename)
    }
}

/// Look up an asset's location by primary key.
///
/// A missing row, or a row without directory or filename (assets that only
/// exist in iCloud), is reported as [`SyncError::AssetNotFound`].
pub fn locate(conn: &Connection, schema: &SchemaInfo, asset_id: i64) -> Result<AssetLocation> {
    let sql = format!(
        "SELECT ZDIRECTORY, ZFILENAME FROM {} WHERE Z_PK = ?1",
        schema.asset_table
    );

    let row: Option<(Option<String>, Option<String>)> = conn
        .query_row(&sql, [asset_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;

    match row {
        Some((Some(directory), Some(filename))) if !filename.is_empty() => Ok(AssetLocation {
            directory,
            filename,
        }),
        _ => Err(SyncError::AssetNotFound(asset_id)),
    }
}
