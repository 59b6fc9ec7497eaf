//! Album enumeration and membership

use super::schema::SchemaInfo;
use crate::core::error::Result;
use log::{debug, trace};
use rusqlite::Connection;
use serde::Serialize;

/// Title prefix the Photos app uses for its internal albums
pub const RESERVED_ALBUM_PREFIX: &str = "progress-";

/// Table holding albums, folders and other collections
const ALBUM_TABLE: &str = "ZGENERICALBUM";

/// A user album and its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumMetadata {
    /// `Z_PK` of the album row
    pub id: i64,
    /// Album title, never empty and never reserved
    pub name: String,
    /// Member asset primary keys in store order
    pub asset_ids: Vec<i64>,
}

/// Album selection by exact title, applied after the reserved-title filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumFilter {
    /// Only these albums (empty = all)
    pub include: Vec<String>,
    /// Never these albums
    pub exclude: Vec<String>,
}

impl AlbumFilter {
    pub fn allows(&self, name: &str) -> bool {
        if self.exclude.iter().any(|n| n == name) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|n| n == name)
    }
}

/// Whether an album title belongs to a user album worth exporting.
pub fn is_exportable_title(title: Option<&str>) -> bool {
    match title {
        Some(title) => !title.is_empty() && !title.starts_with(RESERVED_ALBUM_PREFIX),
        None => false,
    }
}

/// List user albums of the resolved schema generation with their members.
pub fn list_albums(
    conn: &Connection,
    schema: &SchemaInfo,
    filter: &AlbumFilter,
) -> Result<Vec<AlbumMetadata>> {
    let rows: Vec<(i64, Option<String>)> = {
        let mut stmt = conn.prepare(&format!(
            "SELECT Z_PK, ZTITLE FROM {} WHERE Z_ENT = ?1",
            ALBUM_TABLE
        ))?;
        let rows = stmt
            .query_map([schema.entity_value], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let mut albums = Vec::with_capacity(rows.len());
    for (id, title) in rows {
        if !is_exportable_title(title.as_deref()) {
            trace!("Ignoring internal or untitled album {} ({:?})", id, title);
            continue;
        }
        let Some(name) = title else { continue };

        if !filter.allows(&name) {
            debug!("Album '{}' excluded by filter", name);
            continue;
        }

        let asset_ids = list_asset_ids(conn, schema, id)?;
        albums.push(AlbumMetadata {
            id,
            name,
            asset_ids,
        });
    }

    debug!("Found {} exportable albums", albums.len());
    Ok(albums)
}

/// Member asset ids of one album, in the order the store returns them.
pub fn list_asset_ids(conn: &Connection, schema: &SchemaInfo, album_id: i64) -> Result<Vec<i64>> {
    // Identifiers come from SchemaInfo, which only holds pattern-checked names
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        schema.asset_column, schema.junction_table, schema.album_column
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map([album_id], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}
