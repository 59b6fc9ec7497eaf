//! Runtime discovery of the album/asset relationship schema
//!
//! Core Data names the many-to-many table between albums and assets
//! `Z_<n>ASSETS`, where `<n>` is the album entity number of the current
//! schema generation. The same table has an album column `Z_<n>ALBUMS` and
//! an asset column `Z_<m>ASSETS` whose tag is the asset entity number. Both
//! tags change between library versions, so they are matched by pattern
//! once per run and frozen into a [`SchemaInfo`].

use crate::core::error::{Result, SyncError};
use log::{debug, warn};
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::LazyLock;

/// Junction table name; the digit run is the entity value
static JUNCTION_TABLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Z_(\d+)ASSETS$").expect("valid junction table pattern"));

/// Asset-id column inside the junction table
static ASSET_COLUMN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Z_\d+ASSETS$").expect("valid asset column pattern"));

/// Asset table names, newest library layout first
const ASSET_TABLE_CANDIDATES: &[&str] = &["ZASSET", "ZGENERICASSET"];

/// Naming of the album/asset relationship for one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaInfo {
    /// Schema-generation tag shared by the junction table and album entity
    pub entity_value: i64,
    /// `Z_<n>ASSETS`
    pub junction_table: String,
    /// `Z_<n>ALBUMS`
    pub album_column: String,
    /// Discovered asset-id column of the junction table
    pub asset_column: String,
    /// Table holding one row per asset
    pub asset_table: String,
}

impl SchemaInfo {
    /// Discover the full schema naming. Fails if any piece is missing.
    pub fn resolve(conn: &Connection) -> Result<Self> {
        let entity_value = resolve_entity_value(conn)?;
        let album_column = resolve_album_column(conn, entity_value)?;
        let asset_column = resolve_asset_column(conn, entity_value)?;
        let asset_table = resolve_asset_table(conn)?;

        let info = Self {
            entity_value,
            junction_table: junction_table_name(entity_value),
            album_column,
            asset_column,
            asset_table,
        };
        debug!("Resolved library schema: {:?}", info);
        Ok(info)
    }
}

/// `Z_<n>ASSETS` for a given entity value
pub fn junction_table_name(entity_value: i64) -> String {
    format!("Z_{}ASSETS", entity_value)
}

/// All table names in store order.
pub fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Column names of `table`, empty if the table does not exist.
pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Find the entity value from the store's table catalog.
pub fn resolve_entity_value(conn: &Connection) -> Result<i64> {
    entity_value_from_tables(&table_names(conn)?)
}

/// Pick the entity value out of a list of table names.
///
/// When several junction tables match, the first in the given order wins.
/// SQLite does not promise any particular catalog order, so the choice is
/// logged together with the other candidates.
pub fn entity_value_from_tables<S: AsRef<str>>(tables: &[S]) -> Result<i64> {
    let candidates: Vec<(i64, &str)> = tables
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            let captures = JUNCTION_TABLE_PATTERN.captures(name)?;
            captures[1].parse::<i64>().ok().map(|value| (value, name))
        })
        .collect();

    let (value, table) = *candidates.first().ok_or_else(|| {
        SyncError::SchemaNotFound(
            "no album/asset junction table (Z_<n>ASSETS) in the library".to_string(),
        )
    })?;

    if candidates.len() > 1 {
        let names: Vec<&str> = candidates.iter().map(|(_, name)| *name).collect();
        warn!(
            "Several junction tables found ({}); using the first one, {}",
            names.join(", "),
            table
        );
    }

    Ok(value)
}

/// Find the single asset-id column of the junction table.
pub fn resolve_asset_column(conn: &Connection, entity_value: i64) -> Result<String> {
    let table = junction_table_name(entity_value);
    asset_column_from_columns(&table, &column_names(conn, &table)?)
}

/// Pick the asset-id column out of the junction table's columns.
pub fn asset_column_from_columns<S: AsRef<str>>(table: &str, columns: &[S]) -> Result<String> {
    let mut matches = columns
        .iter()
        .map(|column| column.as_ref())
        .filter(|name| ASSET_COLUMN_PATTERN.is_match(name));

    match (matches.next(), matches.next()) {
        (Some(column), None) => Ok(column.to_string()),
        (None, _) => Err(SyncError::SchemaNotFound(format!(
            "no asset column (Z_<n>ASSETS) in table {}",
            table
        ))),
        (Some(first), Some(second)) => Err(SyncError::SchemaNotFound(format!(
            "ambiguous asset column in table {}: {} and {} both match",
            table, first, second
        ))),
    }
}

/// Check that the junction table carries `Z_<n>ALBUMS`.
pub fn resolve_album_column(conn: &Connection, entity_value: i64) -> Result<String> {
    let table = junction_table_name(entity_value);
    let expected = format!("Z_{}ALBUMS", entity_value);

    if column_names(conn, &table)?.iter().any(|c| *c == expected) {
        Ok(expected)
    } else {
        Err(SyncError::SchemaNotFound(format!(
            "no album column {} in table {}",
            expected, table
        )))
    }
}

/// Find the table holding asset rows for this library version.
pub fn resolve_asset_table(conn: &Connection) -> Result<String> {
    let tables = table_names(conn)?;
    ASSET_TABLE_CANDIDATES
        .iter()
        .find(|candidate| tables.iter().any(|t| t.as_str() == **candidate))
        .map(|t| t.to_string())
        .ok_or_else(|| {
            SyncError::SchemaNotFound(format!(
                "no asset table (tried {})",
                ASSET_TABLE_CANDIDATES.join(", ")
            ))
        })
}
