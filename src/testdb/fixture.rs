//! Synthetic Photos library on disk
//!
//! Only the tables and columns the sync reads are created, plus a couple of
//! look-alike tables so pattern matching has something to reject. The
//! junction table has no primary key, so rows come back in insertion order
//! and tests can rely on it.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

/// Asset entity tag used in the asset column name (`Z_3ASSETS`)
const DEFAULT_ASSET_ENTITY: i64 = 3;

/// Builder for a [`LibraryFixture`]
#[derive(Debug, Clone)]
pub struct LibraryFixtureBuilder {
    root: PathBuf,
    entity_value: i64,
    asset_entity: i64,
    asset_table: String,
}

impl LibraryFixtureBuilder {
    /// Album entity tag, i.e. the `<n>` of `Z_<n>ASSETS`
    pub fn entity_value(mut self, value: i64) -> Self {
        self.entity_value = value;
        self
    }

    /// Asset entity tag used for the asset column
    pub fn asset_entity(mut self, value: i64) -> Self {
        self.asset_entity = value;
        self
    }

    /// `ZASSET` for current libraries, `ZGENERICASSET` for older ones
    pub fn asset_table(mut self, name: &str) -> Self {
        self.asset_table = name.to_string();
        self
    }

    /// Create the directory layout and the database.
    pub fn create(self) -> Result<LibraryFixture> {
        let database_dir = self.root.join("database");
        fs::create_dir_all(&database_dir)
            .with_context(|| format!("Failed to create {}", database_dir.display()))?;
        fs::create_dir_all(self.root.join("originals"))?;

        let conn = Connection::open(database_dir.join("Photos.sqlite"))?;
        let n = self.entity_value;
        let m = self.asset_entity;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE ZGENERICALBUM (
                Z_PK INTEGER PRIMARY KEY,
                Z_ENT INTEGER,
                ZTITLE VARCHAR
            );
            CREATE TABLE {asset_table} (
                Z_PK INTEGER PRIMARY KEY,
                Z_ENT INTEGER,
                ZDIRECTORY VARCHAR,
                ZFILENAME VARCHAR
            );
            CREATE TABLE Z_{n}ASSETS (
                Z_{n}ALBUMS INTEGER,
                Z_{m}ASSETS INTEGER,
                Z_FOK_{m}ASSETS INTEGER
            );
            CREATE TABLE Z_1KEYWORDS (
                Z_1ASSETATTRIBUTES INTEGER,
                Z_40KEYWORDS INTEGER
            );
            CREATE TABLE Z_METADATA (
                Z_VERSION INTEGER PRIMARY KEY,
                Z_UUID VARCHAR
            );
            "#,
            asset_table = self.asset_table,
        ))?;

        Ok(LibraryFixture {
            root: self.root,
            conn,
            entity_value: n,
            asset_entity: m,
            asset_table: self.asset_table,
        })
    }
}

/// A Photos library under construction
pub struct LibraryFixture {
    root: PathBuf,
    conn: Connection,
    entity_value: i64,
    asset_entity: i64,
    asset_table: String,
}

impl LibraryFixture {
    pub fn builder(root: &Path) -> LibraryFixtureBuilder {
        LibraryFixtureBuilder {
            root: root.to_path_buf(),
            entity_value: 28,
            asset_entity: DEFAULT_ASSET_ENTITY,
            asset_table: "ZASSET".to_string(),
        }
    }

    /// Library with the given album entity tag and default everything else.
    pub fn create(root: &Path, entity_value: i64) -> Result<Self> {
        Self::builder(root).entity_value(entity_value).create()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity_value(&self) -> i64 {
        self.entity_value
    }

    /// Add a user album (entity tag of this schema generation).
    pub fn add_album(&self, title: Option<&str>) -> Result<i64> {
        self.add_collection(self.entity_value, title)
    }

    /// Add a row of another collection entity (folders, smart albums...).
    pub fn add_collection(&self, entity: i64, title: Option<&str>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO ZGENERICALBUM (Z_ENT, ZTITLE) VALUES (?1, ?2)",
            params![entity, title],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Add an asset row and write its original file.
    pub fn add_asset(&self, directory: &str, filename: &str, contents: &[u8]) -> Result<i64> {
        let id = self.add_asset_row(directory, filename)?;
        let dir = self.root.join("originals").join(directory);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(filename), contents)
            .with_context(|| format!("Failed to write original {}", filename))?;
        Ok(id)
    }

    /// Add an asset row whose original file is missing on disk.
    pub fn add_asset_row(&self, directory: &str, filename: &str) -> Result<i64> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (Z_ENT, ZDIRECTORY, ZFILENAME) VALUES (?1, ?2, ?3)",
                self.asset_table
            ),
            params![self.asset_entity, directory, filename],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Add an asset with no local original (directory and filename NULL).
    pub fn add_cloud_only_asset(&self) -> Result<i64> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (Z_ENT, ZDIRECTORY, ZFILENAME) VALUES (?1, NULL, NULL)",
                self.asset_table
            ),
            params![self.asset_entity],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Link an asset id (existing or not) to an album.
    pub fn add_to_album(&self, album_id: i64, asset_id: i64) -> Result<()> {
        let n = self.entity_value;
        let m = self.asset_entity;
        self.conn.execute(
            &format!(
                "INSERT INTO Z_{n}ASSETS (Z_{n}ALBUMS, Z_{m}ASSETS, Z_FOK_{m}ASSETS) VALUES (?1, ?2, ?3)"
            ),
            params![album_id, asset_id, asset_id * 1024],
        )?;
        Ok(())
    }
}
