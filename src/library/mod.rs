//! Photos library access
//!
//! A Photos library is a directory holding a Core Data SQLite store at
//! `database/Photos.sqlite` and the original media under `originals/`. The
//! store's table and column names embed a numeric tag that drifts between
//! library versions, so nothing here hardcodes them beyond what is stable.
//!
//! # Submodules
//!
//! - `schema` - Runtime discovery of the album/asset junction naming
//! - `catalog` - Album enumeration and membership queries
//! - `locator` - Asset path resolution
//!
//! The connection is always opened read-only and passed explicitly to every
//! query function; nothing in this module holds on to it.

pub mod catalog;
pub mod locator;
pub mod schema;

pub use catalog::{list_albums, list_asset_ids, AlbumFilter, AlbumMetadata};
pub use locator::{locate, AssetLocation};
pub use schema::SchemaInfo;

use crate::core::error::{Result, SyncError};
use log::debug;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Location of the SQLite store inside a library
pub fn database_path(library: &Path) -> PathBuf {
    library.join("database").join("Photos.sqlite")
}

/// Root of the original media inside a library
pub fn originals_path(library: &Path) -> PathBuf {
    library.join("originals")
}

/// Open the library store read-only.
///
/// The library is never written to, so no transaction discipline applies and
/// a running Photos app is not disturbed.
pub fn open_library(library: &Path) -> Result<Connection> {
    let path = database_path(library);
    if !path.is_file() {
        return Err(SyncError::LibraryNotFound(path));
    }

    debug!("Opening library database read-only: {}", path.display());

    Connection::open_with_flags(
        &path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| SyncError::OpenLibrary { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::LibraryFixture;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_library() {
        let temp_dir = TempDir::new().unwrap();
        let err = open_library(temp_dir.path()).unwrap_err();
        assert!(matches!(err, SyncError::LibraryNotFound(_)));
    }

    #[test]
    fn test_open_is_read_only() {
        let temp_dir = TempDir::new().unwrap();
        LibraryFixture::create(temp_dir.path(), 5).unwrap();

        let conn = open_library(temp_dir.path()).unwrap();
        let result = conn.execute("CREATE TABLE intruder (id INTEGER)", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_paths() {
        let library = Path::new("/Pictures/Photos Library.photoslibrary");
        assert_eq!(
            database_path(library),
            library.join("database").join("Photos.sqlite")
        );
        assert_eq!(originals_path(library), library.join("originals"));
    }
}
