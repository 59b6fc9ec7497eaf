//! Error types for the album sync
//!
//! Every error is surfaced to the caller as soon as it happens. Only the
//! opt-in keep-going mode of the sync engine downgrades asset-level errors
//! (see [`SyncError::is_asset_level`]) to recorded failures.

use crate::convert::ConversionError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the album sync
#[derive(Error, Debug)]
pub enum SyncError {
    /// The library has no `database/Photos.sqlite`
    #[error("No Photos database found at '{}'. Is this a Photos library?", .0.display())]
    LibraryNotFound(PathBuf),

    /// SQLite refused to open the library database
    #[error("Failed to open library database '{}': {}", .path.display(), .source)]
    OpenLibrary {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// No table or column matched the expected naming pattern
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// A library query or row scan failed
    #[error("Library query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// No usable asset row for the given primary key
    #[error("Asset {0} not found in the library")]
    AssetNotFound(i64),

    /// Filesystem open/create/copy/flush/rename failure
    #[error("IO error on '{}': {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The image codec could not decode or re-encode an asset
    #[error("Failed to convert '{}': {}", .path.display(), .source)]
    Conversion {
        path: PathBuf,
        source: ConversionError,
    },

    /// The run-tracking file could not be read, parsed or written
    #[error("Tracking state error: {0}")]
    Tracking(String),

    /// The worker pool for parallel writes could not be built
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),

    /// A shutdown was requested between two assets
    #[error("Sync interrupted by shutdown request")]
    Interrupted,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Wrap an IO error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors that concern a single asset rather than the library or the run.
    pub fn is_asset_level(&self) -> bool {
        matches!(
            self,
            SyncError::AssetNotFound(_) | SyncError::Io { .. } | SyncError::Conversion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_level_errors() {
        assert!(SyncError::AssetNotFound(3).is_asset_level());
        assert!(SyncError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone")
        )
        .is_asset_level());
        assert!(!SyncError::SchemaNotFound("no junction table".into()).is_asset_level());
        assert!(!SyncError::Interrupted.is_asset_level());
    }

    #[test]
    fn test_error_messages_name_the_subject() {
        let err = SyncError::AssetNotFound(42);
        assert_eq!(err.to_string(), "Asset 42 not found in the library");

        let err = SyncError::io(
            "/out/Vacation/IMG_0001.jpeg",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/out/Vacation/IMG_0001.jpeg"));
    }
}
