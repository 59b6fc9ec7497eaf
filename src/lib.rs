//! Photos Album Sync Library
//!
//! Mirrors the user albums of an Apple Photos library into a plain directory
//! tree, one subdirectory per album, re-encoding HEIC/HEIF originals to JPEG
//! on the way.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`library`] - Read-only access to the library store: schema discovery,
//!   album enumeration and asset location
//! - [`convert`] - The image converter seam and its JPEG implementation
//! - [`core`] - Configuration, error handling, the sync engine and run
//!   tracking
//! - [`cli`] - Command-line interface (only used by the binary)
//! - [`testdb`] - Synthetic Photos libraries for tests
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use photos_album_sync::convert::JpegConverter;
//! use photos_album_sync::core::config::Config;
//! use photos_album_sync::core::sync::{sync_library, NoProgress};
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     // Set up shutdown flag for graceful termination
//!     let shutdown_flag = Arc::new(AtomicBool::new(false));
//!
//!     let report = sync_library(
//!         Path::new("/Users/me/Pictures/Photos Library.photoslibrary"),
//!         Path::new("/Volumes/Backup/Albums"),
//!         &config.to_sync_options(),
//!         &JpegConverter::new(config.convert.jpeg_quality),
//!         &NoProgress,
//!         shutdown_flag,
//!     )?;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Read-only** - The library database is opened read-only and never locked
//!   for writing
//! - **Incremental** - Files already present in the output are skipped
//! - **Crash-safe writes** - Exports land under a temporary name and are
//!   renamed into place once flushed
//! - **Schema drift tolerant** - Junction table and column names are
//!   discovered at runtime
//!
//! # Cargo Features
//!
//! - `heif` (default) - Decode real HEIF/HEIC data through libheif. Building
//!   with `--no-default-features` drops it; HEIF payloads then fail with a
//!   codec-unavailable conversion error.

pub mod cli;
pub mod convert;
pub mod core;
pub mod library;
pub mod testdb;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
