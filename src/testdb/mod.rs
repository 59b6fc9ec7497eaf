//! Test Database Module
//!
//! Builds synthetic Photos libraries on disk so the schema discovery, the
//! catalog queries and the sync engine can be exercised without a real
//! `.photoslibrary`.
//!
//! # Features
//!
//! - **Library fixtures**: a `database/Photos.sqlite` laid out like the
//!   Core Data store, with a configurable schema-generation tag and asset
//!   table name, plus an `originals/` tree
//! - **Image generators**: small PNG/JPEG payloads produced with the `image`
//!   crate, decodable by the converter
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use photos_album_sync::testdb::{images, LibraryFixture};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let fixture = LibraryFixture::create(Path::new("/tmp/Test.photoslibrary"), 28)?;
//! let album = fixture.add_album(Some("Vacation"))?;
//! let asset = fixture.add_asset("0", "IMG_0001.heic", &images::png_bytes(64, 48)?)?;
//! fixture.add_to_album(album, asset)?;
//! # Ok(())
//! # }
//! ```

pub mod fixture;
pub mod images;

pub use fixture::{LibraryFixture, LibraryFixtureBuilder};
