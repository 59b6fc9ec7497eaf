//! Album synchronisation
//!
//! Mirrors every exportable album of a library into `<output>/<album>/`, one
//! file per member asset. Proprietary images are re-encoded to JPEG on the
//! way; everything else is streamed byte for byte.
//!
//! A destination file that already exists is never touched again, which
//! makes repeated runs incremental. Writes go through a hidden `.part`
//! sibling that is fsynced and renamed into place, so an existing
//! destination is always a complete export.

use crate::convert::{self, ImageConverter};
use crate::core::error::{Result, SyncError};
use crate::core::tracking::StateTracker;
use crate::core::config::TrackingConfig;
use crate::library::{self, AlbumFilter, AlbumMetadata, AssetLocation, SchemaInfo};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options for a sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Record per-asset failures and keep going instead of aborting
    pub continue_on_error: bool,
    /// Write workers per album (1 = sequential, 0 = one per CPU)
    pub workers: usize,
    /// Which albums to sync
    pub album_filter: AlbumFilter,
    /// Run-tracking settings, if any
    pub tracking: Option<TrackingConfig>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            workers: 1,
            album_filter: AlbumFilter::default(),
            tracking: None,
        }
    }
}

impl SyncOptions {
    fn is_parallel(&self) -> bool {
        self.workers != 1
    }
}

/// Terminal state of a single asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// Destination already present
    Skipped,
    /// Streamed unchanged
    Copied,
    /// Re-encoded to JPEG
    Converted,
    /// Recorded failure (keep-going mode only)
    Failed,
}

/// A per-asset failure recorded in keep-going mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFailure {
    pub asset_id: i64,
    pub message: String,
}

/// Counts for one album
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlbumReport {
    pub album: String,
    pub copied: u64,
    pub converted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub bytes_written: u64,
    pub failures: Vec<AssetFailure>,
}

impl AlbumReport {
    fn new(album: &str) -> Self {
        Self {
            album: album.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: SyncOutcome, bytes: u64) {
        match outcome {
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Copied => self.copied += 1,
            SyncOutcome::Converted => self.converted += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
        self.bytes_written += bytes;
    }

    fn record_failure(&mut self, asset_id: i64, error: &SyncError) {
        self.record(SyncOutcome::Failed, 0);
        self.failures.push(AssetFailure {
            asset_id,
            message: error.to_string(),
        });
    }

    /// Files written in this run (copied or converted)
    pub fn written(&self) -> u64 {
        self.copied + self.converted
    }

    /// Assets that reached a terminal state
    pub fn processed(&self) -> u64 {
        self.written() + self.skipped + self.failed
    }
}

/// Result of a whole-library run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub albums: Vec<AlbumReport>,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn copied(&self) -> u64 {
        self.albums.iter().map(|a| a.copied).sum()
    }

    pub fn converted(&self) -> u64 {
        self.albums.iter().map(|a| a.converted).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.albums.iter().map(|a| a.skipped).sum()
    }

    pub fn failed(&self) -> u64 {
        self.albums.iter().map(|a| a.failed).sum()
    }

    pub fn bytes_written(&self) -> u64 {
        self.albums.iter().map(|a| a.bytes_written).sum()
    }

    pub fn written(&self) -> u64 {
        self.copied() + self.converted()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} albums: {} copied, {} converted, {} skipped, {} failed",
            self.albums.len(),
            self.copied(),
            self.converted(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Observer for sync progress.
///
/// `asset_finished` may be called from worker threads in parallel mode.
pub trait SyncProgress: Send + Sync {
    fn album_started(&self, _album: &AlbumMetadata) {}
    fn asset_finished(&self, _asset_id: i64, _outcome: SyncOutcome) {}
    fn album_finished(&self, _report: &AlbumReport) {}
}

/// Progress observer that ignores everything
pub struct NoProgress;

impl SyncProgress for NoProgress {}

/// Turn an album title into a single safe path component.
///
/// Separators and NUL become `_`; `.` and `..` are escaped so an album can
/// never resolve outside the output root.
pub fn album_dir_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

/// Everything needed to materialize one asset, resolved up front
#[derive(Debug, Clone)]
struct AssetJob {
    asset_id: i64,
    source: PathBuf,
    destination: PathBuf,
    partial: PathBuf,
    convert: bool,
}

impl AssetJob {
    fn new(asset_id: i64, location: &AssetLocation, source_root: &Path, album_dir: &Path) -> Self {
        let filename = convert::normalized_filename(&location.filename);
        Self {
            asset_id,
            source: location.source_path(source_root),
            destination: album_dir.join(&filename),
            partial: album_dir.join(format!(".{}.{}.part", filename, asset_id)),
            convert: convert::is_proprietary(&location.filename),
        }
    }
}

/// Syncs albums from one open library
pub struct SyncEngine<'a> {
    conn: &'a Connection,
    schema: &'a SchemaInfo,
    converter: &'a dyn ImageConverter,
    options: SyncOptions,
    shutdown_flag: Arc<AtomicBool>,
    progress: &'a dyn SyncProgress,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        conn: &'a Connection,
        schema: &'a SchemaInfo,
        converter: &'a dyn ImageConverter,
    ) -> Self {
        Self {
            conn,
            schema,
            converter,
            options: SyncOptions::default(),
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            progress: &NoProgress,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Flag checked before every asset; once set the album stops with
    /// [`SyncError::Interrupted`].
    pub fn with_shutdown_flag(mut self, shutdown_flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = shutdown_flag;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn SyncProgress) -> Self {
        self.progress = progress;
        self
    }

    fn check_shutdown(&self) -> Result<()> {
        if self.shutdown_flag.load(Ordering::SeqCst) {
            warn!("Shutdown requested, stopping sync...");
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }

    /// Mirror one album into `dest_root/<album name>/`.
    ///
    /// Assets are handled in store order. Without keep-going mode the first
    /// error is returned and later assets are never attempted.
    pub fn sync_album(
        &self,
        album: &AlbumMetadata,
        source_root: &Path,
        dest_root: &Path,
    ) -> Result<AlbumReport> {
        let album_dir = dest_root.join(album_dir_name(&album.name));
        ensure_album_dir(&album_dir)?;

        self.progress.album_started(album);
        let mut report = AlbumReport::new(&album.name);

        if self.options.is_parallel() {
            self.sync_parallel(album, source_root, &album_dir, &mut report)?;
        } else {
            self.sync_sequential(album, source_root, &album_dir, &mut report)?;
        }

        debug!(
            "Album '{}': {} copied, {} converted, {} skipped, {} failed",
            report.album, report.copied, report.converted, report.skipped, report.failed
        );
        self.progress.album_finished(&report);
        Ok(report)
    }

    fn sync_sequential(
        &self,
        album: &AlbumMetadata,
        source_root: &Path,
        album_dir: &Path,
        report: &mut AlbumReport,
    ) -> Result<()> {
        for &asset_id in &album.asset_ids {
            self.check_shutdown()?;

            let result = library::locate(self.conn, self.schema, asset_id).and_then(|location| {
                let job = AssetJob::new(asset_id, &location, source_root, album_dir);
                materialize(self.converter, &job)
            });

            match result {
                Ok((outcome, bytes)) => {
                    report.record(outcome, bytes);
                    self.progress.asset_finished(asset_id, outcome);
                }
                Err(e) => self.record_or_abort(asset_id, e, report)?,
            }
        }
        Ok(())
    }

    /// Locations are resolved on the calling thread (the connection is not
    /// shareable), then files are written on a dedicated pool. Each
    /// destination path gets at most one writer.
    fn sync_parallel(
        &self,
        album: &AlbumMetadata,
        source_root: &Path,
        album_dir: &Path,
        report: &mut AlbumReport,
    ) -> Result<()> {
        let mut jobs = Vec::with_capacity(album.asset_ids.len());
        let mut destinations = HashSet::new();

        for &asset_id in &album.asset_ids {
            self.check_shutdown()?;
            match library::locate(self.conn, self.schema, asset_id) {
                Ok(location) => {
                    let job = AssetJob::new(asset_id, &location, source_root, album_dir);
                    if destinations.insert(job.destination.clone()) {
                        jobs.push(job);
                    } else {
                        debug!(
                            "Asset {} shares destination {} with an earlier asset",
                            asset_id,
                            job.destination.display()
                        );
                        report.record(SyncOutcome::Skipped, 0);
                        self.progress.asset_finished(asset_id, SyncOutcome::Skipped);
                    }
                }
                Err(e) => self.record_or_abort(asset_id, e, report)?,
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
            .map_err(|e| SyncError::WorkerPool(e.to_string()))?;

        let converter = self.converter;
        let progress = self.progress;
        let shutdown_flag = &self.shutdown_flag;

        let results: Vec<(i64, Result<(SyncOutcome, u64)>)> = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    if shutdown_flag.load(Ordering::SeqCst) {
                        return (job.asset_id, Err(SyncError::Interrupted));
                    }
                    let result = materialize(converter, job);
                    if let Ok((outcome, _)) = &result {
                        progress.asset_finished(job.asset_id, *outcome);
                    }
                    (job.asset_id, result)
                })
                .collect()
        });

        let mut interrupted = false;
        let mut first_error = None;
        for (asset_id, result) in results {
            match result {
                Ok((outcome, bytes)) => report.record(outcome, bytes),
                Err(SyncError::Interrupted) => interrupted = true,
                Err(e) if self.options.continue_on_error && e.is_asset_level() => {
                    self.record_or_abort(asset_id, e, report)?
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        debug!("Further failure on asset {}: {}", asset_id, e);
                    }
                }
            }
        }

        if interrupted {
            warn!("Shutdown requested, stopping sync...");
            return Err(SyncError::Interrupted);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Keep-going mode turns asset-level errors into recorded failures;
    /// anything else is returned as is.
    fn record_or_abort(&self, asset_id: i64, error: SyncError, report: &mut AlbumReport) -> Result<()> {
        if self.options.continue_on_error && error.is_asset_level() {
            warn!("Asset {} failed: {}", asset_id, error);
            report.record_failure(asset_id, &error);
            self.progress.asset_finished(asset_id, SyncOutcome::Failed);
            Ok(())
        } else {
            Err(error)
        }
    }
}

fn ensure_album_dir(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => {
            debug!("Created album directory: {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

/// Bring one asset to a terminal state. Returns the outcome and the number
/// of bytes written.
fn materialize(converter: &dyn ImageConverter, job: &AssetJob) -> Result<(SyncOutcome, u64)> {
    if job.destination.exists() {
        trace!("Already exported: {}", job.destination.display());
        return Ok((SyncOutcome::Skipped, 0));
    }

    if job.convert {
        let data = fs::read(&job.source).map_err(|e| SyncError::io(&job.source, e))?;
        let converted = converter
            .convert(&data)
            .map_err(|source| SyncError::Conversion {
                path: job.source.clone(),
                source,
            })?;
        write_atomic(&job.destination, &job.partial, |file| {
            file.write_all(&converted.bytes)
        })?;
        trace!(
            "Converted {} -> {}",
            job.source.display(),
            job.destination.display()
        );
        Ok((SyncOutcome::Converted, converted.bytes.len() as u64))
    } else {
        let mut source = File::open(&job.source).map_err(|e| SyncError::io(&job.source, e))?;
        let bytes = write_atomic(&job.destination, &job.partial, |file| {
            io::copy(&mut source, file)
        })?;
        trace!(
            "Copied {} -> {}",
            job.source.display(),
            job.destination.display()
        );
        Ok((SyncOutcome::Copied, bytes))
    }
}

/// Write through `partial`, fsync, then rename onto `destination`.
///
/// On any failure the partial file is removed and `destination` is left
/// untouched.
fn write_atomic<T>(
    destination: &Path,
    partial: &Path,
    write: impl FnOnce(&mut File) -> io::Result<T>,
) -> Result<T> {
    let value = match persist(partial, write) {
        Ok(value) => value,
        Err(e) => {
            let _ = fs::remove_file(partial);
            return Err(SyncError::io(partial, e));
        }
    };

    if let Err(e) = fs::rename(partial, destination) {
        let _ = fs::remove_file(partial);
        return Err(SyncError::io(destination, e));
    }

    Ok(value)
}

fn persist<T>(path: &Path, write: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
    let mut file = File::create(path)?;
    let value = write(&mut file)?;
    file.sync_all()?;
    Ok(value)
}

/// Sync every selected album of the library at `library_path` into
/// `output_path`.
///
/// Opens the store read-only, resolves the schema once, and syncs the
/// albums one after the other. The shutdown flag is checked between assets.
pub fn sync_library(
    library_path: &Path,
    output_path: &Path,
    options: &SyncOptions,
    converter: &dyn ImageConverter,
    progress: &dyn SyncProgress,
    shutdown_flag: Arc<AtomicBool>,
) -> Result<SyncReport> {
    let start = Instant::now();

    info!("Opening library: {}", library_path.display());
    let conn = library::open_library(library_path)?;
    let schema = SchemaInfo::resolve(&conn)?;
    info!(
        "Schema: junction table {} ({} -> {}), assets in {}",
        schema.junction_table, schema.album_column, schema.asset_column, schema.asset_table
    );

    let albums = library::list_albums(&conn, &schema, &options.album_filter)?;
    info!("Found {} albums to sync", albums.len());

    fs::create_dir_all(output_path).map_err(|e| SyncError::io(output_path, e))?;
    info!("Output directory: {}", output_path.display());

    let mut tracker = options
        .tracking
        .as_ref()
        .filter(|config| config.enabled)
        .map(|config| {
            let mut tracker = StateTracker::new(config, output_path);
            if let Err(e) = tracker.load_or_create(library_path) {
                warn!("Failed to load tracking state: {}", e);
            }
            tracker.start_session();
            tracker
        });

    let engine = SyncEngine::new(&conn, &schema, converter)
        .with_options(options.clone())
        .with_shutdown_flag(shutdown_flag)
        .with_progress(progress);

    let mut report = SyncReport::default();
    let mut outcome = Ok(());

    for album in &albums {
        info!(
            "Syncing album '{}' ({} assets)",
            album.name,
            album.asset_ids.len()
        );
        match engine.sync_album(album, library_path, output_path) {
            Ok(album_report) => {
                if let Some(ref mut t) = tracker {
                    t.record_album(&album_report);
                }
                report.albums.push(album_report);
            }
            Err(e) => {
                if let Some(ref mut t) = tracker {
                    t.record_error();
                }
                outcome = Err(e);
                break;
            }
        }
    }

    report.elapsed = start.elapsed();

    if let Some(ref mut t) = tracker {
        let interrupted = matches!(outcome, Err(SyncError::Interrupted));
        t.end_session(outcome.is_ok(), interrupted);
        if let Err(e) = t.save() {
            warn!("Failed to save tracking state: {}", e);
        }
    }

    outcome?;
    info!("Sync finished: {}", report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::JpegConverter;
    use crate::core::tracking::SyncState;
    use crate::testdb::{images, LibraryFixture};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Workspace {
        _temp_dir: TempDir,
        library: PathBuf,
        output: PathBuf,
    }

    fn workspace() -> Workspace {
        let temp_dir = TempDir::new().unwrap();
        Workspace {
            library: temp_dir.path().join("Photos Library.photoslibrary"),
            output: temp_dir.path().join("export"),
            _temp_dir: temp_dir,
        }
    }

    fn run(ws: &Workspace, options: &SyncOptions) -> Result<SyncReport> {
        sync_library(
            &ws.library,
            &ws.output,
            options,
            &JpegConverter::default(),
            &NoProgress,
            Arc::new(AtomicBool::new(false)),
        )
    }

    /// "Vacation" with one HEIC (PNG payload) and one PNG
    fn vacation_library(ws: &Workspace) -> LibraryFixture {
        let fixture = LibraryFixture::create(&ws.library, 28).unwrap();
        let album = fixture.add_album(Some("Vacation")).unwrap();
        let heic = fixture
            .add_asset("0", "IMG_0001.heic", &images::png_bytes(32, 24).unwrap())
            .unwrap();
        let png = fixture
            .add_asset("1", "IMG_0002.png", &images::png_bytes(10, 10).unwrap())
            .unwrap();
        fixture.add_to_album(album, heic).unwrap();
        fixture.add_to_album(album, png).unwrap();
        fixture
    }

    /// Album with five PNG assets `1.png`..`5.png`, the third id missing
    fn album_with_missing_asset(ws: &Workspace) -> LibraryFixture {
        let fixture = LibraryFixture::create(&ws.library, 28).unwrap();
        let album = fixture.add_album(Some("Trip")).unwrap();
        let ids = [
            fixture.add_asset("A", "1.png", b"one").unwrap(),
            fixture.add_asset("A", "2.png", b"two").unwrap(),
            999,
            fixture.add_asset("A", "4.png", b"four").unwrap(),
            fixture.add_asset("A", "5.png", b"five").unwrap(),
        ];
        for id in ids {
            fixture.add_to_album(album, id).unwrap();
        }
        fixture
    }

    /// Files inside album directories, with their contents.
    ///
    /// Root-level files are left out on purpose: with tracking enabled the
    /// state file in the output root is rewritten by every run.
    fn tree(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = Vec::new();
        for album in fs::read_dir(root).unwrap() {
            let album = album.unwrap().path();
            if !album.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&album).unwrap() {
                let path = entry.unwrap().path();
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                files.push((relative, fs::read(&path).unwrap()));
            }
        }
        files.sort();
        files
    }

    #[test]
    fn test_sync_normalizes_and_converts() {
        let ws = workspace();
        vacation_library(&ws);

        let report = run(&ws, &SyncOptions::default()).unwrap();

        assert_eq!(report.albums.len(), 1);
        assert_eq!(report.converted(), 1);
        assert_eq!(report.copied(), 1);

        let album_dir = ws.output.join("Vacation");
        let converted = image::open(album_dir.join("IMG_0001.jpeg")).unwrap();
        assert_eq!((converted.width(), converted.height()), (32, 24));
        assert!(!album_dir.join("IMG_0001.heic").exists());

        let copied = fs::read(album_dir.join("IMG_0002.png")).unwrap();
        assert_eq!(copied, images::png_bytes(10, 10).unwrap());
    }

    #[cfg(feature = "heif")]
    #[test]
    fn test_real_heic_asset_is_converted() {
        let Some(heic) = images::heic_bytes(34, 20).unwrap() else {
            eprintln!("libheif has no HEVC encoder, skipping");
            return;
        };

        let ws = workspace();
        let fixture = LibraryFixture::create(&ws.library, 28).unwrap();
        let album = fixture.add_album(Some("Vacation")).unwrap();
        let first = fixture.add_asset("0", "IMG_0001.heic", &heic).unwrap();
        let second = fixture
            .add_asset("1", "IMG_0002.png", &images::png_bytes(10, 10).unwrap())
            .unwrap();
        fixture.add_to_album(album, first).unwrap();
        fixture.add_to_album(album, second).unwrap();

        let report = run(&ws, &SyncOptions::default()).unwrap();
        assert_eq!(report.converted(), 1);
        assert_eq!(report.copied(), 1);

        let album_dir = ws.output.join("Vacation");
        let converted = fs::read(album_dir.join("IMG_0001.jpeg")).unwrap();
        assert_eq!(image::guess_format(&converted).unwrap(), image::ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&converted).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (34, 20));
        assert!(album_dir.join("IMG_0002.png").is_file());
    }

    /// Album contents are byte-identical after a second run. The tracking
    /// state file is not compared, see `tree`.
    #[test]
    fn test_second_run_skips_everything() {
        let ws = workspace();
        vacation_library(&ws);

        run(&ws, &SyncOptions::default()).unwrap();
        let first = tree(&ws.output);

        let report = run(&ws, &SyncOptions::default()).unwrap();
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.written(), 0);
        assert_eq!(report.bytes_written(), 0);
        assert_eq!(tree(&ws.output), first);
    }

    #[test]
    fn test_fail_fast_on_missing_asset() {
        let ws = workspace();
        album_with_missing_asset(&ws);

        let err = run(&ws, &SyncOptions::default()).unwrap_err();

        assert!(matches!(err, SyncError::AssetNotFound(999)));
        let album_dir = ws.output.join("Trip");
        assert!(album_dir.join("1.png").exists());
        assert!(album_dir.join("2.png").exists());
        assert!(!album_dir.join("4.png").exists());
        assert!(!album_dir.join("5.png").exists());
    }

    #[test]
    fn test_continue_on_error_records_failure() {
        let ws = workspace();
        album_with_missing_asset(&ws);

        let options = SyncOptions {
            continue_on_error: true,
            ..Default::default()
        };
        let report = run(&ws, &options).unwrap();

        assert_eq!(report.copied(), 4);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.albums[0].failures[0].asset_id, 999);
        assert!(ws.output.join("Trip").join("5.png").exists());
    }

    #[test]
    fn test_missing_original_is_io_error() {
        let ws = workspace();
        let fixture = LibraryFixture::create(&ws.library, 28).unwrap();
        let album = fixture.add_album(Some("Gone")).unwrap();
        let asset = fixture.add_asset_row("3", "IMG_0042.png").unwrap();
        fixture.add_to_album(album, asset).unwrap();

        let err = run(&ws, &SyncOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
        assert!(!ws.output.join("Gone").join("IMG_0042.png").exists());
    }

    #[test]
    fn test_conversion_error_has_no_raw_fallback() {
        let ws = workspace();
        let fixture = LibraryFixture::create(&ws.library, 28).unwrap();
        let album = fixture.add_album(Some("Broken")).unwrap();
        let asset = fixture
            .add_asset("0", "broken.heic", b"not an image at all")
            .unwrap();
        fixture.add_to_album(album, asset).unwrap();

        let err = run(&ws, &SyncOptions::default()).unwrap_err();

        assert!(matches!(err, SyncError::Conversion { .. }));
        let album_dir = ws.output.join("Broken");
        assert!(!album_dir.join("broken.jpeg").exists());
        assert!(!album_dir.join("broken.heic").exists());
    }

    #[test]
    fn test_no_part_files_left_behind() {
        let ws = workspace();
        vacation_library(&ws);

        run(&ws, &SyncOptions::default()).unwrap();

        for entry in fs::read_dir(ws.output.join("Vacation")).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(!name.to_string_lossy().ends_with(".part"), "{:?}", name);
        }
    }

    #[test]
    fn test_stale_part_file_is_not_an_export() {
        let ws = workspace();
        let fixture = LibraryFixture::create(&ws.library, 28).unwrap();
        let album = fixture.add_album(Some("Crash")).unwrap();
        let asset = fixture.add_asset("0", "IMG_0002.png", b"complete").unwrap();
        fixture.add_to_album(album, asset).unwrap();

        let album_dir = ws.output.join("Crash");
        fs::create_dir_all(&album_dir).unwrap();
        let stale = album_dir.join(format!(".IMG_0002.png.{}.part", asset));
        fs::write(&stale, b"trunc").unwrap();

        let report = run(&ws, &SyncOptions::default()).unwrap();

        assert_eq!(report.copied(), 1);
        assert_eq!(fs::read(album_dir.join("IMG_0002.png")).unwrap(), b"complete");
        assert!(!stale.exists());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = workspace();
        vacation_library(&sequential);
        run(&sequential, &SyncOptions::default()).unwrap();

        let parallel = workspace();
        vacation_library(&parallel);
        let options = SyncOptions {
            workers: 4,
            ..Default::default()
        };
        let report = run(&parallel, &options).unwrap();

        assert_eq!(report.written(), 2);
        assert_eq!(tree(&parallel.output), tree(&sequential.output));
    }

    #[test]
    fn test_duplicate_destinations_have_one_writer() {
        for workers in [1, 3] {
            let ws = workspace();
            let fixture = LibraryFixture::create(&ws.library, 28).unwrap();
            let album = fixture.add_album(Some("Dupes")).unwrap();
            let first = fixture.add_asset("A", "IMG.png", b"first").unwrap();
            let second = fixture.add_asset("B", "IMG.png", b"second").unwrap();
            fixture.add_to_album(album, first).unwrap();
            fixture.add_to_album(album, second).unwrap();

            let options = SyncOptions {
                workers,
                ..Default::default()
            };
            let report = run(&ws, &options).unwrap();

            assert_eq!(report.copied(), 1, "workers = {}", workers);
            assert_eq!(report.skipped(), 1, "workers = {}", workers);
            assert_eq!(
                fs::read(ws.output.join("Dupes").join("IMG.png")).unwrap(),
                b"first"
            );
        }
    }

    #[test]
    fn test_parallel_fail_fast_reports_first_error() {
        let ws = workspace();
        album_with_missing_asset(&ws);

        let options = SyncOptions {
            workers: 2,
            ..Default::default()
        };
        let err = run(&ws, &options).unwrap_err();
        assert!(matches!(err, SyncError::AssetNotFound(999)));
    }

    #[test]
    fn test_shutdown_flag_interrupts() {
        let ws = workspace();
        vacation_library(&ws);

        let options = SyncOptions {
            tracking: Some(TrackingConfig::default()),
            ..Default::default()
        };
        let err = sync_library(
            &ws.library,
            &ws.output,
            &options,
            &JpegConverter::default(),
            &NoProgress,
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::Interrupted));
        assert!(!ws.output.join("Vacation").join("IMG_0001.jpeg").exists());

        let state_file = ws.output.join(TrackingConfig::default().tracking_filename);
        let state: SyncState =
            serde_json::from_str(&fs::read_to_string(state_file).unwrap()).unwrap();
        assert_eq!(state.sessions.len(), 1);
        assert!(state.sessions[0].interrupted);
        assert!(!state.sessions[0].completed);
    }

    #[test]
    fn test_tracking_accumulates_across_runs() {
        let ws = workspace();
        vacation_library(&ws);
        let options = SyncOptions {
            tracking: Some(TrackingConfig::default()),
            ..Default::default()
        };

        run(&ws, &options).unwrap();
        run(&ws, &options).unwrap();

        let state_file = ws.output.join(TrackingConfig::default().tracking_filename);
        let state: SyncState =
            serde_json::from_str(&fs::read_to_string(state_file).unwrap()).unwrap();
        assert_eq!(state.stats.total_sessions, 2);
        assert_eq!(state.stats.total_files_converted, 1);
        assert_eq!(state.stats.total_files_copied, 1);
        assert_eq!(state.stats.total_files_skipped, 2);
        assert!(state.sessions.iter().all(|s| s.completed));
    }

    #[test]
    fn test_album_filter_limits_sync() {
        let ws = workspace();
        let fixture = vacation_library(&ws);
        fixture.add_album(Some("Work")).unwrap();

        let options = SyncOptions {
            album_filter: AlbumFilter {
                include: vec![],
                exclude: vec!["Vacation".into()],
            },
            ..Default::default()
        };
        let report = run(&ws, &options).unwrap();

        assert_eq!(report.albums.len(), 1);
        assert_eq!(report.albums[0].album, "Work");
        assert!(ws.output.join("Work").is_dir());
        assert!(!ws.output.join("Vacation").exists());
    }

    #[test]
    fn test_progress_observer_sees_every_asset() {
        #[derive(Default)]
        struct Recorder {
            events: Mutex<Vec<(i64, SyncOutcome)>>,
        }
        impl SyncProgress for Recorder {
            fn asset_finished(&self, asset_id: i64, outcome: SyncOutcome) {
                self.events.lock().unwrap().push((asset_id, outcome));
            }
        }

        let ws = workspace();
        vacation_library(&ws);
        let recorder = Recorder::default();
        sync_library(
            &ws.library,
            &ws.output,
            &SyncOptions::default(),
            &JpegConverter::default(),
            &recorder,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![(1, SyncOutcome::Converted), (2, SyncOutcome::Copied)]
        );
    }

    #[test]
    fn test_album_dir_name() {
        assert_eq!(album_dir_name("Vacation"), "Vacation");
        assert_eq!(album_dir_name("2023/2024"), "2023_2024");
        assert_eq!(album_dir_name(".."), "__");
        assert_eq!(album_dir_name("..."), "...");
        assert_eq!(album_dir_name("Summer in Nice"), "Summer in Nice");
    }

    #[test]
    fn test_report_display() {
        let report = SyncReport {
            albums: vec![AlbumReport {
                album: "Vacation".into(),
                copied: 2,
                converted: 3,
                skipped: 1,
                ..Default::default()
            }],
            elapsed: Duration::from_secs(1),
        };
        assert_eq!(
            report.to_string(),
            "1 albums: 2 copied, 3 converted, 1 skipped, 0 failed"
        );
    }
}
