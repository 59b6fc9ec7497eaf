//! Tracking module for sync history
//!
//! This module manages a hidden tracking file in the output root that stores:
//! - The library the output tree was synced from
//! - Cumulative statistics across runs
//! - A history of sync sessions (start/end, counts, how it ended)
//!
//! The tracking file is informational only. Whether an asset needs to be
//! written is decided by the presence of its destination file, never by
//! this state.

use crate::core::config::TrackingConfig;
use crate::core::error::{Result, SyncError};
use crate::core::sync::AlbumReport;
use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Version of the tracking file format
const STATE_VERSION: u32 = 1;

/// Sync state stored in the tracking file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    /// Version of the tracking file format
    pub version: u32,

    /// Source library information
    pub library: LibraryState,

    /// Cumulative statistics
    pub stats: SyncStats,

    /// Sync sessions history
    #[serde(default)]
    pub sessions: Vec<SyncSession>,
}

/// Source library information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryState {
    /// Library path as given on the command line or in the config
    pub path: PathBuf,

    /// First sync from this library into this output
    pub first_synced: DateTime<Utc>,

    /// Most recent sync
    pub last_synced: DateTime<Utc>,
}

/// Cumulative sync statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncStats {
    pub total_files_copied: u64,
    pub total_files_converted: u64,
    /// Assets whose destination already existed
    pub total_files_skipped: u64,
    pub total_files_failed: u64,
    pub total_bytes_written: u64,
    pub total_sessions: u64,
}

/// Record of a single sync session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSession {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub albums_synced: u64,
    pub files_copied: u64,
    pub files_converted: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub bytes_written: u64,
    /// Album-level errors that aborted the run
    pub errors: u64,
    /// Whether the session completed successfully
    pub completed: bool,
    /// Whether the session was stopped by a shutdown request
    pub interrupted: bool,
}

impl SyncSession {
    fn start(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            ended_at: now,
            albums_synced: 0,
            files_copied: 0,
            files_converted: 0,
            files_skipped: 0,
            files_failed: 0,
            bytes_written: 0,
            errors: 0,
            completed: false,
            interrupted: false,
        }
    }
}

impl SyncState {
    /// Create a new sync state for a library
    pub fn new(library: &Path) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION,
            library: LibraryState {
                path: library.to_path_buf(),
                first_synced: now,
                last_synced: now,
            },
            stats: SyncStats::default(),
            sessions: Vec::new(),
        }
    }
}

/// Tracker for managing sync state
pub struct StateTracker {
    /// Configuration
    config: TrackingConfig,

    /// Path to the tracking file
    tracking_file_path: PathBuf,

    /// Current sync state
    state: SyncState,

    /// Current session (if active)
    current_session: Option<SyncSession>,

    /// Whether the state has been modified
    dirty: bool,
}

impl StateTracker {
    /// Create a new state tracker for an output root
    pub fn new(config: &TrackingConfig, output_dir: &Path) -> Self {
        Self {
            config: config.clone(),
            tracking_file_path: output_dir.join(&config.tracking_filename),
            state: SyncState::new(Path::new("")),
            current_session: None,
            dirty: false,
        }
    }

    /// Load existing state or start a new one for the library.
    ///
    /// State recorded for a different library is replaced. An unreadable
    /// file is reported and replaced too.
    pub fn load_or_create(&mut self, library: &Path) -> Result<()> {
        if !self.tracking_file_path.exists() {
            debug!("Creating new tracking state for '{}'", library.display());
            self.state = SyncState::new(library);
            self.dirty = true;
            return Ok(());
        }

        match self.load_state() {
            Ok(mut state) if state.library.path == library => {
                debug!(
                    "Loaded tracking state ({} sessions, {} files written)",
                    state.stats.total_sessions,
                    state.stats.total_files_copied + state.stats.total_files_converted
                );
                state.library.last_synced = Utc::now();
                self.state = state;
                self.dirty = true;
                Ok(())
            }
            Ok(state) => {
                warn!("Tracking file exists but is for a different library. Creating new state.");
                warn!("  Existing: {}", state.library.path.display());
                warn!("  Current: {}", library.display());
                self.state = SyncState::new(library);
                self.dirty = true;
                Ok(())
            }
            Err(e) => {
                self.state = SyncState::new(library);
                self.dirty = true;
                Err(e)
            }
        }
    }

    fn load_state(&self) -> Result<SyncState> {
        let file = File::open(&self.tracking_file_path)
            .map_err(|e| SyncError::io(&self.tracking_file_path, e))?;

        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SyncError::Tracking(format!("Failed to parse tracking file: {}", e)))
    }

    /// Save state to the tracking file
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            trace!("State not modified, skipping save");
            return Ok(());
        }

        let file = File::create(&self.tracking_file_path)
            .map_err(|e| SyncError::io(&self.tracking_file_path, e))?;

        serde_json::to_writer_pretty(BufWriter::new(file), &self.state)
            .map_err(|e| SyncError::Tracking(format!("Failed to write tracking file: {}", e)))?;

        debug!(
            "Saved tracking state to: {}",
            self.tracking_file_path.display()
        );
        self.dirty = false;
        Ok(())
    }

    /// Start a new sync session
    pub fn start_session(&mut self) {
        let now = Utc::now();
        self.current_session = Some(SyncSession::start(now));
        self.dirty = true;
        debug!("Started sync session at {}", now);
    }

    /// Fold a finished album into the session and the totals
    pub fn record_album(&mut self, report: &AlbumReport) {
        if let Some(ref mut session) = self.current_session {
            session.albums_synced += 1;
            session.files_copied += report.copied;
            session.files_converted += report.converted;
            session.files_skipped += report.skipped;
            session.files_failed += report.failed;
            session.bytes_written += report.bytes_written;
        }

        let stats = &mut self.state.stats;
        stats.total_files_copied += report.copied;
        stats.total_files_converted += report.converted;
        stats.total_files_skipped += report.skipped;
        stats.total_files_failed += report.failed;
        stats.total_bytes_written += report.bytes_written;
        self.dirty = true;
    }

    /// Record an error that stopped an album
    pub fn record_error(&mut self) {
        if let Some(ref mut session) = self.current_session {
            session.errors += 1;
        }
        self.dirty = true;
    }

    /// End the current session, keeping at most `max_sessions` in history
    pub fn end_session(&mut self, completed: bool, interrupted: bool) {
        if let Some(mut session) = self.current_session.take() {
            session.ended_at = Utc::now();
            session.completed = completed;
            session.interrupted = interrupted;

            debug!(
                "Session ended: {} copied, {} converted, {} skipped, {} failed",
                session.files_copied,
                session.files_converted,
                session.files_skipped,
                session.files_failed
            );

            self.state.sessions.push(session);
            self.state.stats.total_sessions += 1;

            let max = self.config.max_sessions;
            if max > 0 && self.state.sessions.len() > max {
                let excess = self.state.sessions.len() - max;
                self.state.sessions.drain(..excess);
            }
        }
        self.dirty = true;
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn tracking_file_path(&self) -> &Path {
        &self.tracking_file_path
    }
}

impl Drop for StateTracker {
    fn drop(&mut self) {
        // Only persist once a run actually touched the output root
        if self.dirty && self.tracking_file_path.parent().is_some_and(Path::is_dir) {
            if let Err(e) = self.save() {
                warn!("Failed to save tracking state on drop: {}", e);
            }
        }
    }
}

/// Read the tracking file of an output root, if there is a readable one
pub fn load_state(output_dir: &Path, config: &TrackingConfig) -> Option<SyncState> {
    let path = output_dir.join(&config.tracking_filename);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Failed to parse tracking file {}: {}", path.display(), e);
            None
        }
    }
}
