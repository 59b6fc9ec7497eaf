//! Progress bar utilities for CLI output
//!
//! This module provides progress tracking for album syncs and the console
//! helpers shared by all commands.
//!
//! Key features:
//! - One progress bar per album, finished with a summary line
//! - Progress bars that suspend cleanly when logging
//! - Consistent visual styling across all operations

use crate::core::sync::{AlbumReport, SyncOutcome, SyncProgress};
use crate::library::AlbumMetadata;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the progress bar style for album syncs
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} {prefix:.bold} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Get the style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ {prefix:.bold} [{bar:40.green/dim}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

// ============================================================================
// Album sync progress
// ============================================================================

/// Bars drawn by this process; log output is routed around them
static BARS: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

/// Per-album progress bars for the `sync` command
pub struct AlbumProgress {
    bars: Option<MultiProgress>,
    current: Mutex<Option<ProgressBar>>,
    assets_done: AtomicU64,
}

impl AlbumProgress {
    pub fn new() -> Self {
        Self {
            bars: Some(BARS.clone()),
            current: Mutex::new(None),
            assets_done: AtomicU64::new(0),
        }
    }

    /// Tracker that draws nothing
    #[cfg(test)]
    fn hidden() -> Self {
        Self {
            bars: None,
            current: Mutex::new(None),
            assets_done: AtomicU64::new(0),
        }
    }

    /// Assets that reached a terminal state so far
    pub fn assets_done(&self) -> u64 {
        self.assets_done.load(Ordering::Relaxed)
    }
}

impl Default for AlbumProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncProgress for AlbumProgress {
    fn album_started(&self, album: &AlbumMetadata) {
        let bar = match &self.bars {
            Some(bars) => bars.add(ProgressBar::new(album.asset_ids.len() as u64)),
            None => ProgressBar::hidden(),
        };
        bar.set_length(album.asset_ids.len() as u64);
        bar.set_style(progress_bar_style());
        bar.set_prefix(album.name.chars().take(24).collect::<String>());
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn asset_finished(&self, _asset_id: i64, outcome: SyncOutcome) {
        self.assets_done.fetch_add(1, Ordering::Relaxed);
        if let Ok(current) = self.current.lock() {
            if let Some(bar) = current.as_ref() {
                if outcome == SyncOutcome::Failed {
                    bar.set_message("(with failures)");
                }
                bar.inc(1);
            }
        }
    }

    fn album_finished(&self, report: &AlbumReport) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(bar) = current.take() {
                bar.set_style(completed_style());
                bar.finish_with_message(format!(
                    "{} new, {} skipped{}",
                    report.written(),
                    report.skipped,
                    if report.failed > 0 {
                        format!(", {} failed", report.failed)
                    } else {
                        String::new()
                    }
                ));
            }
        }
    }
}

impl Drop for AlbumProgress {
    fn drop(&mut self) {
        // An album that errored out never reaches album_finished
        if let Ok(mut current) = self.current.lock() {
            if let Some(bar) = current.take() {
                bar.abandon();
            }
        }
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

/// Log target that hides the live progress bars while a record is written
///
/// Wraps the stderr (or [`DualWriter`]) sink handed to env_logger so that
/// warnings raised mid-album do not tear through a bar.
pub struct BarSafeWriter<W> {
    inner: W,
    bars: MultiProgress,
}

impl<W: Write> BarSafeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bars: BARS.clone(),
        }
    }
}

impl<W: Write> Write for BarSafeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let inner = &mut self.inner;
        self.bars.suspend(|| inner.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let inner = &mut self.inner;
        self.bars.suspend(|| inner.flush())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30.0s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m");
    }

    #[test]
    fn test_album_progress_counts_assets() {
        let progress = AlbumProgress::hidden();
        let album = AlbumMetadata {
            id: 1,
            name: "Vacation".into(),
            asset_ids: vec![1, 2, 3],
        };

        progress.album_started(&album);
        progress.asset_finished(1, SyncOutcome::Copied);
        progress.asset_finished(2, SyncOutcome::Skipped);
        progress.asset_finished(3, SyncOutcome::Failed);
        progress.album_finished(&AlbumReport::default());

        assert_eq!(progress.assets_done(), 3);
        assert!(progress.current.lock().unwrap().is_none());
    }

    #[test]
    fn test_log_writes_pass_through_live_bars() {
        let bars = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        let bar = bars.add(ProgressBar::new(10));
        bar.inc(3);

        let mut writer = BarSafeWriter {
            inner: Vec::new(),
            bars,
        };
        writeln!(writer, "[WARN] asset 7 failed").unwrap();
        writer.flush().unwrap();

        assert_eq!(writer.inner, b"[WARN] asset 7 failed\n");
        assert_eq!(bar.position(), 3);
    }
}
