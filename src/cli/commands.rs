//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_bytes, format_duration, print_error, print_header, print_info, print_success,
    print_warning, AlbumProgress,
};
use crate::cli::{Args, Commands};
use crate::convert::{self, JpegConverter};
use crate::core::config::{get_config_path, Config};
use crate::core::error::SyncError;
use crate::core::sync::{self, SyncReport};
use crate::core::tracking;
use crate::library::{self, SchemaInfo};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Run the appropriate command based on CLI arguments
///
/// `config` already has the global `--library`/`--output`/`--log-level`
/// overrides applied.
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Some(Commands::Sync {
            continue_on_error,
            workers,
            albums,
            exclude_albums,
        }) => {
            let mut config = config.clone();
            if *continue_on_error {
                config.sync.continue_on_error = true;
            }
            if let Some(workers) = workers {
                config.sync.workers = *workers;
            }
            if !albums.is_empty() {
                config.sync.include_albums = albums.clone();
            }
            config.sync.exclude_albums.extend(exclude_albums.iter().cloned());

            run_sync(&config, shutdown_flag)?;
        }
        Some(Commands::Convert { input, output_dir }) => {
            let output_dir = output_dir
                .clone()
                .unwrap_or_else(|| config.convert.output_dir.clone());
            convert_single(config, input, &output_dir)?;
        }
        Some(Commands::Albums) => {
            list_albums(config)?;
        }
        Some(Commands::ShowConfig) => {
            show_config(config);
        }
        Some(Commands::GenerateConfig { path }) => {
            generate_config_file(path.clone())?;
        }
        None => {
            // Bare invocation syncs, like `sync` without flags
            run_sync(config, shutdown_flag)?;
        }
    }

    Ok(())
}

/// Library path from config/CLI, or an error telling the user how to set it
fn require_library(config: &Config) -> Result<&Path> {
    let path = config.library.path.as_path();
    if path.as_os_str().is_empty() {
        bail!("No Photos library given. Pass --library <PATH> or set [library] path in the config file.");
    }
    Ok(path)
}

fn require_output(config: &Config) -> Result<&Path> {
    let path = config.output.directory.as_path();
    if path.as_os_str().is_empty() {
        bail!("No output directory given. Pass --output <PATH> or set [output] directory in the config file.");
    }
    Ok(path)
}

/// Sync every selected album into the output directory
pub fn run_sync(config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    let library_path = require_library(config)?;
    let output_path = require_output(config)?;
    let options = config.to_sync_options();

    print_header("Photos Album Sync");
    print_info(&format!("Library: {}", library_path.display()));
    print_info(&format!("Output:  {}", output_path.display()));
    if options.continue_on_error {
        print_info("Keep-going mode: failing assets are recorded and skipped");
    }
    println!();

    let converter = JpegConverter::new(config.convert.jpeg_quality);
    let progress = AlbumProgress::new();

    let result = sync::sync_library(
        library_path,
        output_path,
        &options,
        &converter,
        &progress,
        shutdown_flag,
    );
    debug!("{} assets reached a final state", progress.assets_done());
    drop(progress);

    match result {
        Ok(report) => {
            print_summary(&report);
            if config.tracking.enabled {
                if let Some(state) = tracking::load_state(output_path, &config.tracking) {
                    debug!(
                        "Lifetime totals: {} sessions, {} written",
                        state.stats.total_sessions,
                        state.stats.total_files_copied + state.stats.total_files_converted
                    );
                }
            }
            if report.failed() > 0 {
                bail!("{} assets failed to sync", report.failed());
            }
            Ok(())
        }
        Err(SyncError::Interrupted) => {
            println!();
            print_warning("Sync interrupted. Run the command again to pick up where it stopped.");
            Err(SyncError::Interrupted.into())
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Failed to sync '{}' into '{}'",
                library_path.display(),
                output_path.display()
            )
        }),
    }
}

fn print_summary(report: &SyncReport) {
    println!();
    print_success(&format!(
        "Synced {} albums in {}",
        report.albums.len(),
        format_duration(report.elapsed)
    ));
    print_info(&format!(
        "{} copied, {} converted ({})",
        report.copied(),
        report.converted(),
        format_bytes(report.bytes_written())
    ));
    print_info(&format!("{} already present", report.skipped()));

    if report.failed() > 0 {
        print_warning(&format!("{} assets failed:", report.failed()));
        for album in report.albums.iter().filter(|a| a.failed > 0) {
            for failure in &album.failures {
                print_error(&format!(
                    "{}: asset {}: {}",
                    album.album, failure.asset_id, failure.message
                ));
            }
        }
    }
    println!();
}

/// Convert one image file to JPEG
pub fn convert_single(config: &Config, input: &Path, output_dir: &Path) -> Result<()> {
    let converter = JpegConverter::new(config.convert.jpeg_quality);
    let written = convert::convert_file(&converter, input, output_dir)
        .with_context(|| format!("Failed to convert '{}'", input.display()))?;

    print_success(&format!("Wrote {}", written.display()));
    Ok(())
}

/// List the albums of the library with their asset counts
pub fn list_albums(config: &Config) -> Result<()> {
    let library_path = require_library(config)?;

    let conn = library::open_library(library_path)?;
    let schema = SchemaInfo::resolve(&conn)?;
    let albums = library::list_albums(&conn, &schema, &config.sync.album_filter())?;

    print_header("Albums");
    print_info(&format!(
        "Junction table {} (album entity {}), assets in {}",
        schema.junction_table, schema.entity_value, schema.asset_table
    ));
    println!();

    if albums.is_empty() {
        print_warning("No albums found");
        return Ok(());
    }

    let width = albums.iter().map(|a| a.name.chars().count()).max().unwrap_or(0);
    for album in &albums {
        println!(
            "  {:<width$}  {:>6} assets",
            album.name,
            album.asset_ids.len(),
            width = width
        );
    }
    println!();
    print_info(&format!(
        "{} albums, {} assets",
        albums.len(),
        albums.iter().map(|a| a.asset_ids.len()).sum::<usize>()
    ));

    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => path,
        None => get_config_path().context("Could not determine configuration directory")?,
    };

    if output_path.exists() {
        bail!(
            "Configuration file already exists: {}",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    fs::write(&output_path, Config::generate_default_config())
        .with_context(|| format!("Failed to write '{}'", output_path.display()))?;

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to set the library and output paths.");

    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[library]");
    info!("  path = \"{}\"", config.library.path.display());
    info!("");
    info!("[output]");
    info!("  directory = \"{}\"", config.output.directory.display());
    info!("");
    info!("[sync]");
    info!("  continue_on_error = {}", config.sync.continue_on_error);
    info!("  workers = {}", config.sync.workers);
    info!("  include_albums = {:?}", config.sync.include_albums);
    info!("  exclude_albums = {:?}", config.sync.exclude_albums);
    info!("");
    info!("[convert]");
    info!("  jpeg_quality = {}", config.convert.jpeg_quality);
    info!("  output_dir = \"{}\"", config.convert.output_dir.display());
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
    info!("");
    info!("[tracking]");
    info!("  enabled = {}", config.tracking.enabled);
    info!(
        "  tracking_filename = \"{}\"",
        config.tracking.tracking_filename
    );
    info!("  max_sessions = {}", config.tracking.max_sessions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdb::{images, LibraryFixture};
    use tempfile::TempDir;

    fn config_for(library: &Path, output: &Path) -> Config {
        let mut config = Config::default();
        config.library.path = library.to_path_buf();
        config.output.directory = output.to_path_buf();
        config
    }

    #[test]
    fn test_sync_requires_paths() {
        let flag = Arc::new(AtomicBool::new(false));

        let err = run_sync(&Config::default(), flag.clone()).unwrap_err();
        assert!(err.to_string().contains("--library"));

        let mut config = Config::default();
        config.library.path = PathBuf::from("/lib.photoslibrary");
        let err = run_sync(&config, flag).unwrap_err();
        assert!(err.to_string().contains("--output"));
    }

    #[test]
    fn test_sync_command_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let library = temp_dir.path().join("Library.photoslibrary");
        let output = temp_dir.path().join("out");

        let fixture = LibraryFixture::create(&library, 28).unwrap();
        let album = fixture.add_album(Some("Vacation")).unwrap();
        let asset = fixture
            .add_asset("0", "IMG_0001.HEIC", &images::png_bytes(8, 8).unwrap())
            .unwrap();
        fixture.add_to_album(album, asset).unwrap();

        let config = config_for(&library, &output);
        run_sync(&config, Arc::new(AtomicBool::new(false))).unwrap();

        assert!(output.join("Vacation").join("IMG_0001.jpeg").is_file());
        assert!(output.join(".album_sync_state.json").is_file());
    }

    #[test]
    fn test_sync_command_reports_failures() {
        let temp_dir = TempDir::new().unwrap();
        let library = temp_dir.path().join("Library.photoslibrary");
        let output = temp_dir.path().join("out");

        let fixture = LibraryFixture::create(&library, 28).unwrap();
        let album = fixture.add_album(Some("Trip")).unwrap();
        fixture.add_to_album(album, 404).unwrap();

        let mut config = config_for(&library, &output);
        let err = run_sync(&config, Arc::new(AtomicBool::new(false))).unwrap_err();
        assert!(err
            .chain()
            .any(|cause| cause.to_string().contains("Asset 404 not found")));

        config.sync.continue_on_error = true;
        let err = run_sync(&config, Arc::new(AtomicBool::new(false))).unwrap_err();
        assert!(err.to_string().contains("1 assets failed"));
    }

    #[test]
    fn test_convert_single() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("IMG_0007.heic");
        fs::write(&input, images::png_bytes(4, 4).unwrap()).unwrap();
        let output_dir = temp_dir.path().join("output");

        convert_single(&Config::default(), &input, &output_dir).unwrap();
        assert!(output_dir.join("IMG_0007.jpeg").is_file());
    }

    #[test]
    fn test_list_albums_on_missing_library() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(&temp_dir.path().join("nope"), temp_dir.path());
        assert!(list_albums(&config).is_err());
    }

    #[test]
    fn test_generate_config_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("config.toml");

        generate_config_file(Some(path.clone())).unwrap();
        assert!(Config::load(&path).is_ok());
        assert!(generate_config_file(Some(path)).is_err());
    }
}
