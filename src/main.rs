//! Photos Album Sync - CLI Entry Point
//!
//! Mirrors the albums of a Photos library into a plain directory tree.
//!
//! This binary is a thin wrapper around the library, handling argument parsing,
//! logging setup, and command dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use photos_album_sync::cli::{self, Args, BarSafeWriter, DualWriter};
use photos_album_sync::core::config::Config;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration; an explicit --config must be valid
    let mut config = match args.config {
        Some(ref config_path) => Config::load(config_path)
            .with_context(|| format!("Failed to load config '{}'", config_path.display()))?,
        None => match Config::load_default() {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                Config::default()
            }
        },
    };

    // Apply CLI overrides to config
    if let Some(ref library) = args.library {
        config.library.path = library.clone();
    }
    if let Some(ref output) = args.output {
        config.output.directory = output.clone();
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    // Set up graceful shutdown handler
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();

    ctrlc::set_handler(move || {
        if shutdown_flag_clone.load(Ordering::SeqCst) {
            // Second Ctrl+C - force exit
            eprintln!("\nForce shutdown requested. Exiting immediately...");
            std::process::exit(1);
        } else {
            shutdown_flag_clone.store(true, Ordering::SeqCst);
            eprintln!("\nGraceful shutdown requested. Finishing current file... (Press Ctrl+C again to force quit)");
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    // Initialize logger
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    if config.logging.log_to_file {
        // Set up logging to both console and file
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.log_file)
            .with_context(|| {
                format!(
                    "Failed to open log file '{}'",
                    config.logging.log_file.display()
                )
            })?;

        Builder::new()
            .filter_level(log_level)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {} {}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(BarSafeWriter::new(
                DualWriter {
                    console: std::io::stderr(),
                    file: log_file,
                },
            ))))
            .init();

        info!("Logging to file: {}", config.logging.log_file.display());
    } else {
        Builder::new()
            .filter_level(log_level)
            .parse_default_env()
            .target(env_logger::Target::Pipe(Box::new(BarSafeWriter::new(
                std::io::stderr(),
            ))))
            .init();
    }

    info!(
        "{} v{}",
        photos_album_sync::NAME,
        photos_album_sync::VERSION
    );

    // Run the command
    cli::run_command(&args, &config, shutdown_flag)?;

    Ok(())
}
