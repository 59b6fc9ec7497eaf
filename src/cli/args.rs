//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mirror Photos library albums into plain directories
#[derive(Parser, Debug)]
#[command(name = "photos-album-sync")]
#[command(version)]
#[command(about = "Mirror the albums of a Photos library into a directory tree, converting HEIC to JPEG", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the .photoslibrary directory (overrides config)
    #[arg(short = 'L', long, global = true, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Root of the exported album tree (overrides config)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync every album of the library into the output directory
    ///
    /// Files already present in the output are left alone, so running the
    /// command again only exports what is new.
    Sync {
        /// Record failing assets and keep going instead of stopping
        #[arg(long)]
        continue_on_error: bool,

        /// Parallel writers per album (1 = sequential, 0 = one per CPU)
        #[arg(short, long, value_name = "N")]
        workers: Option<usize>,

        /// Only sync this album (can be specified multiple times)
        #[arg(long = "album", value_name = "NAME")]
        albums: Vec<String>,

        /// Skip this album (can be specified multiple times)
        #[arg(long = "exclude-album", value_name = "NAME")]
        exclude_albums: Vec<String>,
    },

    /// Convert a single HEIC/HEIF (or any supported) image to JPEG
    Convert {
        /// Image to convert
        input: PathBuf,

        /// Directory to write the JPEG into (defaults to ./output)
        #[arg(short = 'd', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// List the albums of the library without writing anything
    Albums,

    /// Show current configuration
    ShowConfig,

    /// Generate a configuration file at a specific location
    GenerateConfig {
        /// Where to write the config file (defaults to standard location)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}
