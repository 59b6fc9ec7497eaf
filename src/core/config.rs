//! Configuration module for the album sync
//!
//! Supports loading configuration from a TOML file.
//! Configuration is stored in a standard location:
//! - Windows: %APPDATA%\photos_album_sync\config.toml
//! - macOS: ~/Library/Application Support/photos_album_sync/config.toml
//! - Linux: ~/.config/photos_album_sync/config.toml
//!
//! Every section is optional; missing keys take their defaults. Command-line
//! flags override whatever the file says.

use crate::convert::codec::DEFAULT_JPEG_QUALITY;
use crate::core::sync::SyncOptions;
use crate::library::AlbumFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application name used for config directory
const APP_NAME: &str = "photos_album_sync";

/// Default config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config files looked up in the current directory, in order
const LOCAL_CONFIG_FILES: &[&str] = &["./config.toml", "./album_sync.toml"];

/// Get the standard configuration directory for the application.
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

/// Get the standard configuration file path.
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source library settings
    pub library: LibraryConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Sync behaviour
    pub sync: SyncConfig,

    /// Standalone conversion settings
    pub convert: ConvertConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Tracking settings
    pub tracking: TrackingConfig,
}

/// Source library configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Path to the `.photoslibrary` directory (empty = must be given on the CLI)
    pub path: PathBuf,
}

/// Output directory configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of the exported album tree (empty = must be given on the CLI)
    pub directory: PathBuf,
}

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Record per-asset failures and continue instead of aborting
    pub continue_on_error: bool,

    /// Parallel writers per album: 1 = sequential, 0 = one per CPU
    pub workers: usize,

    /// Only sync these albums (empty = all)
    pub include_albums: Vec<String>,

    /// Never sync these albums
    pub exclude_albums: Vec<String>,
}

/// Conversion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,

    /// Output directory of the `convert` command
    pub output_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log to file
    pub log_to_file: bool,

    /// Log file path
    pub log_file: PathBuf,
}

/// Tracking configuration for the sync history file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Enable tracking of sync runs
    pub enabled: bool,

    /// Name of the hidden tracking file (stored in the output directory)
    pub tracking_filename: String,

    /// Sessions kept in history (0 = unlimited)
    pub max_sessions: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            workers: 1,
            include_albums: vec![],
            exclude_albums: vec![],
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            output_dir: PathBuf::from("./output"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_to_file: false,
            log_file: PathBuf::from("./album_sync.log"),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tracking_filename: ".album_sync_state.json".to_string(),
            max_sessions: 50,
        }
    }
}

impl SyncConfig {
    pub fn album_filter(&self) -> AlbumFilter {
        AlbumFilter {
            include: self.include_albums.clone(),
            exclude: self.exclude_albums.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError(_, msg) => ConfigError::ParseError(path.to_path_buf(), msg),
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::new(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./config.toml (current directory)
    /// 2. ./album_sync.toml (current directory - alternative name)
    /// 3. Standard config location
    ///
    /// If no config file is found, returns default configuration.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// First existing config file in search order
    pub fn find_config_file() -> Option<PathBuf> {
        LOCAL_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
            .or_else(|| get_config_path().filter(|path| path.exists()))
    }

    /// Get the path where the config file is (or would be) located.
    pub fn get_active_config_path() -> PathBuf {
        Self::find_config_file()
            .or_else(get_config_path)
            .unwrap_or_else(|| PathBuf::from("./config.toml"))
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.convert.jpeg_quality) {
            return Err(ConfigError::InvalidValue(
                "convert.jpeg_quality".to_string(),
                format!("{} is not within 1-100", self.convert.jpeg_quality),
            ));
        }
        if self.tracking.enabled && self.tracking.tracking_filename.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "tracking.tracking_filename".to_string(),
                "must not be empty while tracking is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Options for the sync engine derived from this configuration
    pub fn to_sync_options(&self) -> SyncOptions {
        SyncOptions {
            continue_on_error: self.sync.continue_on_error,
            workers: self.sync.workers,
            album_filter: self.sync.album_filter(),
            tracking: Some(self.tracking.clone()).filter(|t| t.enabled),
        }
    }

    /// Generate a default config file with comments
    /// This uses the example config file to ensure it stays up to date
    pub fn generate_default_config() -> String {
        include_str!("../../config.example.toml").to_string()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file was not found at the specified path
    FileNotFound(PathBuf),
    /// Failed to read the configuration file
    ReadError(PathBuf, String),
    /// Failed to parse the configuration file (invalid TOML)
    ParseError(PathBuf, String),
    /// A setting has an unusable value
    InvalidValue(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ReadError(path, err) => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::ParseError(path, err) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    err
                )
            }
            ConfigError::InvalidValue(key, err) => {
                write!(f, "Invalid value for '{}': {}", key, err)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.library.path.as_os_str().is_empty());
        assert!(!config.sync.continue_on_error);
        assert_eq!(config.sync.workers, 1);
        assert_eq!(config.convert.jpeg_quality, 90);
        assert_eq!(config.convert.output_dir, PathBuf::from("./output"));
        assert_eq!(config.tracking.tracking_filename, ".album_sync_state.json");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [library]
            path = "/Users/me/Pictures/Photos Library.photoslibrary"

            [sync]
            workers = 4
            exclude_albums = ["Screenshots"]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.library.path,
            PathBuf::from("/Users/me/Pictures/Photos Library.photoslibrary")
        );
        assert_eq!(config.sync.workers, 4);
        assert!(!config.sync.continue_on_error);
        assert_eq!(config.logging.level, "info");
        assert!(config.tracking.enabled);

        let filter = config.sync.album_filter();
        assert!(!filter.allows("Screenshots"));
        assert!(filter.allows("Vacation"));
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let err = Config::from_toml("[convert]\njpeg_quality = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "convert.jpeg_quality"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[sync\nworkers = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        match err {
            ConfigError::ParseError(p, _) => assert_eq!(p, path),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::from_toml(&Config::generate_default_config()).unwrap();
        assert_eq!(config.sync.workers, 1);
        assert_eq!(config.convert.jpeg_quality, 90);
    }

    #[test]
    fn test_to_sync_options() {
        let mut config = Config::default();
        config.sync.continue_on_error = true;
        config.sync.include_albums = vec!["Trip".into()];

        let options = config.to_sync_options();
        assert!(options.continue_on_error);
        assert_eq!(options.album_filter.include, vec!["Trip".to_string()]);
        assert!(options.tracking.is_some());

        config.tracking.enabled = false;
        assert!(config.to_sync_options().tracking.is_none());
    }
}
