//! Engine configuration via `ferry.toml`
//!
//! A default `ferry.toml` is written next to the archive directory on first
//! start. To change settings, edit the file and restart.

use ferry_durability::{ArchiveCompression, ExportOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "ferry.toml";

/// Errors raised while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("Config file '{path}': {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this config
    #[error("Failed to parse config file '{path}': {reason}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Values parse but are out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine configuration loaded from `ferry.toml`.
///
/// # Example
///
/// ```toml
/// archive_dir = "archives"
/// compression = "deflate"
/// compression_level = 6
/// restore_timeout_ms = 300000
/// filename_prefix = "ferry"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FerryConfig {
    /// Directory export archives are written to
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,
    /// Entry compression: `"deflate"` or `"zstd"`
    #[serde(default)]
    pub compression: ArchiveCompression,
    /// Compression level (deflate 0-9, zstd 1-22)
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// Wall-clock ceiling for one restore transaction
    #[serde(default = "default_restore_timeout_ms")]
    pub restore_timeout_ms: u64,
    /// First component of generated archive file names
    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("archives")
}

fn default_compression_level() -> i32 {
    6
}

fn default_restore_timeout_ms() -> u64 {
    5 * 60 * 1000
}

fn default_filename_prefix() -> String {
    "ferry".to_string()
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            compression: ArchiveCompression::default(),
            compression_level: default_compression_level(),
            restore_timeout_ms: default_restore_timeout_ms(),
            filename_prefix: default_filename_prefix(),
        }
    }
}

impl FerryConfig {
    /// Default config rooted at `archive_dir`
    pub fn with_archive_dir(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            ..Self::default()
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        let levels = match self.compression {
            ArchiveCompression::Deflate => 0..=9,
            ArchiveCompression::Zstd => 1..=22,
        };
        if !levels.contains(&self.compression_level) {
            return Err(ConfigError::Invalid(format!(
                "compression_level {} out of range {:?} for {:?}",
                self.compression_level, levels, self.compression
            )));
        }
        if self.restore_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "restore_timeout_ms must be greater than zero".to_string(),
            ));
        }
        let prefix_ok = !self.filename_prefix.is_empty()
            && self
                .filename_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !prefix_ok {
            return Err(ConfigError::Invalid(format!(
                "filename_prefix '{}' must be non-empty ASCII letters, digits, '-' or '_'",
                self.filename_prefix
            )));
        }
        Ok(())
    }

    /// Archive writer options
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            compression: self.compression,
            compression_level: self.compression_level,
        }
    }

    /// Restore ceiling as a duration
    pub fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Ferry configuration
#
# Directory export archives are written to (relative to the working directory)
archive_dir = "archives"

# Entry compression: "deflate" (default, readable by every unzip tool) or "zstd"
compression = "deflate"

# Compression level: deflate 0-9, zstd 1-22
compression_level = 6

# Hard wall-clock ceiling for one restore transaction, in milliseconds.
# A restore running past it is rolled back and releases its scope lock.
restore_timeout_ms = 300000

# Archive file names look like <prefix>-<scope>-<timestamp>-<id>.zip
filename_prefix = "ferry"
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FerryConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> ConfigResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
