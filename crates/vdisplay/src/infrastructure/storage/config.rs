//! TOML-based configuration for vdisplay.
//!
//! Read from `$XDG_CONFIG_HOME/vdisplay/config.toml` (or
//! `~/.config/vdisplay/config.toml`), or from the path given with `--config`.
//! Every field is optional:
//!
//! ```toml
//! [general]
//! log_level = "warn"
//!
//! [pool]
//! output_prefix = "VIRTUAL"
//! size = 6
//!
//! [modes]
//! name_prefix = "vd-"
//! refresh_hz = 60
//!
//! [layout]
//! auto_place = true
//!
//! [extension]
//! program = "xrandr"
//! ```
//!
//! Fields annotated with `#[serde(default = "some_fn")]` fall back to
//! `some_fn()` when absent, so a missing file and an empty file behave the
//! same.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::application::output_pool::PoolSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub modes: ModesConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub extension: ExtensionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` level used when neither `--debug` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// The virtual outputs exposed by the display server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolConfig {
    /// Slot `n` is the output named `<output_prefix><n>`.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,
    /// Number of virtual outputs.
    #[serde(default = "default_pool_size")]
    pub size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModesConfig {
    /// Prefix that marks a mode as created by vdisplay.
    #[serde(default = "default_mode_prefix")]
    pub name_prefix: String,
    /// Refresh rate for new modes, in Hz.
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    /// Place new outputs right of the rightmost one when no position is given.
    #[serde(default = "default_true")]
    pub auto_place: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtensionConfig {
    /// Program used to talk to the display server.
    #[serde(default = "default_program")]
    pub program: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "warn".to_string()
}
fn default_output_prefix() -> String {
    "VIRTUAL".to_string()
}
fn default_pool_size() -> u32 {
    6
}
fn default_mode_prefix() -> String {
    "vd-".to_string()
}
fn default_refresh_hz() -> u32 {
    60
}
fn default_true() -> bool {
    true
}
fn default_program() -> String {
    "xrandr".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            output_prefix: default_output_prefix(),
            size: default_pool_size(),
        }
    }
}

impl Default for ModesConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_mode_prefix(),
            refresh_hz: default_refresh_hz(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            auto_place: default_true(),
        }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

impl AppConfig {
    /// Rejects values the rest of the program cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if !is_log_filter(&self.general.log_level) {
            return invalid(
                "general.log_level",
                "must be error, warn, info, debug, trace, off or target=level directives",
            );
        }
        if self.pool.output_prefix.is_empty() {
            return invalid("pool.output_prefix", "must not be empty");
        }
        if self.pool.size == 0 {
            return invalid("pool.size", "must be at least 1");
        }
        if self.modes.name_prefix.is_empty() {
            return invalid("modes.name_prefix", "must not be empty");
        }
        if self.modes.name_prefix.starts_with(|c: char| c.is_ascii_digit()) {
            return invalid("modes.name_prefix", "must not start with a digit");
        }
        if !(1..=240).contains(&self.modes.refresh_hz) {
            return invalid("modes.refresh_hz", "must be between 1 and 240");
        }
        if self.extension.program.is_empty() {
            return invalid("extension.program", "must not be empty");
        }
        Ok(())
    }

    /// The settings the use cases run with.
    pub fn settings(&self) -> PoolSettings {
        PoolSettings {
            output_prefix: self.pool.output_prefix.clone(),
            pool_size: self.pool.size,
            mode_prefix: self.modes.name_prefix.clone(),
            refresh_hz: f64::from(self.modes.refresh_hz),
            auto_place: self.layout.auto_place,
        }
    }
}

/// Accepts a bare level or a comma list of directives in which every bare
/// word is a level.  `EnvFilter` alone would take `verbose` as a target name
/// and silently log nothing.
fn is_log_filter(value: &str) -> bool {
    value
        .split(',')
        .all(|d| d.contains('=') || d.trim().parse::<LevelFilter>().is_ok())
        && EnvFilter::try_new(value).is_ok()
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if neither `XDG_CONFIG_HOME`
/// nor `HOME` is set.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads and validates the configuration.
///
/// With `path` set the file must exist.  Without it the default location is
/// used, and a missing file (or an undeterminable config directory) yields
/// [`AppConfig::default`].
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors, [`ConfigError::Parse`]
/// for malformed TOML and [`ConfigError::Invalid`] for out-of-range values.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(path) => read_config(path)?,
        None => match config_file_path() {
            Ok(path) => match read_config(&path) {
                Err(ConfigError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    AppConfig::default()
                }
                other => other?,
            },
            Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
            Err(e) => return Err(e),
        },
    };
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// `$XDG_CONFIG_HOME/vdisplay`, falling back to `~/.config/vdisplay`.
fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("vdisplay"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
