//! Application settings
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `NARRATE_*` environment variables (double-underscore separator, e.g.
//! `NARRATE__PIPELINE__WORKERS=4`).

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use narrate_core::playback::{MAX_SPEED, MIN_SPEED};
use narrate_pipeline::{DEFAULT_TARGET_WORDS, DEFAULT_WORKER_COUNT};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid setting {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.pipeline.workers == 0 {
            return Err(SettingsError::InvalidValue {
                field: "pipeline.workers".to_string(),
                message: "at least one worker is required".to_string(),
            });
        }
        if self.pipeline.target_words == 0 {
            return Err(SettingsError::InvalidValue {
                field: "pipeline.target_words".to_string(),
                message: "target words must be positive".to_string(),
            });
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.pipeline.speed) {
            return Err(SettingsError::InvalidValue {
                field: "pipeline.speed".to_string(),
                message: format!("speed must be between {MIN_SPEED} and {MAX_SPEED}"),
            });
        }
        if self.playback.volume > 100 {
            return Err(SettingsError::InvalidValue {
                field: "playback.volume".to_string(),
                message: "volume must be 0-100".to_string(),
            });
        }
        if !matches!(self.engine.backend.as_str(), "stub" | "piper") {
            return Err(SettingsError::InvalidValue {
                field: "engine.backend".to_string(),
                message: format!("unknown backend '{}'", self.engine.backend),
            });
        }
        Ok(())
    }
}

/// Chunking and synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_target_words")]
    pub target_words: usize,

    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_workers() -> usize {
    DEFAULT_WORKER_COUNT
}
fn default_target_words() -> usize {
    DEFAULT_TARGET_WORDS
}
fn default_speed() -> f32 {
    1.0
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            target_words: default_target_words(),
            speed: default_speed(),
        }
    }
}

/// Synthesis engine backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// `stub` or `piper`
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Piper server base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Voice name passed to the engine
    #[serde(default)]
    pub voice: Option<String>,
}

fn default_backend() -> String {
    "piper".to_string()
}
fn default_endpoint() -> String {
    "http://127.0.0.1:5000".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: default_endpoint(),
            voice: None,
        }
    }
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Output volume (0-100)
    #[serde(default = "default_volume")]
    pub volume: u8,

    /// Interactive keyboard controls
    #[serde(default = "default_true")]
    pub keyboard: bool,
}

fn default_volume() -> u8 {
    80
}
fn default_true() -> bool {
    true
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            keyboard: default_true(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Load settings from an optional file and the environment
///
/// Priority (highest to lowest):
/// 1. `NARRATE` environment variables
/// 2. The given TOML file (or `narrate.toml` in the working directory)
/// 3. Built-in defaults
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let mut builder = Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        None => {
            builder = builder.add_source(
                File::with_name("narrate")
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("NARRATE")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.pipeline.workers, 2);
        assert_eq!(settings.playback.volume, 80);
        assert_eq!(settings.engine.backend, "piper");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.pipeline.speed = 3.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.pipeline.workers = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.playback.volume = 130;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.engine.backend = "espeak".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[pipeline]\nworkers = 4\ntarget_words = 60\n\n[engine]\nbackend = \"stub\"\n"
        )
        .unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.pipeline.workers, 4);
        assert_eq!(settings.pipeline.target_words, 60);
        assert_eq!(settings.engine.backend, "stub");
        // Untouched sections keep their defaults
        assert_eq!(settings.playback.volume, 80);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = load_settings(Some(Path::new("/nonexistent/narrate.toml")));
        assert!(result.is_err());
    }
}
