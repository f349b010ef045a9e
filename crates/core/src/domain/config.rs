//! Configuration management for mixcast
//!
//! This module provides:
//! - Configuration structs for the listening socket and the mixer control
//! - TOML loading from an explicit path or the per-user default location
//! - Validation applied before anything is opened

use crate::domain::curve::{CurveError, VolumeCurve};
use crate::domain::mixer::{NativeVolume, VolumeRange};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid curve: {0}")]
    Curve(#[from] CurveError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Listening socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host name or address to bind
    pub host: String,

    /// TCP port, 0 picks a free one
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6789,
        }
    }
}

/// Which mixer implementation drives the control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// ALSA simple mixer control on a sound card
    #[default]
    Alsa,
    /// In-memory mixer, no hardware involved
    Soft,
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "alsa" => Ok(BackendKind::Alsa),
            "soft" => Ok(BackendKind::Soft),
            other => Err(ConfigError::Invalid(format!(
                "unknown backend '{other}' (expected alsa or soft)"
            ))),
        }
    }
}

/// Initial state of the in-memory mixer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftMixerConfig {
    pub min: NativeVolume,
    pub max: NativeVolume,
    pub volume: NativeVolume,
    pub switch: bool,
}

impl Default for SoftMixerConfig {
    fn default() -> Self {
        Self {
            min: 0,
            max: 65536,
            volume: 65536,
            switch: true,
        }
    }
}

/// Mixer selection, passed through to the device-open call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Card used for change notifications, e.g. `hw:0`
    pub card: String,

    /// Mixer device used for get/set, e.g. `default`
    pub device: String,

    /// Simple control name, e.g. `Master`
    pub control: String,

    pub backend: BackendKind,

    pub curve: VolumeCurve,

    pub soft: SoftMixerConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            card: "hw:0".to_string(),
            device: "default".to_string(),
            control: "Master".to_string(),
            backend: BackendKind::default(),
            curve: VolumeCurve::default(),
            soft: SoftMixerConfig::default(),
        }
    }
}

/// Complete mixcast configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mixer: MixerConfig,
}

impl AppConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Render as TOML, e.g. to print an annotated starting point
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Per-user config file location
    ///
    /// Returns `~/.config/mixcast/config.toml` on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mixcast").join("config.toml"))
    }

    /// Resolve the configuration to run with
    ///
    /// An explicit path must load. Without one, the per-user file is used
    /// when present, otherwise built-in defaults.
    #[instrument]
    pub async fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path).await;
        }

        match Self::default_path() {
            Some(path) if fs::try_exists(&path).await.unwrap_or(false) => {
                Self::load_from_file(&path).await
            }
            _ => {
                debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check the values that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host is empty".to_string()));
        }

        let mixer = &self.mixer;
        for (key, value) in [
            ("mixer.card", &mixer.card),
            ("mixer.device", &mixer.device),
            ("mixer.control", &mixer.control),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} is empty")));
            }
        }

        mixer.curve.validate()?;

        if mixer.backend == BackendKind::Soft {
            let soft = &mixer.soft;
            let range = VolumeRange::new(soft.min, soft.max)
                .map_err(|e| ConfigError::Invalid(format!("mixer.soft: {e}")))?;
            if !range.contains(soft.volume) {
                return Err(ConfigError::Invalid(format!(
                    "mixer.soft.volume {} is outside {}",
                    soft.volume, range
                )));
            }
        }

        Ok(())
    }
}
