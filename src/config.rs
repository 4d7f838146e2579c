use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::analyzer::silence::DEFAULT_SILENCE_THRESHOLD_DBFS;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder to build sessions from when none is given on the command line.
    pub music_dir: Option<PathBuf>,
    /// Where the catalog, history and playlist documents live (overrides XDG default).
    pub state_dir: Option<PathBuf>,
    /// Loudness at or below this level counts as silence.
    pub silence_threshold_dbfs: f64,
    pub transition: TransitionConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            music_dir: None,
            state_dir: None,
            silence_threshold_dbfs: DEFAULT_SILENCE_THRESHOLD_DBFS,
            transition: TransitionConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Crossfade bounds used by the transition planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub min_crossfade_secs: f64,
    pub max_crossfade_secs: f64,
    /// Used when neither track has measurable silence at the seam.
    pub default_crossfade_secs: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            min_crossfade_secs: 2.0,
            max_crossfade_secs: 20.0,
            default_crossfade_secs: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Also keep tracks of the previous, not yet finished playlist out of a new session.
    pub exclude_pending: bool,
}

impl AppConfig {
    /// Load config from `~/.config/beatwalk/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default state directory using XDG data directory.
pub fn default_state_dir() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        dirs.data_dir().to_path_buf()
    } else {
        // Fallback: current directory
        PathBuf::from(".beatwalk")
    }
}
