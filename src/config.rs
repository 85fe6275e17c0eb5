//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "RINK_BOARD_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Recompute loop interval, milliseconds.
    pub tick_interval_ms: u64,
    /// Directory for the local snapshot cache.
    pub cache_dir: PathBuf,
    /// Location of the per-device game history file.
    pub history_path: PathBuf,
    /// Directory holding the optional alarm clip files.
    pub sounds_dir: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in
    /// defaults on any failure.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            cache_dir: PathBuf::from(".rink-board/cache"),
            history_path: PathBuf::from(".rink-board/history.json"),
            sounds_dir: PathBuf::from("sounds"),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    tick_interval_ms: Option<u64>,
    cache_dir: Option<PathBuf>,
    history_path: Option<PathBuf>,
    sounds_dir: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            tick_interval_ms: raw.tick_interval_ms.unwrap_or(defaults.tick_interval_ms),
            cache_dir: raw.cache_dir.unwrap_or(defaults.cache_dir),
            history_path: raw.history_path.unwrap_or(defaults.history_path),
            sounds_dir: raw.sounds_dir.unwrap_or(defaults.sounds_dir),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
