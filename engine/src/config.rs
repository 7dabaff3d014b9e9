use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

use refine_types::{Temperature, UiOptions};

/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "REFINE_DATA_DIR";

const APP_DIR_NAME: &str = ".refine";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Contents of `~/.refine/config.toml`. Every section is optional.
///
/// ```toml
/// [app]
/// temperature = 0.7
/// ascii_only = false
///
/// [google]
/// api_base = "https://generativelanguage.googleapis.com/v1beta"
///
/// [storage]
/// data_dir = "${HOME}/.local/share/refine"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct RefineConfig {
    pub app: Option<AppConfig>,
    pub google: Option<GoogleConfig>,
    pub storage: Option<StorageConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Initial slider value; clamped into `0.0..=1.0`.
    pub temperature: Option<f32>,
    /// Use ASCII-only glyphs for icons and spinners.
    #[serde(default)]
    pub ascii_only: bool,
    /// Enable a high-contrast color palette.
    #[serde(default)]
    pub high_contrast: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleConfig {
    /// Alternate REST endpoint. `${VAR}` references are expanded.
    pub api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Where `user_config.json` and `history.json` live. `${VAR}` references are expanded.
    pub data_dir: Option<String>,
}

/// Expand `${VAR}` references. Unset variables become empty; an unclosed `${` is kept.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl RefineConfig {
    /// Load the config file. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn temperature(&self) -> Temperature {
        self.app
            .as_ref()
            .and_then(|app| app.temperature)
            .map_or(Temperature::DEFAULT, Temperature::clamped)
    }

    #[must_use]
    pub fn ui_options(&self) -> UiOptions {
        let app = self.app.as_ref();
        UiOptions {
            ascii_only: app.is_some_and(|cfg| cfg.ascii_only),
            high_contrast: app.is_some_and(|cfg| cfg.high_contrast),
        }
    }

    #[must_use]
    pub fn api_base(&self) -> Option<String> {
        self.google
            .as_ref()
            .and_then(|google| google.api_base.as_deref())
            .map(expand_env_vars)
            .map(|base| base.trim().to_string())
            .filter(|base| !base.is_empty())
    }

    /// Resolve the data directory: `REFINE_DATA_DIR`, then `[storage] data_dir`,
    /// then `~/.refine`, then `./.refine`.
    #[must_use]
    pub fn data_dir(&self) -> DataDir {
        let from_env = env::var(DATA_DIR_ENV).ok();
        let from_config = self
            .storage
            .as_ref()
            .and_then(|storage| storage.data_dir.as_deref())
            .map(expand_env_vars);
        resolve_data_dir(from_env, from_config, dirs::home_dir())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirSource {
    /// Set through `REFINE_DATA_DIR` or the config file.
    Configured,
    /// `~/.refine`.
    Home,
    /// No home directory; relative to the working directory.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    pub path: PathBuf,
    pub source: DataDirSource,
}

impl DataDir {
    #[must_use]
    pub fn join(&self, child: &str) -> PathBuf {
        self.path.join(child)
    }
}

fn resolve_data_dir(
    from_env: Option<String>,
    from_config: Option<String>,
    home: Option<PathBuf>,
) -> DataDir {
    let configured = [from_env, from_config]
        .into_iter()
        .flatten()
        .map(|raw| raw.trim().to_string())
        .find(|raw| !raw.is_empty());

    if let Some(raw) = configured {
        return DataDir {
            path: PathBuf::from(raw),
            source: DataDirSource::Configured,
        };
    }

    match home {
        Some(home) => DataDir {
            path: home.join(APP_DIR_NAME),
            source: DataDirSource::Home,
        },
        None => DataDir {
            path: PathBuf::from(".").join(APP_DIR_NAME),
            source: DataDirSource::Fallback,
        },
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
