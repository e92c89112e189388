//! Persisted user settings (library location).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::config_dir;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub library_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            library_path: default_library_path(),
        }
    }
}

pub fn default_library_path() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join("Documents").join("PDF_Library")
}

pub fn default_settings_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("PAGESCROLL_SETTINGS_PATH")
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    config_dir().map(|dir| dir.join("settings.json"))
}

/// JSON-backed settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> AppResult<Self> {
        default_settings_path()
            .map(Self::new)
            .ok_or_else(|| AppError::unsupported("no location available for the settings file"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored settings, falling back to defaults when the file
    /// does not exist yet.
    pub fn load(&self) -> AppResult<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| {
            AppError::io_with_context(
                source,
                format!("failed to read settings: {}", self.path.display()),
            )
        })?;
        serde_json::from_str(&raw).map_err(|source| {
            AppError::invalid_argument(format!(
                "failed to parse settings {}: {source}",
                self.path.display()
            ))
        })
    }

    pub fn save(&self, settings: &Settings) -> AppResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| {
                AppError::io_with_context(
                    source,
                    format!("failed to create settings directory: {}", parent.display()),
                )
            })?;
        }
        let raw = serde_json::to_string_pretty(settings).map_err(|source| {
            AppError::invalid_argument(format!("failed to encode settings: {source}"))
        })?;
        fs::write(&self.path, raw).map_err(|source| {
            AppError::io_with_context(
                source,
                format!("failed to write settings: {}", self.path.display()),
            )
        })
    }

    pub fn library_path(&self) -> AppResult<PathBuf> {
        self.load().map(|settings| settings.library_path)
    }

    pub fn set_library_path(&self, library_path: impl Into<PathBuf>) -> AppResult<()> {
        let mut settings = self.load()?;
        settings.library_path = library_path.into();
        self.save(&settings)
    }
}
