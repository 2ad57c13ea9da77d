use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::database::ViewKind;

/// Errors that can occur while loading a [`DatabaseConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Database-wide settings.
///
/// ```toml
/// implementation_view = "schematic"
/// symbol_view = "symbol"
/// user_units = 160
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// View a cell's implementation resolves to when building a hierarchy.
    pub implementation_view: ViewKind,
    /// View used as the graphical symbol of a cell.
    pub symbol_view: ViewKind,
    /// Database units per user unit, stored as `uu` on new diagrams.
    pub user_units: i64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            implementation_view: ViewKind::Schematic,
            symbol_view: ViewKind::Symbol,
            user_units: 160,
        }
    }
}

impl DatabaseConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        log::debug!("Loading database config from {}", path.display());
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }
}
