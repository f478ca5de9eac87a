//! Bridge configuration loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pattern::DEFAULT_SEARCH_LIMIT;

/// Tunables of the bridge. Every field has a default, so an empty file is a
/// valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Canonical labeling settings.
    pub canonical: CanonicalConfig,
    /// Explain output settings.
    pub explain: ExplainConfig,
}

/// Settings of the canonical labeling search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalConfig {
    /// Leaves explored by the tie-break search before the best labeling found
    /// so far is kept.
    pub search_limit: usize,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Settings of explain rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Replace literal-bearing explain properties with a placeholder.
    pub redact_literals: bool,
}

impl BridgeConfig {
    /// Loads `explicit`, or the platform config file when no path is given.
    ///
    /// A missing file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(default_config_path);
        match path {
            Some(path) if path.exists() => read_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses a configuration from TOML text; `origin` names it in errors.
    pub fn from_toml(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }
}

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read bridge config {}: {source}", path.display())]
    Read {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has fields of the wrong type.
    #[error("failed to parse bridge config {}: {source}", path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
}

/// `<config dir>/pattern-bridge/config.toml`, when the platform has a config
/// directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("pattern-bridge").join("config.toml"))
}

fn read_file(path: &Path) -> Result<BridgeConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    BridgeConfig::from_toml(&contents, path)
}
