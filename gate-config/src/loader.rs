//! Configuration loader implementations.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::schema::GovernanceSettings;
use crate::{ConfigError, ConfigResult};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "GOVERNANCE_CONFIG";

/// Source document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Infers the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Parses and validates a configuration document.
///
/// # Errors
///
/// Returns a parse error for malformed documents, or the validation error of
/// the first invalid section.
pub fn parse(contents: &str, format: ConfigFormat) -> ConfigResult<GovernanceSettings> {
    let settings: GovernanceSettings = match format {
        ConfigFormat::Json => serde_json::from_str(contents)?,
        ConfigFormat::Toml => toml::from_str(contents)?,
    };
    settings.validate()?;
    Ok(settings)
}

/// Loads `path`, returning `None` when the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for unreadable files and parse or validation
/// errors for invalid ones.
pub async fn load_from_path(path: &Path) -> ConfigResult<Option<GovernanceSettings>> {
    let format = ConfigFormat::from_path(path)?;
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "configuration file not found");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let settings = parse(&contents, format)?;
    info!(path = %path.display(), ?format, "governance configuration loaded");
    Ok(Some(settings))
}

/// Loads `path`, or the file named by [`CONFIG_ENV`] when `path` is `None`.
/// Falls back to defaults when neither names an existing file.
///
/// # Errors
///
/// Same as [`load_from_path`].
pub async fn load_or_default(path: Option<&Path>) -> ConfigResult<GovernanceSettings> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::var_os(CONFIG_ENV).map(PathBuf::from),
    };
    let Some(path) = path else {
        debug!("no governance configuration named, using defaults");
        return Ok(GovernanceSettings::default());
    };
    Ok(load_from_path(&path).await?.unwrap_or_default())
}
