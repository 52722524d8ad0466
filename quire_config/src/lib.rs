//! Abstraction for configuration and credential storage in the quire client.

#![warn(
    // missing_docs,
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    deprecated
)]

mod credentials;
mod error;

use getset::Getters;
use log::warn;
use serde_derive::{Deserialize, Serialize};
use std::path::PathBuf;

pub use credentials::CredentialStore;
pub use error::{ConfigError, ErrorKind};

/// Representation of the configuration file for the quire client
#[derive(Debug, Clone, Getters, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct Config {
    server_address: String,
    size_limit_bytes: u64,
}

pub(crate) fn get_config_dir() -> PathBuf {
    let dir =
        dirs::config_dir().unwrap_or_else(|| panic!("Unable to locate configuration directory"));
    dir.join("quire")
}

impl Config {
    /// Reset the configuration file to the default values, clearing any
    /// stored credentials at the same time.
    pub fn reset_config() -> Result<(), ConfigError> {
        let dir = get_config_dir();

        if !dir.exists() {
            warn!(
                "Config directory `{}` does not exist, creating it now.",
                dir.to_string_lossy()
            );
            std::fs::create_dir_all(&dir).map_err(|e| {
                ConfigError::new(
                    ErrorKind::IoError(e),
                    format!(
                        "Unable to create config directory `{}`",
                        dir.to_string_lossy()
                    ),
                )
            })?;
        }
        if !dir.is_dir() {
            return Err(ConfigError::new(ErrorKind::IsNotDirectory, format!("Config location `{}`, is not a directory. Please ensure that this provided location is a directory, then try again.", dir.to_string_lossy())));
        }

        //Generate configuration data
        let config_path = dir.join("quire.conf");

        let default_config = include_str!("../default_config.toml");

        if config_path.is_dir() {
            return Err(ConfigError::new(ErrorKind::IsDirectory, format!("Configuration file `{}`, is a directory - not a file. Please ensure the provided path is a file then try again.", config_path.to_string_lossy())));
        }

        // remove the old config file
        if config_path.exists() {
            std::fs::remove_file(&config_path).map_err(|e| {
                ConfigError::new(
                    ErrorKind::IoError(e),
                    format!(
                        "Unable to remove old configuration file `{}`",
                        config_path.to_string_lossy()
                    ),
                )
            })?;
        }

        //Write configuration data
        std::fs::write(config_path, default_config).map_err(|e| {
            ConfigError::new(
                ErrorKind::IoError(e),
                "Failed to write default configuration data to the disk.",
            )
        })?;

        // a fresh config means a fresh identity, drop any stored credentials
        CredentialStore::at(dir).clear()?;

        Ok(())
    }

    /// Point the client at a new server, preserving the rest of the
    /// configuration.
    pub fn set_hostname(hostname: &str, tls: bool) -> Result<(), ConfigError> {
        let config = Config::load_config()?;
        let config = Config {
            server_address: format!("http{}://{}", if tls { "s" } else { "" }, hostname),
            ..config
        };

        let config_path = get_config_dir().join("quire.conf");

        let config_data = toml::to_string(&config).map_err(|e| {
            ConfigError::new(
                ErrorKind::ParseError(e.to_string()),
                "Failed to serialize configuration data to TOML.",
            )
        })?;

        std::fs::write(config_path, config_data).map_err(|e| {
            ConfigError::new(
                ErrorKind::IoError(e),
                "Failed to write configuration data to disk.",
            )
        })?;

        Ok(())
    }

    pub fn exists() -> bool {
        let config_path = get_config_dir().join("quire.conf");
        config_path.exists()
    }

    /// Load the configuration from the disk. Wrap in spawn_blocking if in an
    /// async context.
    pub fn load_config() -> Result<Config, ConfigError> {
        let dir = get_config_dir();
        let config_path = dir.join("quire.conf");

        // if not exist, throw error
        if !config_path.exists() {
            return Err(ConfigError::new(
                    ErrorKind::NotFound,
                    format!(
                        "Configuration file `{}` does not exist. Please run `quire` to create a new configuration file.",
                        config_path.to_string_lossy()
                    ),
                ));
        }

        // if not file, throw error
        if !config_path.is_file() {
            return Err(ConfigError::new(
                    ErrorKind::IsDirectory,
                    format!(
                        "Configuration file `{}` is not a file. Please ensure that this provided location is a file, then try again.",
                        config_path.to_string_lossy()
                    ),
                ));
        }

        // try to load from disk
        let config_data = std::fs::read_to_string(config_path).map_err(|e| {
            ConfigError::new(
                ErrorKind::IoError(e),
                "Failed to read configuration file from disk.",
            )
        })?;

        // try to parse config
        let config: Config = toml::from_str(&config_data).map_err(|e| {
            ConfigError::new(
                ErrorKind::TomlParseError(e),
                "Failed to parse configuration file.",
            )
        })?;

        Ok(config)
    }
}
