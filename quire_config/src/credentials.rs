//! Durable storage for the issued bearer token and the authenticated
//! account's profile.
//!
//! The pair lives in two files next to the configuration: `token` holds the
//! opaque bearer string, `user.json` the serialized profile. The two are
//! written by one call and removed by one call; a half-pair found on disk is
//! treated as no credentials at all and the orphan file is cleaned up.

use std::path::{Path, PathBuf};

use log::warn;
use quire_access::{StoredCredentials, User};

use crate::error::{ConfigError, ErrorKind};
use crate::get_config_dir;

const TOKEN_FILE: &str = "token";
const USER_FILE: &str = "user.json";

/// Reads and writes the persisted credential pair
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    /// A store rooted at the standard configuration directory
    pub fn open() -> CredentialStore {
        CredentialStore::at(get_config_dir())
    }

    /// A store rooted at an arbitrary directory
    pub fn at<P: Into<PathBuf>>(dir: P) -> CredentialStore {
        CredentialStore { dir: dir.into() }
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    fn user_path(&self) -> PathBuf {
        self.dir.join(USER_FILE)
    }

    /// Persist a credential pair, replacing any previous one. The profile is
    /// written first and removed again if the token write fails, so the disk
    /// never holds a token without its profile.
    pub fn save(&self, token: &str, user: &User) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            ConfigError::new(
                ErrorKind::IoError(e),
                format!(
                    "Unable to create credential directory `{}`",
                    self.dir.to_string_lossy()
                ),
            )
        })?;

        let profile = serde_json::to_vec(user).map_err(|e| {
            ConfigError::new(
                ErrorKind::JsonError(e),
                "Failed to serialize the user profile.",
            )
        })?;

        std::fs::write(self.user_path(), profile).map_err(|e| {
            ConfigError::new(
                ErrorKind::IoError(e),
                "Failed to write the user profile to disk.",
            )
        })?;

        if let Err(e) = std::fs::write(self.token_path(), token) {
            remove_if_present(&self.user_path());
            return Err(ConfigError::new(
                ErrorKind::IoError(e),
                "Failed to write the session token to disk.",
            ));
        }

        Ok(())
    }

    /// Load the persisted credential pair, if a complete one exists.
    pub fn load(&self) -> Result<Option<StoredCredentials>, ConfigError> {
        let token_path = self.token_path();
        let user_path = self.user_path();

        match (token_path.is_file(), user_path.is_file()) {
            (true, true) => {}
            (false, false) => return Ok(None),
            // a half-written pair is as good as no credentials, drop the orphan
            (true, false) => {
                warn!("Found a session token without a profile, discarding it.");
                remove_if_present(&token_path);
                return Ok(None);
            }
            (false, true) => {
                warn!("Found a profile without a session token, discarding it.");
                remove_if_present(&user_path);
                return Ok(None);
            }
        }

        let token = std::fs::read_to_string(&token_path).map_err(|e| {
            ConfigError::new(
                ErrorKind::IoError(e),
                "Failed to read the session token from disk.",
            )
        })?;

        let profile = std::fs::read(&user_path).map_err(|e| {
            ConfigError::new(
                ErrorKind::IoError(e),
                "Failed to read the user profile from disk.",
            )
        })?;

        let user: User = serde_json::from_slice(&profile).map_err(|e| {
            ConfigError::new(
                ErrorKind::JsonError(e),
                "Failed to parse the stored user profile.",
            )
        })?;

        Ok(Some(StoredCredentials {
            token: token.trim().to_owned(),
            user,
        }))
    }

    /// Remove the persisted credential pair. Safe to call when none exists.
    pub fn clear(&self) -> Result<(), ConfigError> {
        remove_if_present(&self.token_path());
        remove_if_present(&self.user_path());
        Ok(())
    }
}

fn remove_if_present(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove `{}`: {}", path.to_string_lossy(), e);
        }
    }
}
