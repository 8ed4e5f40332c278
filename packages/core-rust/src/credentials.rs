//! Sharing profile: the static credential record used for every exchange.
//!
//! The profile is a small JSON document handed out by the data provider.
//! Field names follow the provider's wire format (`camelCase`); absent fields
//! fall back to empty/zero values so that structural decoding is the only
//! check performed at load time.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Relative path the CLI reads the profile from unless told otherwise.
pub const DEFAULT_PROFILE_PATH: &str = "config/config.share";

/// Errors raised while loading or checking a sharing profile.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("profile is missing required field `{field}`")]
    MissingField { field: &'static str },
}

/// Credential record loaded from a sharing profile.
///
/// Immutable once loaded and never written back to disk.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialRecord {
    /// Profile format version.
    #[serde(rename = "shareCredentialsVersion")]
    pub protocol_version: i64,
    /// Bearer token forwarded on every exchange.
    #[serde(rename = "bearerToken")]
    pub bearer_token: String,
    /// Base URL of the sharing server.
    pub endpoint: String,
    /// Token expiry as provided by the server. Informational only.
    #[serde(rename = "expirationTime")]
    pub expires_at: String,
}

impl CredentialRecord {
    /// Reads and decodes the profile at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if its contents are not a JSON object of the
    /// expected shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let record: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            path = %path.display(),
            version = record.protocol_version,
            endpoint = %record.endpoint,
            "loaded sharing profile"
        );
        Ok(record)
    }

    /// Checks that the fields needed for an exchange are populated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the first empty field.
    pub fn ensure_usable(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "endpoint" });
        }
        if self.bearer_token.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "bearerToken",
            });
        }
        Ok(())
    }
}

// The token must not end up in logs.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("protocol_version", &self.protocol_version)
            .field("bearer_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
