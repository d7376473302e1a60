//! Uploader configuration from environment variables.

use std::path::PathBuf;

use videogen_a2a_common::ConfigError;

use crate::youtube::PrivacyStatus;

pub const CLIENT_SECRETS_ENV: &str = "YOUTUBE_CLIENT_SECRETS";
pub const TOKEN_CACHE_ENV: &str = "YOUTUBE_TOKEN_CACHE";
pub const PRIVACY_STATUS_ENV: &str = "YOUTUBE_PRIVACY_STATUS";
pub const CATEGORY_ID_ENV: &str = "YOUTUBE_CATEGORY_ID";
pub const TEMP_DIR_ENV: &str = "VIDEOGEN_TEMP_DIR";

pub const DEFAULT_CLIENT_SECRETS: &str = "credentials.json";
pub const DEFAULT_TOKEN_CACHE: &str = "token.json";
/// "People & Blogs"
pub const DEFAULT_CATEGORY_ID: &str = "22";

/// Settings for one upload run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub client_secrets: PathBuf,
    pub token_cache: PathBuf,
    pub privacy_status: PrivacyStatus,
    pub category_id: String,
    /// Staging directory for downloaded objects; the system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            client_secrets: PathBuf::from(DEFAULT_CLIENT_SECRETS),
            token_cache: PathBuf::from(DEFAULT_TOKEN_CACHE),
            privacy_status: PrivacyStatus::Private,
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            temp_dir: None,
        }
    }
}

impl UploadConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for an unknown privacy status or a
    /// non-numeric category.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let privacy_status = match get(PRIVACY_STATUS_ENV) {
            Some(value) => value
                .parse::<PrivacyStatus>()
                .map_err(|e| ConfigError::invalid_value(PRIVACY_STATUS_ENV, e))?,
            None => defaults.privacy_status,
        };

        let category_id = match get(CATEGORY_ID_ENV) {
            Some(value) if value.chars().all(|c| c.is_ascii_digit()) => value,
            Some(value) => {
                return Err(ConfigError::invalid_value(
                    CATEGORY_ID_ENV,
                    format!("expected a numeric category id, got '{}'", value),
                ));
            }
            None => defaults.category_id,
        };

        Ok(Self {
            client_secrets: get(CLIENT_SECRETS_ENV).map(PathBuf::from).unwrap_or(defaults.client_secrets),
            token_cache: get(TOKEN_CACHE_ENV).map(PathBuf::from).unwrap_or(defaults.token_cache),
            privacy_status,
            category_id,
            temp_dir: get(TEMP_DIR_ENV).map(PathBuf::from),
        })
    }
}
