//! Errors raised while uploading a video.

use thiserror::Error;
use videogen_a2a_common::{AuthError, ConfigError, GcsError};

/// Upload failures.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Gcs(#[from] GcsError),

    /// The YouTube API rejected a request
    #[error("YouTube API error for {endpoint} (HTTP {status_code}): {message}")]
    Api {
        endpoint: String,
        status_code: u16,
        message: String,
    },

    /// The resumable session was created without a `Location` header
    #[error("YouTube did not return an upload session URL")]
    MissingSessionUrl,

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    pub fn api(endpoint: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        UploadError::Api {
            endpoint: endpoint.into(),
            status_code,
            message: message.into(),
        }
    }
}
