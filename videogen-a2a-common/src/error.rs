//! Error types shared by the A2A host and the YouTube uploader.
//!
//! - `ConfigError`: invalid configuration values
//! - `GcsError`: Google Cloud Storage operations and URI parsing
//! - `AuthError`: credential discovery, OAuth authorization and token refresh

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable or argument has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl ConfigError {
    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }
}

/// GCS operation type for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcsOperation {
    /// Fetching object bytes from the storage API
    Download,
    /// Writing downloaded bytes to local storage
    Stage,
}

impl std::fmt::Display for GcsOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GcsOperation::Download => write!(f, "download"),
            GcsOperation::Stage => write!(f, "stage"),
        }
    }
}

/// GCS operation errors.
#[derive(Debug, Error)]
pub enum GcsError {
    /// The GCS URI format is invalid
    #[error("Invalid GCS URI: {0}")]
    InvalidUri(String),

    /// A GCS operation failed with context about the URI and operation type
    #[error("GCS {operation} failed for {uri}: {message}")]
    OperationFailed {
        /// The GCS URI that was being accessed
        uri: String,
        /// The type of operation that failed
        operation: GcsOperation,
        /// Error message describing the failure
        message: String,
    },

    /// Authentication error during GCS operation
    #[error("GCS authentication error: {0}")]
    AuthError(String),
}

impl GcsError {
    /// Create a new invalid URI error.
    pub fn invalid_uri(uri: impl Into<String>) -> Self {
        GcsError::InvalidUri(uri.into())
    }

    /// Create a new operation failed error with full context.
    ///
    /// # Example
    ///
    /// ```
    /// use videogen_a2a_common::error::{GcsError, GcsOperation};
    ///
    /// let err = GcsError::operation_failed(
    ///     "gs://my-bucket/videos/fox.mp4",
    ///     GcsOperation::Download,
    ///     "Permission denied"
    /// );
    /// assert!(err.to_string().contains("gs://my-bucket"));
    /// assert!(err.to_string().contains("download"));
    /// ```
    pub fn operation_failed(
        uri: impl Into<String>,
        operation: GcsOperation,
        message: impl Into<String>,
    ) -> Self {
        GcsError::OperationFailed {
            uri: uri.into(),
            operation,
            message: message.into(),
        }
    }

    /// Create a new authentication error.
    pub fn auth_error(message: impl Into<String>) -> Self {
        GcsError::AuthError(message.into())
    }
}

/// Authentication errors.
///
/// Covers Application Default Credentials used for storage access and the
/// OAuth installed-app flow used for the YouTube upload.
#[derive(Debug, Error)]
pub enum AuthError {
    /// ADC is not configured
    #[error("ADC not configured. Run 'gcloud auth application-default login' or set GOOGLE_APPLICATION_CREDENTIALS")]
    NotConfigured,

    /// Token refresh failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Interactive authorization did not produce a token
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// The OAuth client secrets file is missing or malformed
    #[error("Invalid OAuth client secrets at {path}: {message}")]
    ClientSecrets {
        /// Path of the client secrets file
        path: String,
        /// What was wrong with it
        message: String,
    },

    /// The token cache could not be read or written
    #[error("Token cache error at {path}: {message}")]
    TokenCache {
        /// Path of the token cache file
        path: String,
        /// What went wrong
        message: String,
    },
}

impl AuthError {
    /// Create a new token refresh failed error.
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        AuthError::RefreshFailed(message.into())
    }

    /// Create a new authorization failed error.
    pub fn authorization_failed(message: impl Into<String>) -> Self {
        AuthError::AuthorizationFailed(message.into())
    }

    /// Create a new client secrets error.
    pub fn client_secrets(path: impl Into<String>, message: impl Into<String>) -> Self {
        AuthError::ClientSecrets {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new token cache error.
    pub fn token_cache(path: impl Into<String>, message: impl Into<String>) -> Self {
        AuthError::TokenCache {
            path: path.into(),
            message: message.into(),
        }
    }
}
