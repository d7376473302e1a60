//! Authentication module using Application Default Credentials.
//!
//! Storage downloads authenticate with ADC (Application Default Credentials):
//! - Service account credentials via `GOOGLE_APPLICATION_CREDENTIALS` environment variable
//! - User credentials from `gcloud auth application-default login`
//! - GCE metadata server for workloads running on Google Cloud
//! - gcloud CLI fallback
//!
//! A pre-issued access token can be supplied instead with
//! [`AuthProvider::from_token`].

use std::sync::Arc;

use gcp_auth::TokenProvider;
use tracing::{debug, instrument};

use crate::error::AuthError;

/// Environment variable holding a pre-issued access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Internal token source abstraction.
enum TokenSource {
    /// Production token provider from gcp_auth
    Provider(Arc<dyn TokenProvider>),
    /// Fixed token handed in by the caller
    Static(String),
}

/// Authentication provider for Google Cloud APIs.
///
/// Wraps the `gcp_auth` crate to provide automatic credential discovery and token refresh.
pub struct AuthProvider {
    source: TokenSource,
}

impl AuthProvider {
    /// Create a new auth provider using Application Default Credentials.
    ///
    /// If [`ACCESS_TOKEN_ENV`] is set its value is used verbatim and no
    /// credential discovery happens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotConfigured` if no valid credentials can be found.
    #[instrument(level = "debug", name = "auth_provider_new")]
    pub async fn new() -> Result<Self, AuthError> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            debug!("Using access token from {}", ACCESS_TOKEN_ENV);
            return Ok(Self::from_token(token));
        }

        debug!("Initializing AuthProvider with ADC");

        let provider = gcp_auth::provider().await.map_err(|e| {
            debug!("Failed to initialize ADC: {}", e);
            AuthError::NotConfigured
        })?;

        debug!("AuthProvider initialized successfully");
        Ok(Self {
            source: TokenSource::Provider(provider),
        })
    }

    /// Create a provider that always returns the given token.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
        }
    }

    /// Get a valid access token for the specified scopes.
    ///
    /// Tokens are cached by `gcp_auth` and refreshed automatically when they expire.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RefreshFailed` if the token cannot be obtained or refreshed.
    #[instrument(level = "debug", name = "get_token", skip(self))]
    pub async fn get_token(&self, scopes: &[&str]) -> Result<String, AuthError> {
        debug!(?scopes, "Requesting token");

        match &self.source {
            TokenSource::Provider(provider) => {
                let token = provider.token(scopes).await.map_err(|e| {
                    debug!("Token refresh failed: {}", e);
                    AuthError::RefreshFailed(e.to_string())
                })?;

                debug!("Token obtained successfully");
                Ok(token.as_str().to_string())
            }
            TokenSource::Static(token) => Ok(token.clone()),
        }
    }
}

/// Common OAuth2 scopes for Google APIs.
pub mod scopes {
    /// Read-only access to Google Cloud Storage.
    pub const DEVSTORAGE_READ_ONLY: &str = "https://www.googleapis.com/auth/devstorage.read_only";

    /// Upload videos to a YouTube channel.
    pub const YOUTUBE_UPLOAD: &str = "https://www.googleapis.com/auth/youtube.upload";
}
