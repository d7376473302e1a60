//! Google Cloud Storage utilities.

use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::auth::{AuthProvider, scopes};
use crate::error::{GcsError, GcsOperation};

/// Public endpoint of the Cloud Storage JSON and XML APIs.
pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";

/// Parsed GCS URI components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GcsUri {
    /// Bucket name
    pub bucket: String,
    /// Object path within the bucket
    pub object: String,
}

impl GcsUri {
    /// Parse a `gs://bucket/path` URI into components.
    ///
    /// # Errors
    /// Returns `GcsError::InvalidUri` if the URI format is invalid.
    pub fn parse(uri: &str) -> Result<Self, GcsError> {
        let uri = uri
            .strip_prefix("gs://")
            .ok_or_else(|| GcsError::InvalidUri(format!("URI must start with 'gs://': {}", uri)))?;

        let (bucket, object) = uri
            .split_once('/')
            .ok_or_else(|| GcsError::InvalidUri(format!("URI must contain bucket and path: {}", uri)))?;

        if bucket.is_empty() {
            return Err(GcsError::InvalidUri("Bucket name cannot be empty".to_string()));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }

    /// Extension of the object name including the leading dot, if any.
    pub fn extension(&self) -> Option<&str> {
        let name = self.object.rsplit('/').next()?;
        let dot = name.rfind('.')?;
        if dot == 0 {
            return None;
        }
        Some(&name[dot..])
    }
}

impl std::fmt::Display for GcsUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

/// GCS operations client.
pub struct GcsClient {
    client: reqwest::Client,
    auth: AuthProvider,
    /// Base URL for GCS API (configurable for testing)
    base_url: String,
}

impl GcsClient {
    /// Create a new GCS client using Application Default Credentials.
    ///
    /// # Errors
    /// Returns `GcsError::AuthError` if authentication setup fails.
    pub async fn new() -> Result<Self, GcsError> {
        let auth = AuthProvider::new()
            .await
            .map_err(|e| GcsError::auth_error(e.to_string()))?;

        Ok(Self::with_auth(auth))
    }

    /// Create a new GCS client with a provided auth provider.
    pub fn with_auth(auth: AuthProvider) -> Self {
        Self::with_base_url(auth, STORAGE_BASE_URL.to_string())
    }

    /// Create a new GCS client against a custom API root.
    pub fn with_base_url(auth: AuthProvider, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            base_url,
        }
    }

    /// Stream an object into a local file, returning the number of bytes written.
    ///
    /// The file at `dest` is created or truncated. On error it may hold a
    /// partial object; cleaning it up is the caller's job.
    ///
    /// # Errors
    /// Returns `GcsError::OperationFailed` if the download or the local write fails.
    #[instrument(level = "debug", skip(self, dest), fields(uri = %uri))]
    pub async fn download_to_path(&self, uri: &GcsUri, dest: &Path) -> Result<u64, GcsError> {
        let token = self
            .auth
            .get_token(&[scopes::DEVSTORAGE_READ_ONLY])
            .await
            .map_err(|e| GcsError::auth_error(e.to_string()))?;

        let url = format!(
            "{}/storage/v1/b/{}/o/{}?alt=media",
            self.base_url,
            uri.bucket,
            urlencoding::encode(&uri.object)
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| GcsError::OperationFailed {
                uri: uri.to_string(),
                operation: GcsOperation::Download,
                message: format!("Download request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GcsError::OperationFailed {
                uri: uri.to_string(),
                operation: GcsOperation::Download,
                message: format!("Failed with status {}: {}", status, body),
            });
        }

        let stage_error = |e: std::io::Error| GcsError::OperationFailed {
            uri: uri.to_string(),
            operation: GcsOperation::Stage,
            message: format!("Failed to write {}: {}", dest.display(), e),
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(stage_error)?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| GcsError::OperationFailed {
                uri: uri.to_string(),
                operation: GcsOperation::Download,
                message: format!("Failed to read response body: {}", e),
            })?;
            file.write_all(&chunk).await.map_err(stage_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(stage_error)?;

        debug!(bytes = written, path = %dest.display(), "Object staged");
        Ok(written)
    }
}
