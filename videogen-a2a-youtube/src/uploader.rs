//! Upload orchestration: stage Cloud Storage objects locally, then publish.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use videogen_a2a_common::{ConfigError, GcsClient, GcsError, GcsOperation, GcsUri};

use crate::error::UploadError;
use crate::youtube::{UploadedVideo, VideoMetadata, YouTubeClient};

const TEMP_PREFIX: &str = "videogen-";

/// What to upload: a Cloud Storage object or a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRef {
    Gcs(GcsUri),
    Local(PathBuf),
}

impl StorageRef {
    /// `gs://` references must name a bucket and object; anything else is a path.
    pub fn parse(s: &str) -> Result<Self, GcsError> {
        if s.starts_with("gs://") {
            let uri = GcsUri::parse(s)?;
            if uri.object.is_empty() {
                return Err(GcsError::invalid_uri(format!("URI must name an object: {}", s)));
            }
            Ok(StorageRef::Gcs(uri))
        } else {
            Ok(StorageRef::Local(PathBuf::from(s)))
        }
    }
}

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageRef::Gcs(uri) => uri.fmt(f),
            StorageRef::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

pub struct Uploader {
    youtube: YouTubeClient,
    gcs: Option<GcsClient>,
    temp_dir: Option<PathBuf>,
}

impl Uploader {
    pub fn new(youtube: YouTubeClient) -> Self {
        Self {
            youtube,
            gcs: None,
            temp_dir: None,
        }
    }

    /// Storage client used for `gs://` references.
    pub fn with_gcs(mut self, gcs: GcsClient) -> Self {
        self.gcs = Some(gcs);
        self
    }

    /// Stage downloads in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub async fn upload(
        &self,
        token: &str,
        storage_ref: &StorageRef,
        metadata: &VideoMetadata,
    ) -> Result<UploadedVideo, UploadError> {
        match storage_ref {
            StorageRef::Gcs(uri) => self.upload_from_gcs(token, uri, metadata).await,
            StorageRef::Local(path) => self.upload_file(token, path, metadata).await,
        }
    }

    pub async fn upload_file(&self, token: &str, path: &Path, metadata: &VideoMetadata) -> Result<UploadedVideo, UploadError> {
        self.youtube.upload(token, path, metadata).await
    }

    /// Download the object to a temp file and upload that.
    ///
    /// The temp file is removed whether or not the upload succeeds.
    #[instrument(level = "info", skip(self, token, metadata), fields(uri = %uri))]
    pub async fn upload_from_gcs(
        &self,
        token: &str,
        uri: &GcsUri,
        metadata: &VideoMetadata,
    ) -> Result<UploadedVideo, UploadError> {
        let gcs = self.gcs.as_ref().ok_or_else(|| {
            ConfigError::invalid_value("storage reference", format!("no storage client configured for {}", uri))
        })?;

        let staged = self.stage_file(uri)?;
        let bytes = gcs.download_to_path(uri, staged.path()).await?;
        info!(bytes, path = %staged.path().display(), "Object staged for upload");

        let result = self.youtube.upload(token, staged.path(), metadata).await;

        let path = staged.path().display().to_string();
        match staged.close() {
            Ok(()) => debug!(path = %path, "Removed staged file"),
            Err(e) => warn!(path = %path, error = %e, "Could not delete staged file"),
        }

        result
    }

    fn stage_file(&self, uri: &GcsUri) -> Result<tempfile::NamedTempFile, GcsError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(uri.extension().unwrap_or_default());

        let created = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        created.map_err(|e| {
            GcsError::operation_failed(uri.to_string(), GcsOperation::Stage, format!("Failed to create temp file: {}", e))
        })
    }
}
