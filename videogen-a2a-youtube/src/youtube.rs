//! YouTube Data API v3 resumable upload client.

use std::path::Path;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::UploadError;

/// Public root of the YouTube upload endpoint.
pub const YOUTUBE_BASE_URL: &str = "https://www.googleapis.com";

const UPLOAD_PATH: &str = "/upload/youtube/v3/videos";

/// Who can see an uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Public,
    Unlisted,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
        }
    }
}

impl std::str::FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(PrivacyStatus::Private),
            "public" => Ok(PrivacyStatus::Public),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            other => Err(format!("expected private, public or unlisted, got '{}'", other)),
        }
    }
}

impl std::fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snippet and status of a video resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    privacy_status: PrivacyStatus,
}

#[derive(Serialize)]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status,
}

impl VideoMetadata {
    fn resource(&self) -> VideoResource<'_> {
        VideoResource {
            snippet: Snippet {
                title: &self.title,
                description: &self.description,
                tags: &self.tags,
                category_id: &self.category_id,
            },
            status: Status {
                privacy_status: self.privacy_status,
            },
        }
    }
}

/// The video resource returned after upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedVideo {
    pub id: String,
}

/// MIME type sent with the upload, from the file extension.
pub fn video_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self::with_base_url(YOUTUBE_BASE_URL)
    }

    /// Client against a custom API root.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Upload a local file as a new video.
    ///
    /// Opens a resumable session with the metadata, then streams the file
    /// in a single request.
    ///
    /// # Errors
    /// `UploadError::ReadFile` if the file cannot be read, `UploadError::Api`
    /// for a transport failure (status 0) or a non-success response.
    #[instrument(level = "info", skip(self, token, metadata), fields(path = %path.display(), title = %metadata.title))]
    pub async fn upload(&self, token: &str, path: &Path, metadata: &VideoMetadata) -> Result<UploadedVideo, UploadError> {
        let read_error = |source| UploadError::ReadFile {
            path: path.display().to_string(),
            source,
        };
        let file = tokio::fs::File::open(path).await.map_err(read_error)?;
        let length = file.metadata().await.map_err(read_error)?.len();
        let mime_type = video_mime_type(path);
        let endpoint = format!("{}{}", self.base_url, UPLOAD_PATH);

        debug!(bytes = length, mime_type, "Opening resumable upload session");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token)
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", length)
            .json(&metadata.resource())
            .send()
            .await
            .map_err(|e| UploadError::api(&endpoint, 0, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::api(&endpoint, status.as_u16(), body));
        }

        let session_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(UploadError::MissingSessionUrl)?;

        debug!("Sending video bytes");
        let response = self
            .http
            .put(&session_url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, mime_type)
            .header(CONTENT_LENGTH, length)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .map_err(|e| UploadError::api(&session_url, 0, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::api(&session_url, status.as_u16(), body));
        }

        let video: UploadedVideo = response
            .json()
            .await
            .map_err(|e| UploadError::api(&session_url, status.as_u16(), format!("Failed to parse response: {}", e)))?;

        info!(video_id = %video.id, "Video uploaded");
        Ok(video)
    }
}
