//! Upload pipeline tests against mocked Cloud Storage and YouTube endpoints.

use tempfile::TempDir;
use videogen_a2a_common::GcsClient;
use videogen_a2a_common::auth::AuthProvider;
use videogen_a2a_youtube::{PrivacyStatus, StorageRef, UploadError, Uploader, VideoMetadata, YouTubeClient};
use wiremock::matchers::{body_bytes, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake video bytes";

fn metadata() -> VideoMetadata {
    VideoMetadata {
        title: "AI Generated Video: three foxes...".to_string(),
        description: "Video generated from user prompt: three foxes".to_string(),
        tags: vec!["AI".to_string(), "generated".to_string()],
        category_id: "22".to_string(),
        privacy_status: PrivacyStatus::Private,
    }
}

async fn mount_storage(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/videos-bucket/o/fox.mp4"))
        .and(query_param("alt", "media"))
        .and(header("authorization", "Bearer storage-token"))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(VIDEO))
        .mount(server)
        .await;
}

async fn mount_youtube(server: &MockServer, upload_status: u16) {
    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .and(query_param("uploadType", "resumable"))
        .and(query_param("part", "snippet,status"))
        .and(header("authorization", "Bearer yt-token"))
        .and(header("x-upload-content-type", "video/mp4"))
        .and(header("x-upload-content-length", VIDEO.len().to_string()))
        .and(body_partial_json(serde_json::json!({
            "snippet": {"categoryId": "22", "tags": ["AI", "generated"]},
            "status": {"privacyStatus": "private"}
        })))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Location", format!("{}/upload-session/abc", server.uri()).as_str()),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .and(header("content-type", "video/mp4"))
        .and(header("content-length", VIDEO.len().to_string()))
        .and(body_bytes(VIDEO))
        .respond_with(if upload_status == 200 {
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "vid-123", "kind": "youtube#video"}))
        } else {
            ResponseTemplate::new(upload_status).set_body_string("quotaExceeded")
        })
        .mount(server)
        .await;
}

fn uploader(server: &MockServer, staging: &TempDir) -> Uploader {
    let gcs = GcsClient::with_base_url(AuthProvider::from_token("storage-token"), server.uri());
    Uploader::new(YouTubeClient::with_base_url(server.uri()))
        .with_gcs(gcs)
        .with_temp_dir(staging.path())
}

fn staged_files(staging: &TempDir) -> usize {
    std::fs::read_dir(staging.path()).unwrap().count()
}

#[tokio::test]
async fn gcs_object_is_staged_uploaded_and_removed() {
    let server = MockServer::start().await;
    mount_storage(&server, 200).await;
    mount_youtube(&server, 200).await;
    let staging = TempDir::new().unwrap();

    let reference = StorageRef::parse("gs://videos-bucket/fox.mp4").unwrap();
    let video = uploader(&server, &staging)
        .upload("yt-token", &reference, &metadata())
        .await
        .unwrap();

    assert_eq!(video.id, "vid-123");
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn failed_upload_still_removes_staged_file() {
    let server = MockServer::start().await;
    mount_storage(&server, 200).await;
    mount_youtube(&server, 403).await;
    let staging = TempDir::new().unwrap();

    let reference = StorageRef::parse("gs://videos-bucket/fox.mp4").unwrap();
    let err = uploader(&server, &staging)
        .upload("yt-token", &reference, &metadata())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Api { status_code: 403, .. }));
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn failed_download_never_reaches_youtube() {
    let server = MockServer::start().await;
    mount_storage(&server, 404).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let staging = TempDir::new().unwrap();

    let reference = StorageRef::parse("gs://videos-bucket/fox.mp4").unwrap();
    let err = uploader(&server, &staging)
        .upload("yt-token", &reference, &metadata())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Gcs(_)));
    assert_eq!(staged_files(&staging), 0);
}

#[tokio::test]
async fn local_file_is_uploaded_directly() {
    let server = MockServer::start().await;
    mount_youtube(&server, 200).await;
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("fox.mp4");
    std::fs::write(&file, VIDEO).unwrap();

    let video = Uploader::new(YouTubeClient::with_base_url(server.uri()))
        .upload("yt-token", &StorageRef::Local(file.clone()), &metadata())
        .await
        .unwrap();

    assert_eq!(video.id, "vid-123");
    assert!(file.exists());
}

#[tokio::test]
async fn session_without_location_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("clip.webm");
    std::fs::write(&file, VIDEO).unwrap();

    let err = YouTubeClient::with_base_url(server.uri())
        .upload("yt-token", &file, &metadata())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::MissingSessionUrl));
}

#[tokio::test]
async fn gcs_reference_without_storage_client_is_rejected() {
    let server = MockServer::start().await;
    let reference = StorageRef::parse("gs://videos-bucket/fox.mp4").unwrap();

    let err = Uploader::new(YouTubeClient::with_base_url(server.uri()))
        .upload("yt-token", &reference, &metadata())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Config(_)));
}

#[tokio::test]
async fn missing_local_file_is_reported() {
    let server = MockServer::start().await;
    let err = Uploader::new(YouTubeClient::with_base_url(server.uri()))
        .upload("yt-token", &StorageRef::Local("/nonexistent/fox.mp4".into()), &metadata())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::ReadFile { .. }));
}
