//! VideoGen A2A YouTube Uploader
//!
//! `videogen-a2a-youtube <storage-ref> <title> <description> [tags...]`
//!
//! Logs go to stderr; stdout carries only the result line.

use anyhow::{Context, Result};
use clap::Parser;
use videogen_a2a_common::GcsClient;
use videogen_a2a_common::tracing::{LogTarget, init_tracing_with};
use videogen_a2a_youtube::{
    ClientSecrets, CredentialManager, InstalledAppFlow, StorageRef, TokenCache, UploadConfig, Uploader, VideoMetadata,
    YouTubeClient,
};

#[derive(Debug, Parser)]
#[command(name = "videogen-a2a-youtube", version, about = "Upload a generated video to YouTube")]
struct Args {
    /// gs://bucket/object or a local file path
    storage_ref: String,

    title: String,

    description: String,

    /// Video tags
    tags: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing_with(LogTarget::Stderr, "info");

    let args = Args::parse();
    let config = UploadConfig::from_env()?;
    let storage_ref = StorageRef::parse(&args.storage_ref)?;

    let secrets = ClientSecrets::load(&config.client_secrets)?;
    let credentials = CredentialManager::new(
        TokenCache::new(&config.token_cache),
        Box::new(InstalledAppFlow::new(secrets)),
    );
    let token = credentials.access_token().await.context("YouTube authorization failed")?;

    let mut uploader = Uploader::new(YouTubeClient::new());
    if matches!(storage_ref, StorageRef::Gcs(_)) {
        uploader = uploader.with_gcs(GcsClient::new().await?);
    }
    if let Some(dir) = &config.temp_dir {
        uploader = uploader.with_temp_dir(dir);
    }

    let metadata = VideoMetadata {
        title: args.title,
        description: args.description,
        tags: args.tags,
        category_id: config.category_id,
        privacy_status: config.privacy_status,
    };

    tracing::info!(storage_ref = %storage_ref, privacy = %metadata.privacy_status, "Uploading video");
    let video = uploader
        .upload(&token, &storage_ref, &metadata)
        .await
        .with_context(|| format!("Upload of {} failed", storage_ref))?;

    println!("Upload successful! Video ID: {}", video.id);
    Ok(())
}
