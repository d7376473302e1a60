//! VideoGen A2A YouTube Uploader Library
//!
//! Publishes a generated video to YouTube. Cloud Storage objects are staged
//! in a temp file first; OAuth credentials come from a local token cache or
//! the installed-app authorization flow.

pub mod callback;
pub mod config;
pub mod error;
pub mod oauth;
pub mod pkce;
pub mod uploader;
pub mod youtube;

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod oauth_test;

pub use config::UploadConfig;
pub use error::UploadError;
pub use oauth::{ClientSecrets, CredentialManager, CredentialState, InstalledAppFlow, OAuthFlow, OAuthTokens, TokenCache};
pub use uploader::{StorageRef, Uploader};
pub use youtube::{PrivacyStatus, UploadedVideo, VideoMetadata, YouTubeClient};
