//! VideoGen A2A Common Library
//!
//! Shared utilities for error handling, Cloud Storage access, authentication
//! and tracing across the A2A host and the YouTube uploader.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod auth;
pub mod error;
pub mod gcs;
pub mod tracing;


pub use error::{AuthError, ConfigError, GcsError, GcsOperation};
pub use gcs::{GcsClient, GcsUri};
