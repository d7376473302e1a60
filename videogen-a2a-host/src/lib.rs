//! VideoGen A2A Host Library
//!
//! Drives a remote A2A video-generation agent: resolves its card, streams
//! the events of each request, rewrites the resulting video URI to a
//! `gs://` reference and hands it to the YouTube uploader.

pub mod artifact;
pub mod batch;
pub mod client;
pub mod config;
pub mod driver;
pub mod handoff;
pub mod protocol;
pub mod push;
pub mod sse;

#[cfg(test)]
mod testing;

pub use artifact::{ResultUri, classify, rewrite_signed_url};
pub use batch::{BatchOptions, BatchReport, BatchRunner, VideoPrompt};
pub use client::{A2aClient, AgentTransport, ClientError, EventStream};
pub use config::{Args, HostConfig};
pub use driver::{DriverOptions, Exchange, Outcome, PromptReader, StdinPrompt, TaskDriver, TaskSlot};
pub use handoff::{Handoff, ProcessHandoff, UploadHandle, UploadReport, UploadRequest, UploadStatus};
