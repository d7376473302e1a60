//! Upload hand-off to the uploader process.
//!
//! Each hand-off runs on its own tokio task so a slow upload never holds up
//! the batch loop. The returned [`UploadHandle`] reports when the child has
//! exited and what it printed.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use videogen_a2a_common::GcsUri;

/// Default uploader executable, resolved through `PATH`.
pub const DEFAULT_UPLOADER: &str = "videogen-a2a-youtube";

/// Tags attached to every uploaded video.
pub const UPLOAD_TAGS: [&str; 4] = ["AI", "generated", "video", "content"];

/// Number of prompt characters kept in the video title.
const TITLE_PROMPT_CHARS: usize = 50;

/// What to upload and how to describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub storage_ref: GcsUri,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl UploadRequest {
    /// Derive title, description and tags from the prompt that produced the video.
    pub fn from_prompt(storage_ref: GcsUri, prompt: &str) -> Self {
        let head: String = prompt.chars().take(TITLE_PROMPT_CHARS).collect();
        Self {
            storage_ref,
            title: format!("AI Generated Video: {}...", head),
            description: format!("Video generated from user prompt: {}", prompt),
            tags: UPLOAD_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Positional arguments for the uploader: reference, title, description, tags.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.storage_ref.to_string(),
            self.title.clone(),
            self.description.clone(),
        ];
        args.extend(self.tags.iter().cloned());
        args
    }
}

/// How an upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Succeeded,
    /// The uploader exited unsuccessfully. `code` is `None` when it was killed by a signal.
    Failed { code: Option<i32> },
    /// The uploader could not be started.
    SpawnFailed(String),
    /// The hand-off task panicked or was cancelled.
    Aborted(String),
}

/// Outcome of one hand-off with the uploader's captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub storage_ref: GcsUri,
    pub status: UploadStatus,
    pub stdout: String,
    pub stderr: String,
}

impl UploadReport {
    pub fn new(storage_ref: GcsUri, status: UploadStatus) -> Self {
        Self {
            storage_ref,
            status,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == UploadStatus::Succeeded
    }

    /// Print captured output and log the result.
    pub fn print(&self) {
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            println!("[YOUTUBE] {}", stdout);
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            println!("[YOUTUBE ERROR] {}", stderr);
        }

        match &self.status {
            UploadStatus::Succeeded => info!(uri = %self.storage_ref, "Upload finished"),
            UploadStatus::Failed { code } => {
                warn!(uri = %self.storage_ref, exit_code = ?code, "Uploader exited unsuccessfully")
            }
            UploadStatus::SpawnFailed(e) => warn!(uri = %self.storage_ref, error = %e, "Failed to start uploader"),
            UploadStatus::Aborted(e) => warn!(uri = %self.storage_ref, error = %e, "Upload task aborted"),
        }
    }
}

/// A running hand-off.
#[derive(Debug)]
pub struct UploadHandle {
    storage_ref: GcsUri,
    task: JoinHandle<UploadReport>,
}

impl UploadHandle {
    /// Run `upload` on the tokio runtime.
    pub fn spawn<F>(storage_ref: GcsUri, upload: F) -> Self
    where
        F: Future<Output = UploadReport> + Send + 'static,
    {
        Self {
            storage_ref,
            task: tokio::spawn(upload),
        }
    }

    pub fn storage_ref(&self) -> &GcsUri {
        &self.storage_ref
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the upload to end.
    pub async fn wait(self) -> UploadReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => UploadReport::new(self.storage_ref, UploadStatus::Aborted(e.to_string())),
        }
    }
}

/// Starts uploads. Must be called from within a tokio runtime.
pub trait Handoff: Send + Sync {
    fn dispatch(&self, request: UploadRequest) -> UploadHandle;
}

/// Runs the uploader executable as a child process.
#[derive(Debug, Clone)]
pub struct ProcessHandoff {
    program: PathBuf,
}

impl ProcessHandoff {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ProcessHandoff {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOADER)
    }
}

impl Handoff for ProcessHandoff {
    fn dispatch(&self, request: UploadRequest) -> UploadHandle {
        let program = self.program.clone();
        let storage_ref = request.storage_ref.clone();
        info!(uri = %storage_ref, program = %program.display(), "Starting upload");

        UploadHandle::spawn(storage_ref.clone(), async move {
            let output = Command::new(&program)
                .args(request.args())
                .stdin(Stdio::null())
                .output()
                .await;

            match output {
                Ok(output) => {
                    let status = if output.status.success() {
                        UploadStatus::Succeeded
                    } else {
                        UploadStatus::Failed {
                            code: output.status.code(),
                        }
                    };
                    UploadReport {
                        storage_ref,
                        status,
                        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    }
                }
                Err(e) => UploadReport::new(storage_ref, UploadStatus::SpawnFailed(e.to_string())),
            }
        })
    }
}
