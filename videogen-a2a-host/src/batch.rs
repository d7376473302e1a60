//! Batch loop generating a fixed number of videos.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::client::AgentTransport;
use crate::driver::{Exchange, Outcome, TaskDriver};
use crate::handoff::{UploadHandle, UploadReport};
use crate::protocol::{ContextId, TaskQueryParams};

/// Videos generated per run.
pub const DEFAULT_ITERATIONS: u32 = 6;

/// Pause between two iterations.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(60);

/// Messages requested when dumping task history.
pub const HISTORY_LENGTH: u32 = 10;

pub const MAX_FOXES: u8 = 5;
pub const BACKGROUNDS: [&str; 5] = ["blue", "white", "green", "orange", "yellow"];
pub const GROUNDS: [&str; 5] = ["grass", "concrete", "soil", "leaves", "sand"];

/// Randomized scene attributes of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoPrompt {
    pub foxes: u8,
    pub background: &'static str,
    pub ground: &'static str,
}

impl VideoPrompt {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            foxes: rng.random_range(1..=MAX_FOXES),
            background: BACKGROUNDS[rng.random_range(0..BACKGROUNDS.len())],
            ground: GROUNDS[rng.random_range(0..GROUNDS.len())],
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Generate a video of {} baby foxes and a chicken playing together on {} with a {} background. \
             The scene should be bright, cheerful, and well-lit, with the animals clearly visible against the {} background.",
            self.foxes, self.ground, self.background, self.background
        )
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub iterations: u32,
    pub delay: Duration,
    /// Print the task history after each exchange.
    pub history: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            delay: DEFAULT_DELAY,
            history: false,
        }
    }
}

/// Summary of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Exchanges performed, in order.
    pub exchanges: Vec<Exchange>,
    /// Finished uploads, in completion order.
    pub uploads: Vec<UploadReport>,
    /// Set when an exchange asked to stop.
    pub stopped_early: bool,
}

/// Feeds generated prompts to the driver.
pub struct BatchRunner {
    driver: TaskDriver,
    transport: Arc<dyn AgentTransport>,
    options: BatchOptions,
    rng: StdRng,
}

impl BatchRunner {
    pub fn new(driver: TaskDriver, transport: Arc<dyn AgentTransport>, options: BatchOptions, rng: StdRng) -> Self {
        Self {
            driver,
            transport,
            options,
            rng,
        }
    }

    /// Run every iteration against `context`, then wait for outstanding uploads.
    pub async fn run(&mut self, context: &ContextId) -> BatchReport {
        let total = self.options.iterations;
        let mut report = BatchReport::default();
        let mut pending: Vec<UploadHandle> = Vec::new();

        for i in 0..total {
            let scene = VideoPrompt::random(&mut self.rng);
            println!("\n=========  Generating video {}/{} ======== ", i + 1, total);
            println!("Number of baby foxes: {}", scene.foxes);
            println!("Background color: {}", scene.background);
            println!("Ground type: {}", scene.ground);
            info!(iteration = i + 1, total, "Starting exchange");

            let mut exchange = self.driver.complete_task(Some(scene.render()), context, None).await;
            pending.append(&mut exchange.uploads);
            let keep_going = exchange.should_continue();
            let succeeded = keep_going && !exchange.failed();

            if succeeded && exchange.task_id.is_some() {
                println!("\nVideo generation completed successfully!");
            }
            if self.options.history && succeeded {
                self.print_history(&exchange).await;
            }
            if let Outcome::TransportFailed { error, .. } = &exchange.outcome {
                warn!(iteration = i + 1, error = %error, "Exchange failed, moving on to the next video");
            }

            reap_finished(&mut pending, &mut report.uploads).await;
            report.exchanges.push(exchange);

            if !keep_going {
                info!(iteration = i + 1, "Stopping batch");
                report.stopped_early = true;
                break;
            }
            if i + 1 < total {
                println!("\nWaiting {} seconds before generating the next video...", self.options.delay.as_secs());
                tokio::time::sleep(self.options.delay).await;
            }
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "Waiting for uploads to finish");
        }
        for handle in pending {
            info!(storage_ref = %handle.storage_ref(), "Waiting for upload");
            let upload = handle.wait().await;
            upload.print();
            report.uploads.push(upload);
        }
        report
    }

    async fn print_history(&self, exchange: &Exchange) {
        let Some(task_id) = exchange.task_id.clone() else {
            return;
        };
        println!("========= history ======== ");
        match self
            .transport
            .get_task(TaskQueryParams::with_history(task_id, HISTORY_LENGTH))
            .await
        {
            Ok(task) => println!("{}", serde_json::json!({ "result": { "history": task.history } })),
            Err(e) => warn!(error = %e, "Failed to fetch task history"),
        }
    }
}

/// Move finished uploads out of `pending` into `done`.
async fn reap_finished(pending: &mut Vec<UploadHandle>, done: &mut Vec<UploadReport>) {
    let (finished, running): (Vec<_>, Vec<_>) = pending.drain(..).partition(UploadHandle::is_finished);
    *pending = running;
    for handle in finished {
        let upload = handle.wait().await;
        upload.print();
        done.push(upload);
    }
}
